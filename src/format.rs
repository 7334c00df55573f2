use chrono::{DateTime, Local, Utc};
use scraper::{Html, Node};

use crate::view::parse_timestamp;

const BLOCK_TAGS: [&str; 14] = [
    "p", "div", "br", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "section", "blockquote",
];

/// Render a job description's HTML as plain text, one paragraph per line.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();

    for node in fragment.tree.root().descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => {
                let name = element.name();
                if name == "li" {
                    out.push_str("\n- ");
                } else if BLOCK_TAGS.contains(&name) {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }

    let mut lines: Vec<String> = Vec::new();
    for line in out.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            continue;
        }
        lines.push(collapsed);
    }
    lines.join("\n")
}

pub fn format_relative_date(date: Option<&str>) -> String {
    format_relative_date_at(date, Utc::now())
}

pub fn format_relative_date_at(date: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(raw) = date else {
        return "-".to_string();
    };
    let Some(ts) = parse_timestamp(raw) else {
        return raw.to_string();
    };

    let minutes = (now - ts).num_minutes();
    if minutes < 1 {
        return "<1m ago".to_string();
    }
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h {}m ago", hours, minutes % 60);
    }
    let days = hours / 24;
    if days < 7 {
        return format!("{}d {}h ago", days, hours % 24);
    }
    ts.with_timezone(&Local).format("%Y-%m-%d").to_string()
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
