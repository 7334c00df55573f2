use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::storage::{Store, Versioned};

pub const TABLE_SETTINGS: Versioned<TableSettings> = Versioned::new("job-hunter-table-settings", 5);
pub const THEME: Versioned<ThemeSettings> = Versioned::new("job-hunter-theme", 1);
pub const SIDEBAR: Versioned<SidebarState> = Versioned::new("job-hunter-sidebar", 1);
pub const DETAIL_PANEL: Versioned<DetailPanel> = Versioned::new("job-hunter-detail-panel", 1);

pub const MIN_COLUMN_WIDTH: u16 = 6;
pub const MAX_COLUMN_WIDTH: u16 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnKey {
    Title,
    Company,
    Source,
    Score,
    Salary,
    Location,
    Remote,
    Status,
    PublishedAt,
    MatchedAt,
}

impl ColumnKey {
    pub const ALL: [ColumnKey; 10] = [
        Self::Title,
        Self::Company,
        Self::Source,
        Self::Score,
        Self::Salary,
        Self::Location,
        Self::Remote,
        Self::Status,
        Self::PublishedAt,
        Self::MatchedAt,
    ];

    const ALWAYS_VISIBLE: [ColumnKey; 1] = [Self::Title];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Company => "company",
            Self::Source => "source",
            Self::Score => "score",
            Self::Salary => "salary",
            Self::Location => "location",
            Self::Remote => "remote",
            Self::Status => "status",
            Self::PublishedAt => "publishedAt",
            Self::MatchedAt => "matchedAt",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Company => "Company",
            Self::Source => "Source",
            Self::Score => "Score",
            Self::Salary => "Salary",
            Self::Location => "Location",
            Self::Remote => "Remote",
            Self::Status => "Status",
            Self::PublishedAt => "Published",
            Self::MatchedAt => "Matched",
        }
    }

    pub fn is_togglable(&self) -> bool {
        !Self::ALWAYS_VISIBLE.contains(self)
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown column '{}' (known: {})", s, known.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    #[default]
    Compact,
    Default,
}

impl FromStr for Density {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "default" => Ok(Self::Default),
            _ => Err(format!("unknown density '{}' (expected compact or default)", s)),
        }
    }
}

/// Auto-refresh choices in milliseconds; 0 turns polling off.
pub const REFRESH_OPTIONS: [(&str, u64); 5] = [
    ("off", 0),
    ("30s", 30_000),
    ("1m", 60_000),
    ("2m", 120_000),
    ("5m", 300_000),
];

pub fn parse_refresh_interval(s: &str) -> Result<u64, String> {
    let s = s.trim();
    REFRESH_OPTIONS
        .iter()
        .find(|(label, ms)| label.eq_ignore_ascii_case(s) || ms.to_string() == s)
        .map(|(_, ms)| *ms)
        .ok_or_else(|| format!("unsupported refresh interval '{}' (off, 30s, 1m, 2m, 5m)", s))
}

pub fn refresh_label(ms: u64) -> String {
    REFRESH_OPTIONS
        .iter()
        .find(|(_, value)| *value == ms)
        .map(|(label, _)| label.to_string())
        .unwrap_or_else(|| format!("{}ms", ms))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableSettings {
    pub column_order: Vec<ColumnKey>,
    pub visible_columns: Vec<ColumnKey>,
    pub column_widths: BTreeMap<ColumnKey, u16>,
    pub density: Density,
    pub refresh_interval: u64,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            column_order: ColumnKey::ALL.to_vec(),
            visible_columns: ColumnKey::ALL.to_vec(),
            column_widths: BTreeMap::new(),
            density: Density::Compact,
            refresh_interval: 60_000,
        }
    }
}

impl TableSettings {
    pub fn load(store: &Store) -> Self {
        let mut settings = TABLE_SETTINGS.load(store);
        settings.reconcile();
        settings
    }

    pub fn save(&self, store: &Store) {
        TABLE_SETTINGS.save(store, self);
    }

    /// Repair a loaded value: append columns the stored order does not know
    /// (and show them), drop duplicates, and force the fixed columns visible.
    pub fn reconcile(&mut self) {
        let mut order = Vec::with_capacity(ColumnKey::ALL.len());
        for key in self.column_order.iter().copied() {
            if !order.contains(&key) {
                order.push(key);
            }
        }
        for key in ColumnKey::ALL {
            if !order.contains(&key) {
                order.push(key);
                if !self.visible_columns.contains(&key) {
                    self.visible_columns.push(key);
                }
            }
        }
        self.column_order = order;

        for key in ColumnKey::ALWAYS_VISIBLE {
            if !self.visible_columns.contains(&key) {
                self.visible_columns.push(key);
            }
        }
        let mut seen = Vec::with_capacity(self.visible_columns.len());
        self.visible_columns.retain(|key| {
            if seen.contains(key) {
                false
            } else {
                seen.push(*key);
                true
            }
        });
    }

    pub fn is_visible(&self, key: ColumnKey) -> bool {
        self.visible_columns.contains(&key)
    }

    /// Visible columns in display order.
    pub fn columns(&self) -> Vec<ColumnKey> {
        self.column_order
            .iter()
            .copied()
            .filter(|key| self.is_visible(*key))
            .collect()
    }

    /// Returns false for columns that cannot be hidden.
    pub fn toggle_column(&mut self, key: ColumnKey) -> bool {
        if !key.is_togglable() {
            return false;
        }
        if let Some(pos) = self.visible_columns.iter().position(|k| *k == key) {
            self.visible_columns.remove(pos);
        } else {
            self.visible_columns.push(key);
        }
        true
    }

    pub fn set_column_width(&mut self, key: ColumnKey, width: u16) {
        self.column_widths
            .insert(key, width.clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH));
    }

    pub fn column_width(&self, key: ColumnKey) -> Option<u16> {
        self.column_widths.get(&key).copied()
    }

    /// Move `key` to position `to` in the column order.
    pub fn move_column(&mut self, key: ColumnKey, to: usize) {
        if let Some(from) = self.column_order.iter().position(|k| *k == key) {
            self.column_order.remove(from);
            let to = to.min(self.column_order.len());
            self.column_order.insert(to, key);
        }
    }

    pub fn set_density(&mut self, density: Density) {
        self.density = density;
    }

    pub fn toggle_density(&mut self) {
        self.density = match self.density {
            Density::Compact => Density::Default,
            Density::Default => Density::Compact,
        };
    }

    pub fn set_refresh_interval(&mut self, ms: u64) {
        self.refresh_interval = ms;
    }

    pub fn refresh_every(&self) -> Option<Duration> {
        (self.refresh_interval > 0).then(|| Duration::from_millis(self.refresh_interval))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
}

impl FromStr for ThemeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            _ => Err(format!("unknown theme '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeSettings {
    pub mode: ThemeMode,
}

impl ThemeSettings {
    pub fn toggle(&mut self) {
        self.mode = match self.mode {
            ThemeMode::Dark => ThemeMode::Light,
            ThemeMode::Light => ThemeMode::Dark,
        };
    }

    pub fn is_dark(&self) -> bool {
        self.mode == ThemeMode::Dark
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SidebarState {
    pub collapsed: bool,
}

pub const MIN_DETAIL_WIDTH: u16 = 30;
pub const MAX_DETAIL_WIDTH: u16 = 120;

/// Width of the detail pane, in terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailPanel {
    pub width: u16,
}

impl Default for DetailPanel {
    fn default() -> Self {
        Self { width: 60 }
    }
}

impl DetailPanel {
    pub fn load(store: &Store) -> Self {
        let panel = DETAIL_PANEL.load(store);
        Self {
            width: panel.width.clamp(MIN_DETAIL_WIDTH, MAX_DETAIL_WIDTH),
        }
    }

    pub fn resize(&mut self, delta: i32) {
        let width = (i32::from(self.width) + delta)
            .clamp(i32::from(MIN_DETAIL_WIDTH), i32::from(MAX_DETAIL_WIDTH));
        self.width = width as u16;
    }
}
