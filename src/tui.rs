use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::stdout;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::api::{ApiClient, ErrorReporter, JobsApi, Notice};
use crate::browser;
use crate::cache::JobCache;
use crate::filters::{FilterState, JobFilter, Period};
use crate::format::{format_relative_date, html_to_text, truncate};
use crate::models::{Job, JobDetail, JobStatus};
use crate::review::{InputFocus, ReviewAction, ReviewMode};
use crate::settings::{
    DETAIL_PANEL, DetailPanel, Density, MIN_COLUMN_WIDTH, SIDEBAR, SidebarState, THEME,
    TableSettings, ThemeSettings, ColumnKey, refresh_label,
};
use crate::status::StatusCoordinator;
use crate::storage::Store;
use crate::view::{count_by_status, filter_jobs};

const TICK: Duration = Duration::from_millis(250);
const TOAST_TTL: Duration = Duration::from_secs(5);
const SIDEBAR_WIDTH: u16 = 24;

struct Toast {
    notice: Notice,
    shown_at: Instant,
}

type ToastSlot = Rc<RefCell<Option<Toast>>>;

/// Shows failed requests as a toast in the corner of the screen.
struct ToastReporter {
    slot: ToastSlot,
}

impl ErrorReporter for ToastReporter {
    fn report(&self, notice: &Notice) {
        tracing::warn!(title = %notice.title, detail = %notice.detail, "api request failed");
        *self.slot.borrow_mut() = Some(Toast {
            notice: notice.clone(),
            shown_at: Instant::now(),
        });
    }
}

struct Palette {
    text: Color,
    dim: Color,
    accent: Color,
    selection: Color,
}

impl Palette {
    fn for_theme(theme: &ThemeSettings) -> Self {
        if theme.is_dark() {
            Self {
                text: Color::White,
                dim: Color::DarkGray,
                accent: Color::Cyan,
                selection: Color::DarkGray,
            }
        } else {
            Self {
                text: Color::Black,
                dim: Color::Gray,
                accent: Color::Blue,
                selection: Color::LightBlue,
            }
        }
    }

    fn status(&self, status: JobStatus) -> Style {
        match status {
            JobStatus::New => Style::default().fg(Color::Green),
            JobStatus::Unseen => Style::default().fg(Color::LightGreen),
            JobStatus::Reviewed => Style::default().fg(Color::Yellow),
            JobStatus::Applied => Style::default().fg(self.accent),
            JobStatus::Irrelevant => Style::default().fg(self.dim),
        }
    }
}

struct AppState {
    filters: FilterState,
    cache: JobCache,
    view: Vec<Job>,
    counts: BTreeMap<JobStatus, usize>,
    selected: usize,
    review: ReviewMode,
    focus: InputFocus,
    search_buffer: String,
    detail: Option<JobDetail>,
    /// Job whose detail request failed; not requested again until retried.
    detail_failed: Option<String>,
    scroll_offset: u16,
    confirm_rematch: bool,
    table: TableSettings,
    theme: ThemeSettings,
    sidebar: SidebarState,
    panel: DetailPanel,
    toast: ToastSlot,
}

impl AppState {
    fn new(store: &Store, filter: JobFilter, toast: ToastSlot) -> Self {
        Self {
            filters: FilterState::new(filter),
            cache: JobCache::new(),
            view: Vec::new(),
            counts: BTreeMap::new(),
            selected: 0,
            review: ReviewMode::new(),
            focus: InputFocus::Normal,
            search_buffer: String::new(),
            detail: None,
            detail_failed: None,
            scroll_offset: 0,
            confirm_rematch: false,
            table: TableSettings::load(store),
            theme: THEME.load(store),
            sidebar: SIDEBAR.load(store),
            panel: DetailPanel::load(store),
            toast,
        }
    }

    fn refresh(&mut self, api: &dyn JobsApi) {
        let key = self.filters.get().server_key();
        match self.cache.refresh(api, &key, self.table.refresh_every()) {
            Ok(true) => self.rebuild_view(),
            Ok(false) => {}
            // already surfaced as a toast
            Err(e) => tracing::debug!(error = %e, "job list refresh failed"),
        }
    }

    fn rebuild_view(&mut self) {
        self.view = filter_jobs(self.cache.jobs(), self.filters.get());
        self.counts = count_by_status(self.cache.jobs());
        if self.selected >= self.view.len() {
            self.selected = self.view.len().saturating_sub(1);
        }
    }

    fn set_filter(&mut self, filter: JobFilter) {
        self.filters.set(filter);
        self.rebuild_view();
    }

    fn selected_job(&self) -> Option<&Job> {
        self.view.get(self.selected)
    }

    fn next(&mut self) {
        if self.selected + 1 < self.view.len() {
            self.selected += 1;
        }
    }

    fn prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn enter_review(&mut self, from_top: bool) {
        let start = if from_top { 0 } else { self.selected };
        if let Some(job) = self.view.get(start) {
            self.review.enter(&self.view, job);
            self.scroll_offset = 0;
        }
    }

    /// Fetch the detail for the job under review if it is not loaded yet.
    fn load_detail(&mut self, api: &dyn JobsApi) {
        let Some(job) = self.review.current_job() else {
            self.detail = None;
            return;
        };
        if self.detail.as_ref().is_some_and(|d| d.job.job_id == job.job_id) {
            return;
        }
        if self.detail_failed.as_deref() == Some(job.job_id.as_str()) {
            return;
        }
        let job_id = job.job_id.clone();
        match api.job_detail(&job_id) {
            Ok(detail) => {
                self.detail = Some(detail);
                self.detail_failed = None;
            }
            Err(e) => {
                tracing::debug!(job_id = %job_id, error = %e, "job detail failed");
                self.detail = None;
                self.detail_failed = Some(job_id);
            }
        }
    }

    fn set_status(&mut self, api: &dyn JobsApi, job_id: &str, status: JobStatus) {
        let coordinator = StatusCoordinator::new(api);
        match coordinator.set_status(job_id, status, &mut [&mut self.cache, &mut self.review]) {
            Ok(updated) => {
                tracing::info!(job_id, status = %updated.status, "status changed");
                self.scroll_offset = 0;
            }
            Err(e) => tracing::debug!(error = %e, "status change failed"),
        }
    }

    /// Re-match every stored job, regardless of the current filter.
    fn rematch(&mut self, api: &dyn JobsApi) {
        if let Ok(response) = api.rematch(None) {
            self.notify("Rematch", &format!("{} jobs queued", response.jobs_queued));
            self.cache.invalidate();
        }
    }

    fn notify(&self, title: &str, detail: &str) {
        *self.toast.borrow_mut() = Some(Toast {
            notice: Notice {
                title: title.to_string(),
                detail: detail.to_string(),
            },
            shown_at: Instant::now(),
        });
    }

    fn expire_toast(&self) {
        let mut slot = self.toast.borrow_mut();
        if slot.as_ref().is_some_and(|t| t.shown_at.elapsed() >= TOAST_TTL) {
            *slot = None;
        }
    }
}

pub fn run_browse(api_url: &str, store: &Store, filter: JobFilter) -> Result<()> {
    let toast: ToastSlot = Rc::new(RefCell::new(None));
    let api = ApiClient::new(
        api_url,
        Box::new(ToastReporter {
            slot: toast.clone(),
        }),
    )?;
    let mut state = AppState::new(store, filter, toast);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, &api, store);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    api: &ApiClient,
    store: &Store,
) -> Result<()> {
    let mut table_state = TableState::default();

    loop {
        state.refresh(api);
        if state.review.is_active() {
            state.load_detail(api);
        }
        state.expire_toast();
        table_state.select((!state.view.is_empty()).then_some(state.selected));

        terminal.draw(|frame| draw(frame, state, &mut table_state))?;

        if !event::poll(TICK)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            break;
        }

        if state.focus == InputFocus::TextInput {
            handle_search_key(state, key);
            continue;
        }

        if state.confirm_rematch {
            state.confirm_rematch = false;
            if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                state.rematch(api);
            }
            continue;
        }

        if state.review.is_active() {
            handle_review_key(state, api, key);
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Down | KeyCode::Char('j') => state.next(),
            KeyCode::Up | KeyCode::Char('k') => state.prev(),
            KeyCode::Enter => state.enter_review(false),
            KeyCode::Char('v') => state.enter_review(true),
            KeyCode::Char('/') => {
                state.search_buffer = state.filters.get().search.clone().unwrap_or_default();
                state.focus = InputFocus::TextInput;
            }
            KeyCode::Char(c @ '1'..='5') => {
                let index = (c as usize) - ('1' as usize);
                let mut filter = state.filters.get().clone();
                filter.toggle_status(JobStatus::ALL[index]);
                state.set_filter(filter);
            }
            KeyCode::Char('m') => {
                let mut filter = state.filters.get().clone();
                filter.remote = !filter.remote;
                state.set_filter(filter);
            }
            KeyCode::Char('p') => {
                let mut filter = state.filters.get().clone();
                filter.period = Period::cycle(filter.period);
                state.set_filter(filter);
            }
            KeyCode::Char('P') => {
                let mut filter = state.filters.get().clone();
                filter.period_field = filter.period_field.next();
                state.set_filter(filter);
            }
            KeyCode::Char('c') => state.set_filter(JobFilter::default()),
            KeyCode::Char('g') => state.cache.invalidate(),
            KeyCode::Char('R') => state.confirm_rematch = true,
            KeyCode::Char('a') => status_for_selected(state, api, JobStatus::Applied),
            KeyCode::Char('x') => status_for_selected(state, api, JobStatus::Irrelevant),
            KeyCode::Char('r') => status_for_selected(state, api, JobStatus::Reviewed),
            KeyCode::Char('n') => status_for_selected(state, api, JobStatus::New),
            KeyCode::Char('o') => {
                if let Some(job) = state.selected_job() {
                    let url = job.url.clone();
                    open_original(state, &url);
                }
            }
            KeyCode::Char('t') => {
                state.theme.toggle();
                THEME.save(store, &state.theme);
            }
            KeyCode::Char('b') => {
                state.sidebar.collapsed = !state.sidebar.collapsed;
                SIDEBAR.save(store, &state.sidebar);
            }
            KeyCode::Char('<') => {
                state.panel.resize(4);
                DETAIL_PANEL.save(store, &state.panel);
            }
            KeyCode::Char('>') => {
                state.panel.resize(-4);
                DETAIL_PANEL.save(store, &state.panel);
            }
            KeyCode::Char('D') => {
                state.table.toggle_density();
                state.table.save(store);
            }
            _ => {}
        }
    }
    Ok(())
}

fn handle_search_key(state: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Char(c) => state.search_buffer.push(c),
        KeyCode::Backspace => {
            state.search_buffer.pop();
        }
        KeyCode::Enter => {
            let mut filter = state.filters.get().clone();
            filter.search = (!state.search_buffer.is_empty()).then(|| state.search_buffer.clone());
            state.set_filter(filter);
            state.focus = InputFocus::Normal;
        }
        KeyCode::Esc => state.focus = InputFocus::Normal,
        _ => {}
    }
}

fn handle_review_key(state: &mut AppState, api: &dyn JobsApi, key: KeyEvent) {
    match state.review.handle_key(key.code, state.focus) {
        Some(ReviewAction::SetStatus { job_id, status }) => state.set_status(api, &job_id, status),
        Some(ReviewAction::OpenOriginal { url }) => open_original(state, &url),
        Some(ReviewAction::Exited) => {
            state.detail = None;
            state.rebuild_view();
        }
        Some(ReviewAction::Navigated) => state.scroll_offset = 0,
        Some(ReviewAction::Unchanged) => {}
        None => match key.code {
            KeyCode::Char('g') => state.detail_failed = None,
            KeyCode::Down | KeyCode::Char('j') => {
                state.scroll_offset = state.scroll_offset.saturating_add(3)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                state.scroll_offset = state.scroll_offset.saturating_sub(3)
            }
            _ => {}
        },
    }
}

fn status_for_selected(state: &mut AppState, api: &ApiClient, status: JobStatus) {
    let Some(job) = state.selected_job() else {
        return;
    };
    if job.status == status {
        return;
    }
    let job_id = job.job_id.clone();
    state.set_status(api, &job_id, status);
}

fn open_original(state: &AppState, url: &str) {
    if let Err(e) = browser::open_url(url) {
        state.notify("Cannot open posting", &e.to_string());
    }
}

fn draw(frame: &mut Frame, state: &AppState, table_state: &mut TableState) {
    let palette = Palette::for_theme(&state.theme);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    frame.render_widget(Paragraph::new(counts_line(state, &palette)), rows[0]);
    frame.render_widget(
        Paragraph::new(filter_line(state)).style(Style::default().fg(palette.dim)),
        rows[1],
    );

    if state.review.is_active() {
        draw_review(frame, state, &palette, rows[2]);
    } else {
        draw_list(frame, state, &palette, table_state, rows[2]);
    }

    let help = if state.focus == InputFocus::TextInput {
        " type to search  Enter:apply  Esc:cancel".to_string()
    } else if state.confirm_rematch {
        " Re-match all jobs? Resets matches and re-runs AI evaluation. y:confirm  any key:cancel"
            .to_string()
    } else if state.review.is_active() {
        " q/←:prev  e/→:next  a:applied  d/x:irrelevant  r:reviewed  o:open  j/k:scroll  g:retry  Esc:back"
            .to_string()
    } else {
        " j/k:move  Enter:review  v:review all  /:search  1-5:status  m:remote  p/P:period  c:clear  g:refresh  R:rematch  t:theme  b:sidebar  </>:panel  D:density  q:quit"
            .to_string()
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(palette.dim)),
        rows[3],
    );

    draw_toast(frame, state);
}

fn counts_line(state: &AppState, palette: &Palette) -> Line<'static> {
    let mut spans = vec![Span::styled(
        format!(" Total {} ", state.cache.jobs().len()),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    for status in JobStatus::ALL {
        let count = state.counts.get(&status).copied().unwrap_or(0);
        spans.push(Span::styled(
            format!(" {} {} ", status.label(), count),
            palette.status(status),
        ));
    }
    Line::from(spans)
}

fn filter_line(state: &AppState) -> String {
    let filter = state.filters.get();
    if state.focus == InputFocus::TextInput {
        return format!(" search: {}_", state.search_buffer);
    }
    let updated = state
        .cache
        .updated_at()
        .map(|t| format!("  ·  Updated {}", t.format("%H:%M:%S")))
        .unwrap_or_default();
    format!(
        " {} jobs  ·  {}  ·  refresh {}{}",
        state.view.len(),
        filter.describe(),
        refresh_label(state.table.refresh_interval),
        updated
    )
}

fn draw_list(
    frame: &mut Frame,
    state: &AppState,
    palette: &Palette,
    table_state: &mut TableState,
    area: Rect,
) {
    let mut constraints = Vec::new();
    if !state.sidebar.collapsed {
        constraints.push(Constraint::Length(SIDEBAR_WIDTH));
    }
    constraints.push(Constraint::Min(0));
    constraints.push(Constraint::Length(state.panel.width));
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    let mut next = 0;
    if !state.sidebar.collapsed {
        draw_sidebar(frame, state, palette, chunks[0]);
        next = 1;
    }
    let (table_area, detail_area) = (chunks[next], chunks[next + 1]);

    let columns = state.table.columns();
    let widths: Vec<Constraint> = columns
        .iter()
        .map(|key| match state.table.column_width(*key) {
            Some(width) => Constraint::Length(width),
            None => Constraint::Min(MIN_COLUMN_WIDTH),
        })
        .collect();

    let header = Row::new(columns.iter().map(|key| Cell::from(key.label())))
        .style(Style::default().fg(palette.accent).add_modifier(Modifier::BOLD));

    let margin = match state.table.density {
        Density::Compact => 0,
        Density::Default => 1,
    };
    let rows: Vec<Row> = state
        .view
        .iter()
        .map(|job| {
            let cells = columns.iter().map(|key| {
                let text = column_text(job, *key);
                if *key == ColumnKey::Status {
                    Cell::from(text).style(palette.status(job.status))
                } else {
                    Cell::from(text)
                }
            });
            Row::new(cells).bottom_margin(margin)
        })
        .collect();

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Jobs ({}) ", state.view.len())),
        )
        .style(Style::default().fg(palette.text))
        .row_highlight_style(
            Style::default()
                .bg(palette.selection)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(table, table_area, table_state);

    let summary = match state.selected_job() {
        Some(job) => job_summary(job, palette),
        None => Text::raw("No jobs match the current filter"),
    };
    let detail = Paragraph::new(summary)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false });
    frame.render_widget(detail, detail_area);
}

fn draw_sidebar(frame: &mut Frame, state: &AppState, palette: &Palette, area: Rect) {
    let filter = state.filters.get();
    let mut lines = vec![Line::from(Span::styled(
        "Status",
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    for (i, status) in JobStatus::ALL.iter().enumerate() {
        let mark = if filter.statuses.contains(status) { "x" } else { " " };
        let count = state.counts.get(status).copied().unwrap_or(0);
        lines.push(Line::from(Span::styled(
            format!("{} [{}] {} ({})", i + 1, mark, status.label(), count),
            palette.status(*status),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(format!(
        "m [{}] Remote only",
        if filter.remote { "x" } else { " " }
    )));
    lines.push(Line::from(format!(
        "p Period: {}",
        filter.period.map(|p| p.label()).unwrap_or("All")
    )));
    lines.push(Line::from(format!("P Field: {}", filter.period_field.label())));
    if let Some(score) = filter.min_score {
        lines.push(Line::from(format!("  Score >= {}", score)));
    }
    if !filter.sources.is_empty() {
        let sources: Vec<_> = filter.sources.iter().map(|s| s.as_str()).collect();
        lines.push(Line::from(format!("  Sources: {}", sources.join(","))));
    }

    let sidebar = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Filters "))
        .style(Style::default().fg(palette.text));
    frame.render_widget(sidebar, area);
}

fn column_text(job: &Job, key: ColumnKey) -> String {
    match key {
        ColumnKey::Title => job.title.clone(),
        ColumnKey::Company => job.company.clone().unwrap_or_else(|| "-".to_string()),
        ColumnKey::Source => job.source.as_str().to_string(),
        ColumnKey::Score => job
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string()),
        ColumnKey::Salary => job.salary.clone().unwrap_or_else(|| "-".to_string()),
        ColumnKey::Location => job.location.clone().unwrap_or_else(|| "-".to_string()),
        ColumnKey::Remote => if job.remote { "yes" } else { "" }.to_string(),
        ColumnKey::Status => job.status.label().to_string(),
        ColumnKey::PublishedAt => format_relative_date(job.published_at.as_deref()),
        ColumnKey::MatchedAt => format_relative_date(job.matched_at.as_deref()),
    }
}

fn job_summary<'a>(job: &'a Job, palette: &Palette) -> Text<'a> {
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        &job.title,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    if let Some(company) = &job.company {
        lines.push(Line::from(format!("at {}", company)));
    }
    lines.push(Line::from(Span::styled(
        format!("Status: {}", job.status.label()),
        palette.status(job.status),
    )));
    let mut facts = vec![job.source.as_str().to_string()];
    if let Some(score) = job.score {
        facts.push(format!("score {}", score));
    }
    if job.remote {
        facts.push("remote".to_string());
    }
    lines.push(Line::from(facts.join("  ·  ")));
    if let Some(location) = &job.location {
        lines.push(Line::from(format!("Location: {}", location)));
    }
    if let Some(salary) = &job.salary {
        lines.push(Line::from(format!("Salary: {}", salary)));
    }
    lines.push(Line::from(format!(
        "Published: {}",
        format_relative_date(job.published_at.as_deref())
    )));
    lines.push(Line::from(format!(
        "Matched: {}",
        format_relative_date(job.matched_at.as_deref())
    )));
    if !job.url.is_empty() {
        lines.push(Line::from(Span::styled(
            job.url.as_str(),
            Style::default().fg(palette.dim),
        )));
    }

    Text::from(lines)
}

fn draw_review(frame: &mut Frame, state: &AppState, palette: &Palette, area: Rect) {
    let Some(job) = state.review.current_job() else {
        return;
    };

    let prev = if state.review.has_prev() { "◀" } else { " " };
    let next = if state.review.has_next() { "▶" } else { " " };
    let title = format!(
        " {} {} / {} {} ",
        prev,
        state.review.current_index() + 1,
        state.review.total(),
        next
    );

    let width = area.width.saturating_sub(4).max(20) as usize;
    let mut text = job_summary(job, palette);
    text.lines.push(Line::from(""));

    match state.detail.as_ref().filter(|d| d.job.job_id == job.job_id) {
        Some(detail) => {
            if let Some(reasoning) = detail.ai_reasoning.as_deref().filter(|r| !r.is_empty()) {
                text.lines.push(Line::from(Span::styled(
                    "AI reasoning",
                    Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
                )));
                for line in textwrap::wrap(reasoning, width) {
                    text.lines.push(Line::from(format!("  {}", line)));
                }
                text.lines.push(Line::from(""));
            }
            match detail.description.as_deref() {
                Some(html) => {
                    text.lines.push(Line::from(Span::styled(
                        "Description",
                        Style::default().add_modifier(Modifier::BOLD),
                    )));
                    for paragraph in html_to_text(html).lines() {
                        for line in textwrap::wrap(paragraph, width) {
                            text.lines.push(Line::from(line.into_owned()));
                        }
                    }
                }
                None => text.lines.push(Line::from(Span::styled(
                    "(No description)",
                    Style::default().fg(palette.dim),
                ))),
            }
        }
        None if state.detail_failed.as_deref() == Some(job.job_id.as_str()) => {
            text.lines.push(Line::from(Span::styled(
                "Description unavailable (g to retry)",
                Style::default().fg(palette.dim),
            )))
        }
        None => text.lines.push(Line::from(Span::styled(
            "Loading description...",
            Style::default().fg(palette.dim),
        ))),
    }

    let body = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(palette.text))
        .scroll((state.scroll_offset, 0));
    frame.render_widget(body, area);
}

fn draw_toast(frame: &mut Frame, state: &AppState) {
    let slot = state.toast.borrow();
    let Some(toast) = slot.as_ref() else {
        return;
    };

    let screen = frame.area();
    let width = 50.min(screen.width);
    let area = Rect {
        x: screen.width.saturating_sub(width),
        y: 0,
        width,
        height: 4.min(screen.height),
    };
    let widget = Paragraph::new(truncate(&toast.notice.detail, width as usize * 2))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(format!(" {} ", toast.notice.title)),
        );
    frame.render_widget(Clear, area);
    frame.render_widget(widget, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::ListQuery;
    use crate::api::ApiError;
    use crate::models::RematchResponse;
    use crate::models::fixtures::job;
    use std::cell::Cell;

    #[derive(Default)]
    struct FakeApi {
        fail_detail: bool,
        detail_calls: Cell<usize>,
        rematch_since: RefCell<Vec<Option<String>>>,
    }

    impl JobsApi for FakeApi {
        fn list_jobs(&self, _query: &ListQuery) -> Result<Vec<Job>, ApiError> {
            Ok(vec![
                job("1", JobStatus::New, Some("2024-01-01")),
                job("2", JobStatus::Applied, Some("2024-01-03")),
                job("3", JobStatus::New, Some("2024-01-02")),
            ])
        }

        fn job_detail(&self, job_id: &str) -> Result<JobDetail, ApiError> {
            self.detail_calls.set(self.detail_calls.get() + 1);
            if self.fail_detail {
                return Err(ApiError::Status {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            let id = job_id.trim_start_matches("ext-");
            Ok(JobDetail {
                job: job(id, JobStatus::New, None),
                description: Some("<p>Hello</p>".to_string()),
                ai_reasoning: None,
            })
        }

        fn update_status(&self, job_id: &str, status: JobStatus) -> Result<Job, ApiError> {
            Ok(job(job_id.trim_start_matches("ext-"), status, None))
        }

        fn rematch(&self, since: Option<&str>) -> Result<RematchResponse, ApiError> {
            self.rematch_since.borrow_mut().push(since.map(str::to_string));
            Ok(RematchResponse { jobs_queued: 3 })
        }
    }

    fn state() -> AppState {
        let store = Store::open_in_memory().unwrap();
        AppState::new(&store, JobFilter::default(), Rc::new(RefCell::new(None)))
    }

    #[test]
    fn test_refresh_builds_sorted_view_and_counts() {
        let api = FakeApi::default();
        let mut state = state();
        state.refresh(&api);
        let ids: Vec<_> = state.view.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
        assert_eq!(state.counts.get(&JobStatus::New), Some(&2));
    }

    #[test]
    fn test_filter_change_keeps_selection_in_range() {
        let api = FakeApi::default();
        let mut state = state();
        state.refresh(&api);
        state.selected = 2;
        let mut filter = JobFilter::default();
        filter.toggle_status(JobStatus::Applied);
        state.set_filter(filter);
        assert_eq!(state.view.len(), 1);
        assert_eq!(state.selected, 0);
        // counts still cover the unfiltered list
        assert_eq!(state.counts.values().sum::<usize>(), 3);
    }

    #[test]
    fn test_review_status_change_advances_and_invalidates() {
        let api = FakeApi::default();
        let mut state = state();
        state.refresh(&api);
        state.enter_review(true);
        state.load_detail(&api);
        assert_eq!(state.detail.as_ref().map(|d| d.job.id.as_str()), Some("2"));

        state.set_status(&api, "ext-2", JobStatus::Irrelevant);
        assert_eq!(state.review.current_index(), 1);
        assert!(state.cache.needs_fetch(&JobFilter::default().server_key(), None));

        // the snapshot stays frozen across the refetch
        state.refresh(&api);
        assert_eq!(state.review.total(), 3);
    }

    #[test]
    fn test_search_input_does_not_trigger_shortcuts() {
        let api = FakeApi::default();
        let mut state = state();
        state.refresh(&api);
        state.enter_review(false);
        state.focus = InputFocus::TextInput;
        let key = KeyEvent::new(KeyCode::Char('e'), KeyModifiers::NONE);
        handle_search_key(&mut state, key);
        assert_eq!(state.search_buffer, "e");
        assert_eq!(state.review.current_index(), 0);
    }

    #[test]
    fn test_failed_detail_is_not_refetched_every_tick() {
        let api = FakeApi {
            fail_detail: true,
            ..Default::default()
        };
        let mut state = state();
        state.refresh(&api);
        state.enter_review(true);
        for _ in 0..8 {
            state.refresh(&api);
            state.load_detail(&api);
        }
        assert_eq!(api.detail_calls.get(), 1);
        assert!(state.detail.is_none());

        // moving to another job asks for that job's detail once
        let next = KeyEvent::new(KeyCode::Char('e'), KeyModifiers::NONE);
        handle_review_key(&mut state, &api, next);
        state.load_detail(&api);
        state.load_detail(&api);
        assert_eq!(api.detail_calls.get(), 2);

        // `g` asks again
        let retry = KeyEvent::new(KeyCode::Char('g'), KeyModifiers::NONE);
        handle_review_key(&mut state, &api, retry);
        state.load_detail(&api);
        assert_eq!(api.detail_calls.get(), 3);
    }

    #[test]
    fn test_rematch_covers_all_jobs() {
        let api = FakeApi::default();
        let mut state = state();
        let mut filter = JobFilter::default();
        filter.period = Some(Period::Week);
        state.set_filter(filter);
        state.refresh(&api);

        state.rematch(&api);
        assert_eq!(*api.rematch_since.borrow(), vec![None]);
        assert!(state.cache.needs_fetch(&state.filters.get().server_key(), None));
        let toast = state.toast.borrow();
        assert_eq!(toast.as_ref().map(|t| t.notice.detail.as_str()), Some("3 jobs queued"));
    }
}
