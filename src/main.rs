mod api;
mod browser;
mod cache;
mod config;
mod filters;
mod format;
mod models;
mod preferences;
mod review;
mod settings;
mod status;
mod storage;
mod tui;
mod view;

use anyhow::{Context, Result, anyhow, bail};
use api::{ApiClient, JobsApi, LogReporter};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use filters::{FilterState, JobFilter, Period, PeriodField, to_iso};
use format::{format_relative_date, html_to_text, truncate};
use models::{JobSource, JobStatus, Preferences};
use preferences::PreferencesDraft;
use settings::{
    ColumnKey, Density, TABLE_SETTINGS, THEME, TableSettings, ThemeMode, parse_refresh_interval,
    refresh_label,
};
use status::StatusCoordinator;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use storage::Store;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hunter")]
#[command(about = "Browse, filter and triage matched job postings")]
struct Cli {
    /// Jobs API base URL (overrides JOB_HUNTER_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive dashboard
    Browse {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// List jobs matching a filter
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Print the filter as a shareable query string instead of jobs
        #[arg(long)]
        share: bool,

        /// Maximum number of rows to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a job with its description and AI reasoning
    Show {
        /// External job ID
        job_id: String,
    },

    /// Change a job's status (new, unseen, reviewed, applied, irrelevant)
    Status {
        /// External job ID
        job_id: String,

        status: JobStatus,
    },

    /// Re-run AI matching for stored jobs
    Rematch {
        /// Only jobs newer than this (24h, 3d, 7d, 30d or an RFC 3339 time)
        #[arg(long)]
        since: Option<String>,
    },

    /// Count jobs by status and source
    Stats {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Check that the API is up
    Health,

    /// Manage matching preferences
    Prefs {
        #[command(subcommand)]
        command: PrefsCommands,
    },

    /// Manage the dashboard table layout
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Show or change the color theme (dark, light, toggle)
    Theme { mode: Option<String> },
}

#[derive(Subcommand)]
enum PrefsCommands {
    /// Print the saved preferences
    Show,

    /// Edit and save preferences
    Set {
        /// Free-text description of the jobs you want
        #[arg(long)]
        raw: Option<String>,

        #[arg(long, value_delimiter = ',')]
        categories: Option<Vec<String>>,

        #[arg(long, value_delimiter = ',')]
        seniority: Option<Vec<String>>,

        #[arg(long, value_delimiter = ',')]
        keywords: Option<Vec<String>>,

        #[arg(long, value_delimiter = ',')]
        exclude: Option<Vec<String>>,

        #[arg(long, value_delimiter = ',')]
        sources: Option<Vec<JobSource>>,

        #[arg(long)]
        remote_only: Option<bool>,

        #[arg(long)]
        min_score: Option<u8>,

        #[arg(long)]
        notifications: Option<bool>,
    },

    /// Turn free text into structured preferences
    Normalize {
        /// Text to normalize (defaults to the saved raw input)
        raw: Option<String>,

        /// Save the result
        #[arg(long)]
        save: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Print the current table layout
    Show,

    /// Reorder columns; listed columns move to the front in the given order
    Columns { columns: Vec<ColumnKey> },

    /// Show or hide a column
    Toggle { column: ColumnKey },

    /// Set a column width in cells
    Width { column: ColumnKey, width: u16 },

    /// Row density (compact, default)
    Density { density: Density },

    /// Auto-refresh interval (off, 30s, 1m, 2m, 5m)
    Refresh {
        #[arg(value_parser = parse_refresh_interval)]
        interval: u64,
    },

    /// Restore the default layout
    Reset,
}

#[derive(Args, Default)]
struct FilterArgs {
    /// Start from a shared filter query string
    #[arg(long)]
    view: Option<String>,

    /// Only these statuses (comma separated)
    #[arg(long, value_delimiter = ',')]
    status: Vec<JobStatus>,

    /// Only these sources (comma separated)
    #[arg(long, value_delimiter = ',')]
    source: Vec<JobSource>,

    /// Case-insensitive text search
    #[arg(short, long)]
    search: Option<String>,

    /// Remote jobs only
    #[arg(long)]
    remote: bool,

    /// Minimum AI score (jobs without a score are excluded)
    #[arg(long)]
    min_score: Option<u8>,

    /// Time window (24h, 3d, 7d, 30d)
    #[arg(long)]
    period: Option<Period>,

    /// Date the window applies to (matched, published, updated)
    #[arg(long)]
    period_field: Option<PeriodField>,
}

impl FilterArgs {
    fn into_filter(self) -> JobFilter {
        let state = self
            .view
            .as_deref()
            .map(FilterState::from_query)
            .unwrap_or_default();
        let mut filter = state.get().clone();
        if !self.status.is_empty() {
            filter.statuses = self.status;
        }
        if !self.source.is_empty() {
            filter.sources = self.source;
        }
        if self.search.is_some() {
            filter.search = self.search;
        }
        if self.remote {
            filter.remote = true;
        }
        if self.min_score.is_some() {
            filter.min_score = self.min_score;
        }
        if self.period.is_some() {
            filter.period = self.period;
        }
        if let Some(field) = self.period_field {
            filter.period_field = field;
        }
        filter
    }
}

fn init_logging(verbose: u8, log_file: Option<PathBuf>) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    // the dashboard owns the terminal, so its logs go to a file
    match log_file.and_then(|path| OpenOptions::new().create(true).append(true).open(path).ok()) {
        Some(file) => builder.with_writer(Mutex::new(file)).with_ansi(false).init(),
        None => builder.with_writer(std::io::stderr).init(),
    }
}

fn parse_since(since: &str, now: DateTime<Utc>) -> Result<String> {
    if let Ok(period) = since.parse::<Period>() {
        return Ok(to_iso(period.cutoff(now)));
    }
    let instant = DateTime::parse_from_rfc3339(since)
        .with_context(|| format!("Invalid --since '{}' (use 24h, 3d, 7d, 30d or RFC 3339)", since))?;
    Ok(to_iso(instant.with_timezone(&Utc)))
}

fn fetch_jobs(api: &ApiClient, filter: &JobFilter) -> Result<Vec<models::Job>> {
    let query = filter.server_key().to_list_query(Utc::now());
    api.list_jobs(&query).context("Failed to fetch jobs")
}

fn print_preferences(prefs: &Preferences) {
    let list = |values: &[String]| {
        if values.is_empty() {
            "-".to_string()
        } else {
            values.join(", ")
        }
    };
    println!("Raw input:     {}", prefs.raw_input.as_deref().unwrap_or("-"));
    println!("Categories:    {}", list(&prefs.categories));
    println!("Seniority:     {}", list(&prefs.seniority_levels));
    println!("Keywords:      {}", list(&prefs.keywords));
    println!("Excluded:      {}", list(&prefs.excluded_keywords));
    println!("Remote only:   {}", prefs.remote_only);
    let sources: Vec<String> = prefs.enabled_sources.iter().map(|s| s.to_string()).collect();
    println!("Sources:       {}", list(&sources));
    println!(
        "Min score:     {}",
        prefs.min_score.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
    );
    println!("Notifications: {}", prefs.notifications_enabled);
}

fn print_table_settings(table: &TableSettings) {
    println!("{:<4} {:<14} {:<8} {:>6}", "POS", "COLUMN", "VISIBLE", "WIDTH");
    println!("{}", "-".repeat(35));
    for (i, key) in table.column_order.iter().enumerate() {
        let width = table
            .column_width(*key)
            .map(|w| w.to_string())
            .unwrap_or_else(|| "auto".to_string());
        println!(
            "{:<4} {:<14} {:<8} {:>6}",
            i + 1,
            key.as_str(),
            if table.is_visible(*key) { "yes" } else { "no" },
            width
        );
    }
    let density = match table.density {
        Density::Compact => "compact",
        Density::Default => "default",
    };
    println!("\nDensity: {}", density);
    println!("Auto-refresh: {}", refresh_label(table.refresh_interval));
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let store = Store::open()?;

    let log_file = matches!(cli.command, Commands::Browse { .. })
        .then(|| Store::data_dir().join("hunter.log"));
    init_logging(cli.verbose, log_file);

    let api_url = config::resolve_api_url(cli.api_url.as_deref());
    tracing::debug!(api_url = %api_url, storage = %store.path().display(), "starting");
    let client = || ApiClient::new(&api_url, Box::new(LogReporter)).context("Failed to create API client");

    match cli.command {
        Commands::Browse { filter } => {
            tui::run_browse(&api_url, &store, filter.into_filter())?;
        }

        Commands::List { filter, share, limit } => {
            let filter = filter.into_filter();
            if share {
                println!("?{}", FilterState::new(filter).share_query());
                return Ok(());
            }

            let api = client()?;
            let jobs = fetch_jobs(&api, &filter)?;
            let visible = view::filter_jobs(&jobs, &filter);
            if visible.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "{:<14} {:<11} {:<36} {:<20} {:<9} {:>5} {:<12}",
                    "JOB ID", "STATUS", "TITLE", "COMPANY", "SOURCE", "SCORE", "DATE"
                );
                println!("{}", "-".repeat(113));
                for job in visible.iter().take(limit.unwrap_or(usize::MAX)) {
                    println!(
                        "{:<14} {:<11} {:<36} {:<20} {:<9} {:>5} {:<12}",
                        truncate(&job.job_id, 14),
                        job.status.label(),
                        truncate(&job.title, 34),
                        truncate(job.company.as_deref().unwrap_or("-"), 18),
                        job.source.as_str(),
                        job.score.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                        format_relative_date(Some(job.effective_date()))
                    );
                }
                println!("\n{} of {} jobs  ({})", visible.len(), jobs.len(), filter.describe());
            }
        }

        Commands::Show { job_id } => {
            let api = client()?;
            let detail = api
                .job_detail(&job_id)
                .with_context(|| format!("Failed to load job {}", job_id))?;
            let job = &detail.job;
            println!("{}", job.title);
            if let Some(company) = &job.company {
                println!("Company: {}", company);
            }
            println!("Status: {}", job.status.label());
            println!("Source: {}", job.source);
            if let Some(score) = job.score {
                println!("Score: {}", score);
            }
            if let Some(salary) = &job.salary {
                println!("Salary: {}", salary);
            }
            if let Some(location) = &job.location {
                println!("Location: {}", location);
            }
            println!("Remote: {}", if job.remote { "yes" } else { "no" });
            println!("Published: {}", format_relative_date(job.published_at.as_deref()));
            println!("Matched: {}", format_relative_date(job.matched_at.as_deref()));
            if !job.url.is_empty() {
                println!("URL: {}", job.url);
            }
            if let Some(reasoning) = detail.ai_reasoning.as_deref().filter(|r| !r.is_empty()) {
                println!("\n--- AI Reasoning ---\n{}", textwrap::fill(reasoning, 80));
            }
            if let Some(html) = &detail.description {
                let text: Vec<String> = html_to_text(html)
                    .lines()
                    .map(|line| textwrap::fill(line, 80))
                    .collect();
                println!("\n--- Description ---\n{}", text.join("\n"));
            }
        }

        Commands::Status { job_id, status } => {
            let api = client()?;
            let updated = StatusCoordinator::new(&api)
                .set_status(&job_id, status, &mut [])
                .with_context(|| format!("Failed to update job {}", job_id))?;
            println!("Marked '{}' as {}.", updated.title, updated.status.label());
        }

        Commands::Rematch { since } => {
            let since = since
                .as_deref()
                .map(|s| parse_since(s, Utc::now()))
                .transpose()?;
            let api = client()?;
            let response = api.rematch(since.as_deref()).context("Failed to trigger rematch")?;
            println!("{} jobs queued for re-matching.", response.jobs_queued);
        }

        Commands::Stats { filter } => {
            let api = client()?;
            let filter = filter.into_filter();
            let jobs = fetch_jobs(&api, &filter)?;
            let counts = view::count_by_status(&jobs);

            println!("{:<12} {:>6}", "STATUS", "COUNT");
            println!("{}", "-".repeat(19));
            for status in JobStatus::ALL {
                println!("{:<12} {:>6}", status.label(), counts.get(&status).copied().unwrap_or(0));
            }
            println!("{:<12} {:>6}", "Total", jobs.len());

            let mut by_source: BTreeMap<&str, usize> = BTreeMap::new();
            for job in &jobs {
                *by_source.entry(job.source.as_str()).or_default() += 1;
            }
            println!();
            for (source, count) in by_source {
                println!("{:<12} {:>6}", source, count);
            }
        }

        Commands::Health => {
            let api = client()?;
            let health = api.health().context("Health check failed")?;
            println!("{} {}", api.base_url(), serde_json::to_string_pretty(&health)?);
        }

        Commands::Prefs { command } => {
            let api = client()?;
            let mut prefs = PreferencesDraft::load(&api).context("Failed to load preferences")?;
            match command {
                PrefsCommands::Show => print_preferences(prefs.saved()),

                PrefsCommands::Set {
                    raw,
                    categories,
                    seniority,
                    keywords,
                    exclude,
                    sources,
                    remote_only,
                    min_score,
                    notifications,
                } => {
                    if let Some(raw) = raw {
                        prefs.set_raw_input(&raw);
                    }
                    if let Some(values) = categories {
                        prefs.set_categories(values);
                    }
                    if let Some(values) = seniority {
                        prefs.set_seniority_levels(values);
                    }
                    if let Some(values) = keywords {
                        prefs.set_keywords(values);
                    }
                    if let Some(values) = exclude {
                        prefs.set_excluded_keywords(values);
                    }
                    if let Some(values) = sources {
                        prefs.set_enabled_sources(values);
                    }
                    if let Some(remote_only) = remote_only {
                        prefs.draft.remote_only = remote_only;
                    }
                    if min_score.is_some() {
                        prefs.draft.min_score = min_score;
                    }
                    if let Some(enabled) = notifications {
                        prefs.draft.notifications_enabled = enabled;
                    }

                    if !prefs.is_dirty() {
                        println!("No changes.");
                    } else {
                        let saved = prefs.save(&api).context("Failed to save preferences")?;
                        println!("Preferences saved.\n");
                        print_preferences(saved);
                    }
                }

                PrefsCommands::Normalize { raw, save } => {
                    if let Some(raw) = raw {
                        prefs.set_raw_input(&raw);
                    }
                    match prefs.normalize(&api).context("Failed to normalize preferences")? {
                        None => bail!("Nothing to normalize: raw input is empty"),
                        Some(_) => print_preferences(&prefs.draft),
                    }
                    if save {
                        prefs.save(&api).context("Failed to save preferences")?;
                        println!("\nPreferences saved.");
                    }
                }
            }
        }

        Commands::Settings { command } => {
            let mut table = TableSettings::load(&store);
            match command {
                SettingsCommands::Show => {
                    print_table_settings(&table);
                    return Ok(());
                }
                SettingsCommands::Columns { columns } => {
                    for (i, key) in columns.into_iter().enumerate() {
                        table.move_column(key, i);
                    }
                }
                SettingsCommands::Toggle { column } => {
                    if !table.toggle_column(column) {
                        bail!("Column '{}' cannot be hidden", column);
                    }
                }
                SettingsCommands::Width { column, width } => table.set_column_width(column, width),
                SettingsCommands::Density { density } => table.set_density(density),
                SettingsCommands::Refresh { interval } => table.set_refresh_interval(interval),
                SettingsCommands::Reset => {
                    TABLE_SETTINGS.clear(&store);
                    tracing::info!(key = TABLE_SETTINGS.key(), "table settings reset");
                    table = TableSettings::load(&store);
                }
            }
            table.save(&store);
            print_table_settings(&table);
        }

        Commands::Theme { mode } => {
            let mut theme = THEME.load(&store);
            match mode.as_deref() {
                None => {}
                Some("toggle") => theme.toggle(),
                Some(value) => {
                    theme.mode = value.parse::<ThemeMode>().map_err(|e| anyhow!(e))?;
                }
            }
            if mode.is_some() {
                THEME.save(&store, &theme);
            }
            println!("Theme: {}", if theme.is_dark() { "dark" } else { "light" });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_shared_view() {
        let args = FilterArgs {
            view: Some("statuses=NEW,APPLIED&remote=true&period=7d".to_string()),
            status: vec![JobStatus::Reviewed],
            min_score: Some(50),
            ..Default::default()
        };
        let filter = args.into_filter();
        assert_eq!(filter.statuses, vec![JobStatus::Reviewed]);
        assert!(filter.remote);
        assert_eq!(filter.period, Some(Period::Week));
        assert_eq!(filter.min_score, Some(50));
    }

    #[test]
    fn test_parse_since() {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        assert_eq!(parse_since("24h", now).unwrap(), "2024-01-09T12:00:00.000Z");
        assert_eq!(
            parse_since("2024-01-01T02:00:00+02:00", now).unwrap(),
            "2024-01-01T00:00:00.000Z"
        );
        assert!(parse_since("yesterday", now).is_err());
    }
}
