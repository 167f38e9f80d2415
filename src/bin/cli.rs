//! regfeeds CLI
//!
//! Lists topics, feeds and entries from the feed API and exports filtered
//! entry sets as JSON or CSV.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use regfeeds::{
    config,
    error::{AppError, Result},
    models::{Config, ContentKind, Field, timestamp},
    pipeline::{QueryPipeline, Search},
    services::{ApiClient, Selector},
    storage::ContentFetcher,
};

/// regfeeds - Regulatory feed client
#[derive(Parser, Debug)]
#[command(name = "regfeeds", version, about = "Query regulatory feed topics and entries")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "regfeeds.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all topics
    Topics,

    /// List feeds, optionally for one topic
    Feeds {
        #[arg(long)]
        topic_id: Option<String>,
    },

    /// List a user's topic subscriptions
    Subscriptions { user_id: String },

    /// Query entries and export them
    Entries(EntriesArgs),

    /// Resolve s3:// content paths to text
    Content {
        #[arg(required = true)]
        paths: Vec<String>,

        /// Parallel fetches (1-50)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Validate configuration
    Validate,
}

#[derive(clap::Args, Debug)]
struct EntriesArgs {
    #[arg(long)]
    topic_id: Option<String>,

    /// Case-insensitive topic name fragment
    #[arg(long)]
    topic_name: Option<String>,

    #[arg(long)]
    feed_id: Option<String>,

    /// Case-insensitive feed name fragment
    #[arg(long)]
    feed_name: Option<String>,

    /// Keyword to search for (repeatable)
    #[arg(short, long = "search")]
    keywords: Vec<String>,

    /// Field to search in (repeatable): title, description, link,
    /// content_markdown, content_html, topic_name, feed_name
    #[arg(long = "field", value_parser = parse_field)]
    fields: Vec<Field>,

    /// Require every keyword to match
    #[arg(long)]
    match_all: bool,

    #[arg(long)]
    case_sensitive: bool,

    /// Earliest publication date (YYYY-MM-DD or RFC 3339), inclusive
    #[arg(long, value_parser = parse_start)]
    from: Option<DateTime<Utc>>,

    /// Latest publication date (YYYY-MM-DD or RFC 3339), inclusive
    #[arg(long, value_parser = parse_end)]
    to: Option<DateTime<Utc>>,

    /// Keep only active (true) or inactive (false) entries
    #[arg(long)]
    active: Option<bool>,

    /// Resolve stored bodies for the filtered entries
    #[arg(long)]
    fetch_content: bool,

    #[arg(long, value_enum, default_value_t = KindArg::Markdown)]
    content_kind: KindArg,

    /// Parallel content fetches (1-50)
    #[arg(long)]
    workers: Option<usize>,

    /// Allow loading every entry when no topic or feed filter is given
    #[arg(long)]
    full_scan: bool,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Json,
    Csv,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Markdown,
    Html,
    Aggregated,
}

impl From<KindArg> for ContentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Markdown => ContentKind::Markdown,
            KindArg::Html => ContentKind::Html,
            KindArg::Aggregated => ContentKind::AggregatedMarkdown,
        }
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, default_level: &str) {
    let level = if verbose { "debug" } else { default_level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn parse_field(raw: &str) -> std::result::Result<Field, String> {
    raw.parse().map_err(|e: AppError| e.to_string())
}

fn parse_start(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_bound(raw, false)
}

fn parse_end(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_bound(raw, true)
}

/// A bare date covers the whole day: start of day for `from`, end of day for `to`.
fn parse_bound(raw: &str, end_of_day: bool) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_milli_opt(23, 59, 59, 999)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        return time
            .map(|t| t.and_utc())
            .ok_or_else(|| format!("invalid date '{raw}'"));
    }
    timestamp::parse(raw).ok_or_else(|| format!("invalid date '{raw}'"))
}

fn selector(id: Option<&str>, name: Option<&str>) -> Result<Option<Selector>> {
    if id.is_none() && name.is_none() {
        return Ok(None);
    }
    Selector::from_parts(id, name).map(Some)
}

fn emit(text: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            log::info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

async fn run_entries(config: &Config, args: EntriesArgs) -> Result<()> {
    let topic = selector(args.topic_id.as_deref(), args.topic_name.as_deref())?;
    let feed = selector(args.feed_id.as_deref(), args.feed_name.as_deref())?;

    let mut query = QueryPipeline::from_config(config)
        .await?
        .allow_full_scan(args.full_scan || config.query.allow_full_scan);

    if let Some(topic) = topic {
        query.filter_by_topic(topic).await?;
    }
    if let Some(feed) = feed {
        query.filter_by_feed(feed).await?;
    }
    if !args.keywords.is_empty() {
        let mut search = Search::new(args.keywords)
            .match_all(args.match_all)
            .case_sensitive(args.case_sensitive);
        if !args.fields.is_empty() {
            search = search.in_fields(args.fields);
        }
        query.search(&search).await?;
    }
    if args.from.is_some() || args.to.is_some() {
        query.filter_by_date(args.from, args.to).await?;
    }
    if let Some(active) = args.active {
        query.filter_by_active(active).await?;
    }
    if !query.is_loaded() {
        query.load().await?;
    }
    if args.fetch_content {
        query
            .fetch_content(args.content_kind.into(), args.workers)
            .await?;
    }

    log::info!("{} entries matched", query.len());
    match (args.format, args.output.as_ref()) {
        (Format::Json, output) => emit(&query.to_json(true)?, output),
        (Format::Csv, Some(path)) => {
            query.to_csv(path)?;
            Ok(())
        }
        (Format::Csv, None) => query.write_csv(io::stdout().lock()),
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_level = Config::load(&cli.config)
        .map(|c| c.logging.level)
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &file_level);

    let config = config::load(&cli.config)?;
    log::debug!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Topics => {
            let topics = ApiClient::new(&config.api)?.list_topics().await?;
            log::info!("{} topics", topics.len());
            emit(&serde_json::to_string_pretty(&topics)?, None)?;
        }

        Command::Feeds { topic_id } => {
            let mut feeds = ApiClient::new(&config.api)?.list_feeds().await?;
            if let Some(topic_id) = topic_id {
                feeds.retain(|f| f.parent_topic_id() == Some(topic_id.as_str()));
            }
            log::info!("{} feeds", feeds.len());
            emit(&serde_json::to_string_pretty(&feeds)?, None)?;
        }

        Command::Subscriptions { user_id } => {
            let subs = ApiClient::new(&config.api)?
                .user_subscriptions(&user_id)
                .await?;
            log::info!("{} subscriptions", subs.total_count);
            emit(&serde_json::to_string_pretty(&subs)?, None)?;
        }

        Command::Entries(args) => run_entries(&config, args).await?,

        Command::Content { paths, workers } => {
            let fetcher = ContentFetcher::from_config(&config).await?;
            let bodies = fetcher
                .fetch_batch(&paths, workers.unwrap_or(config.storage.max_workers))
                .await?;
            let ordered: BTreeMap<_, _> = bodies.into_iter().collect();
            emit(&serde_json::to_string_pretty(&ordered)?, None)?;
        }

        Command::Validate => {
            log::info!("Configuration OK");
            log::info!("API base URL: {}", config.api.base_url);
            log::info!(
                "API key: {}",
                if config.api.api_key.is_some() {
                    "set"
                } else {
                    "missing"
                }
            );
            let storage = &config.storage;
            let credentials = if storage.profile.is_some() {
                "profile"
            } else if storage.access_key_id.is_some() {
                "access key pair"
            } else {
                "default chain"
            };
            log::info!(
                "Storage: region {}, credentials from {credentials}, {} workers",
                storage.region,
                storage.max_workers
            );
            if config.api.api_key.is_none() {
                return Err(AppError::authentication(
                    "no API key configured; set CARVER_API_KEY or [api] api_key",
                ));
            }
        }
    }

    Ok(())
}
