//! CLI entry point for the corner queue query tool.
//!
//! Provides subcommands for corner statuses, latest/all/timestamp queries
//! for a date, wait estimates at an instant, and day-of-week predictions.

use anyhow::Result;
use chrono::Duration;
use clap::{Parser, Subcommand};
use cornerq::catalog::Catalog;
use cornerq::clock::SystemClock;
use cornerq::menu::{CachedMenuOracle, HttpMenuOracle, MenuOracle, StaticMenuOracle};
use cornerq::output::{append_snapshots, print_json};
use cornerq::router::SourceRouter;
use cornerq::schedule::NoHolidays;
use cornerq::service::QueryService;
use cornerq::store::{DynamoStore, MemoryStore, QueueSnapshot, S3ArchiveStore, TimeSeriesStore};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "cornerq")]
#[command(about = "Query cafeteria corner queue lengths and wait estimates", long_about = None)]
struct Cli {
    /// Path to the restaurant/corner catalog JSON
    #[arg(long, default_value = "config/catalog.json", global = true)]
    catalog: String,

    /// Run against an in-memory store loaded from a snapshot JSON fixture
    /// instead of AWS (both live and archive)
    #[arg(long, global = true)]
    memory_fixture: Option<String>,

    /// DynamoDB table backing the live store (or CORNERQ_LIVE_TABLE)
    #[arg(long, global = true)]
    live_table: Option<String>,

    /// S3 bucket backing the archive store (or CORNERQ_ARCHIVE_BUCKET)
    #[arg(long, global = true)]
    archive_bucket: Option<String>,

    /// Base URL of the menu service (or CORNERQ_MENU_URL); when omitted,
    /// every menu is treated as present
    #[arg(long, global = true)]
    menu_url: Option<String>,

    /// Disable live-store reads; today-queries degrade to unavailable
    #[arg(long, default_value_t = false, global = true)]
    live_disabled: bool,

    /// Live data older than this many seconds is treated as no data
    #[arg(long, default_value_t = 90, global = true)]
    stale_after_secs: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Corner statuses for a restaurant, active corners first
    Statuses {
        /// Restaurant ID from the catalog
        restaurant: String,

        /// Date key, YYYY-MM-DD
        #[arg(long)]
        date: String,

        /// Clock time, HH:MM
        #[arg(long)]
        time: String,
    },
    /// Most recent snapshot across all corners for a date
    Latest {
        /// Date key, YYYY-MM-DD
        #[arg(long)]
        date: String,

        /// CSV file to append result rows to
        #[arg(long)]
        csv: Option<String>,
    },
    /// Every snapshot recorded on a date
    All {
        /// Date key, YYYY-MM-DD
        #[arg(long)]
        date: String,

        /// CSV file to append result rows to
        #[arg(long)]
        csv: Option<String>,
    },
    /// Distinct observation timestamps on a date
    Timestamps {
        /// Date key, YYYY-MM-DD
        #[arg(long)]
        date: String,
    },
    /// Queue and wait estimate at an instant
    WaitAt {
        /// Date key, YYYY-MM-DD
        #[arg(long)]
        date: String,

        /// RFC 3339 timestamp or HH:MM; omit for the latest observation
        #[arg(long)]
        at: Option<String>,

        /// CSV file to append result rows to
        #[arg(long)]
        csv: Option<String>,
    },
    /// Historical prediction for a weekday and time of day
    Predict {
        /// Day of week, 0 = Sunday through 6 = Saturday
        #[arg(long)]
        day: u8,

        /// Clock time, HH:MM
        #[arg(long)]
        time: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/cornerq.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("cornerq.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let service = build_service(&cli).await?;

    match &cli.command {
        Commands::Statuses { restaurant, date, time } => {
            let result = service.statuses_for(restaurant, date, time).await?;
            print_json(&result)?;
        }
        Commands::Latest { date, csv } => {
            let result = service.latest_for_date(date).await?;
            info!(
                rows = result.rows.len(),
                attempted = result.summary.attempted,
                failed = result.summary.failed,
                "Latest snapshot fetched"
            );
            if let Some(path) = csv {
                append_snapshots(path, &result.rows)?;
            }
            print_json(&result)?;
        }
        Commands::All { date, csv } => {
            let rows = service.all_for_date(date).await?;
            if let Some(path) = csv {
                append_snapshots(path, &rows)?;
            }
            print_json(&rows)?;
        }
        Commands::Timestamps { date } => {
            let timestamps = service.timestamps_for_date(date).await?;
            print_json(&timestamps)?;
        }
        Commands::WaitAt { date, at, csv } => {
            let rows = service.wait_at(date, at.as_deref()).await?;
            if let Some(path) = csv {
                append_snapshots(path, &rows)?;
            }
            print_json(&rows)?;
        }
        Commands::Predict { day, time } => {
            let prediction = service.predict(*day, time).await?;
            print_json(&prediction)?;
        }
    }

    Ok(())
}

/// Builds the query service: catalog, stores, menu oracle, router. AWS
/// clients are created once here and live for the whole process.
async fn build_service(cli: &Cli) -> Result<QueryService> {
    let catalog = Arc::new(Catalog::load(&cli.catalog)?);
    info!(
        catalog = %cli.catalog,
        corners = catalog.corner_keys().len(),
        "Catalog loaded"
    );

    let (live_store, archive_store): (Arc<dyn TimeSeriesStore>, Arc<dyn TimeSeriesStore>) =
        if let Some(fixture) = &cli.memory_fixture {
            let records: Vec<QueueSnapshot> =
                serde_json::from_str(&std::fs::read_to_string(fixture)?)?;
            info!(fixture = %fixture, records = records.len(), "Using in-memory store");
            let store = Arc::new(MemoryStore::with_records(records));
            (store.clone(), store)
        } else {
            let config = aws_config::load_from_env().await;
            let live_table = cli
                .live_table
                .clone()
                .or_else(|| std::env::var("CORNERQ_LIVE_TABLE").ok())
                .unwrap_or_else(|| "corner-queues-live".to_string());
            let archive_bucket = cli
                .archive_bucket
                .clone()
                .or_else(|| std::env::var("CORNERQ_ARCHIVE_BUCKET").ok())
                .unwrap_or_else(|| "corner-queues-archive".to_string());
            info!(live_table, archive_bucket, "Using AWS-backed stores");
            (
                Arc::new(DynamoStore::new(
                    aws_sdk_dynamodb::Client::new(&config),
                    live_table,
                )),
                Arc::new(S3ArchiveStore::new(
                    aws_sdk_s3::Client::new(&config),
                    archive_bucket,
                )),
            )
        };

    let menu: Arc<dyn MenuOracle> = match cli
        .menu_url
        .clone()
        .or_else(|| std::env::var("CORNERQ_MENU_URL").ok())
    {
        Some(url) => Arc::new(CachedMenuOracle::new(HttpMenuOracle::new(url)?)),
        None => {
            warn!("No menu service configured, treating every menu as present");
            Arc::new(StaticMenuOracle::all_present())
        }
    };

    if cli.live_disabled {
        warn!("Live store disabled; today-queries will report unavailable");
    }
    let router = SourceRouter::new(!cli.live_disabled, Duration::seconds(cli.stale_after_secs));

    Ok(QueryService::new(
        catalog,
        live_store,
        archive_store,
        Arc::new(SystemClock),
        menu,
        Arc::new(NoHolidays),
        router,
    ))
}
