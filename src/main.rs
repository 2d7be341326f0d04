//! CLI entry point for the roll tracker.
//!
//! Provides subcommands for analytics reports, the dashboard summary, CSV
//! export to disk or S3, barcode scans, and roll catalog maintenance.

use anyhow::{Context, Result, bail};
use chrono::{Local, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use roll_tracker::aggregate::{DashboardSnapshot, UsageAggregator};
use roll_tracker::config::{Settings, log_file_path};
use roll_tracker::export::{export_filename, render_json, write_json};
use roll_tracker::model::{NewRoll, RollStatus, UsagePatch};
use roll_tracker::scan::{ScanForm, record_scan};
use roll_tracker::sink::{CsvSink, FileSink, S3Sink};
use roll_tracker::store::{FileRecordStore, RecordStore, RestRecordStore};
use std::ffi::OsStr;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "roll_tracker")]
#[command(about = "Track packaging roll usage on the production line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full analytics report as JSON
    Report {
        /// Read usage from a JSON or CSV dump instead of the record store
        #[arg(short, long)]
        input: Option<String>,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Show the dashboard counters and the most recent transactions
    Dashboard {
        /// Read usage from a JSON or CSV dump instead of the record store
        #[arg(short, long)]
        input: Option<String>,

        /// Roll catalog dump to pair with --input
        #[arg(long, requires = "input")]
        rolls: Option<String>,
    },
    /// Export every usage record as CSV
    Export {
        /// Read usage from a JSON or CSV dump instead of the record store
        #[arg(short, long)]
        input: Option<String>,

        /// Directory to write the CSV to
        #[arg(short = 'd', long, default_value = "exports")]
        output_dir: String,

        /// Optional: S3 bucket to upload the CSV to instead of writing locally
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Optional: Gzip compress the CSV before uploading to S3
        #[arg(long, default_value_t = false, requires = "s3_bucket")]
        gzip: bool,
    },
    /// Record a roll usage from a barcode scan
    Scan {
        #[arg(long)]
        barcode: String,

        #[arg(long)]
        machine: String,

        #[arg(long)]
        pieces: String,

        #[arg(long, default_value = "")]
        line: String,

        #[arg(long, default_value = "")]
        operator: String,

        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Replace the editable fields of a usage record
    EditUsage {
        #[arg(long)]
        id: String,

        #[arg(long)]
        machine: String,

        #[arg(long)]
        pieces: u64,

        /// Line number; 0 clears it
        #[arg(long)]
        line: Option<u32>,

        #[arg(long)]
        operator: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a usage record
    DeleteUsage {
        #[arg(long)]
        id: String,
    },
    /// List the roll catalog
    ListRolls {
        /// Only show rolls with this status (active, inactive, deprecated)
        #[arg(short, long)]
        status: Option<RollStatus>,
    },
    /// Add a roll to the catalog
    AddRoll(RollArgs),
    /// Replace the fields of a catalog roll
    EditRoll {
        #[arg(long)]
        id: String,

        #[command(flatten)]
        roll: RollArgs,
    },
    /// Delete a roll from the catalog
    DeleteRoll {
        #[arg(long)]
        id: String,
    },
}

#[derive(Args, Debug)]
struct RollArgs {
    #[arg(long)]
    barcode: String,

    #[arg(long)]
    name: String,

    #[arg(long)]
    width_mm: Option<u32>,

    #[arg(long)]
    length_m: Option<f64>,

    #[arg(long)]
    weight_kg: Option<f64>,

    #[arg(long)]
    supplier: Option<String>,

    #[arg(long, default_value = "active")]
    status: RollStatus,
}

impl From<RollArgs> for NewRoll {
    fn from(args: RollArgs) -> Self {
        NewRoll {
            barcode: args.barcode.trim().to_string(),
            roll_name: args.name.trim().to_string(),
            width_mm: args.width_mm,
            length_m: args.length_m,
            weight_kg: args.weight_kg,
            supplier: args.supplier.filter(|s| !s.trim().is_empty()),
            status: args.status,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing()?;

    let cli = Cli::parse();
    let settings = Settings::load();

    match settings.utc_offset() {
        Some(offset) => run(cli.command, &settings, offset).await,
        None => run(cli.command, &settings, Local).await,
    }
}

/// Logging setup: colored stderr + JSON rolling log file.
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path = log_file_path();
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("roll_tracker.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(file_guard)
}

/// Opens the offline dump when `input` is given, otherwise the managed store.
///
/// Timestamps without an offset are read in `tz`, the zone used for bucketing.
fn open_store<Tz>(
    input: Option<&str>,
    rolls: Option<&str>,
    settings: &Settings,
    tz: Tz,
) -> Result<Box<dyn RecordStore>>
where
    Tz: TimeZone + Send + Sync + 'static,
{
    if let Some(path) = input {
        let mut store = FileRecordStore::new(path).with_zone(tz);
        if let Some(rolls) = rolls {
            store = store.with_rolls(rolls);
        }
        info!(path, "Using file record store");
        return Ok(Box::new(store));
    }

    let (Some(url), Some(key)) = (&settings.store_url, &settings.store_key) else {
        bail!("ROLL_TRACKER_STORE_URL and ROLL_TRACKER_STORE_KEY must be set (or pass --input)");
    };
    let token = settings.access_token.as_deref().unwrap_or(key);
    let store = RestRecordStore::connect(url, key, token).context("cannot configure store client")?;
    Ok(Box::new(store.with_zone(tz)))
}

async fn run<Tz>(command: Commands, settings: &Settings, tz: Tz) -> Result<()>
where
    Tz: TimeZone + Send + Sync + 'static,
{
    let today = Utc::now().with_timezone(&tz).date_naive();

    match command {
        Commands::Report { input, output } => {
            let store = open_store(input.as_deref(), None, settings, tz.clone())?;
            let records = store.list_usage().await?;
            let report = UsageAggregator::new(&records, tz)
                .with_locale(settings.locale.clone())
                .report();

            match output {
                Some(path) => {
                    write_json(&path, &report)?;
                    info!(path = %path, records = report.record_count, "Report written");
                }
                None => println!("{}", render_json(&report)?),
            }
        }
        Commands::Dashboard { input, rolls } => {
            let store = open_store(input.as_deref(), rolls.as_deref(), settings, tz.clone())?;
            let catalog = store.list_rolls().await?;
            let records = store.list_usage().await?;
            let usage = UsageAggregator::new(&records, tz.clone())
                .with_locale(settings.locale.clone());
            let snapshot = DashboardSnapshot::build(&catalog, &usage, today);

            info!(
                total_rolls = snapshot.total_rolls,
                todays_transactions = snapshot.todays_transactions,
                total_transactions = snapshot.total_transactions,
                "Dashboard"
            );

            for record in &snapshot.recent {
                let when = record
                    .usage_date
                    .with_timezone(&tz)
                    .naive_local()
                    .format(&settings.locale.datetime)
                    .to_string();
                info!(
                    roll = %record.roll.roll_name,
                    barcode = %record.roll.barcode,
                    machine = %record.machine_number,
                    pieces = record.pieces_counter,
                    line = record.line_number,
                    operator = record.operator_name.as_deref().unwrap_or("-"),
                    date = %when,
                    "Recent usage"
                );
            }
        }
        Commands::Export {
            input,
            output_dir,
            s3_bucket,
            gzip,
        } => {
            let store = open_store(input.as_deref(), None, settings, tz.clone())?;
            let records = store.list_usage().await?;
            let csv = UsageAggregator::new(&records, tz)
                .with_locale(settings.locale.clone())
                .export_csv();

            let sink: Box<dyn CsvSink> = match s3_bucket {
                Some(bucket) => {
                    info!(bucket = %bucket, gzip, "S3 upload enabled");
                    Box::new(S3Sink::from_env(bucket, gzip).await)
                }
                None => Box::new(FileSink::new(output_dir)),
            };

            let location = sink.deliver(&export_filename(today), &csv).await?;
            info!(location = %location, records = records.len(), "Export complete");
        }
        Commands::Scan {
            barcode,
            machine,
            pieces,
            line,
            operator,
            notes,
        } => {
            let store = open_store(None, None, settings, tz.clone())?;
            let form = ScanForm {
                barcode,
                machine_number: machine,
                pieces_counter: pieces,
                line_number: line,
                operator_name: operator,
                notes,
            };
            let record = record_scan(store.as_ref(), &form).await?;
            info!(id = %record.id, roll = %record.roll.roll_name, "Scan saved");
        }
        Commands::EditUsage {
            id,
            machine,
            pieces,
            line,
            operator,
            notes,
        } => {
            let store = open_store(None, None, settings, tz.clone())?;
            let patch = UsagePatch {
                machine_number: machine.trim().to_string(),
                pieces_counter: pieces,
                line_number: line.filter(|&l| l != 0),
                operator_name: operator.filter(|o| !o.trim().is_empty()),
                notes: notes.filter(|n| !n.trim().is_empty()),
            };
            let record = store.update_usage(&id, &patch).await?;
            info!(id = %record.id, pieces = record.pieces_counter, "Usage updated");
        }
        Commands::DeleteUsage { id } => {
            let store = open_store(None, None, settings, tz.clone())?;
            store.delete_usage(&id).await?;
            info!(id = %id, "Usage deleted");
        }
        Commands::ListRolls { status } => {
            let store = open_store(None, None, settings, tz.clone())?;
            let rolls = store.list_rolls().await?;

            info!(total = rolls.len(), "Roll list fetched");

            for roll in rolls
                .iter()
                .filter(|r| status.is_none_or(|s| r.status == s))
            {
                info!(
                    roll_id = %roll.id,
                    barcode = %roll.barcode,
                    roll_name = %roll.roll_name,
                    status = %roll.status,
                    width_mm = roll.width_mm,
                    supplier = roll.supplier.as_deref().unwrap_or("-"),
                    "Roll"
                );
            }

            let count = |s: RollStatus| rolls.iter().filter(|r| r.status == s).count();
            info!(
                total = rolls.len(),
                active = count(RollStatus::Active),
                inactive = count(RollStatus::Inactive),
                deprecated = count(RollStatus::Deprecated),
                "Roll list summary"
            );
        }
        Commands::AddRoll(args) => {
            let store = open_store(None, None, settings, tz.clone())?;
            let created = store.create_roll(&NewRoll::from(args)).await?;
            info!(roll_id = %created.id, barcode = %created.barcode, "Roll added");
        }
        Commands::EditRoll { id, roll } => {
            let store = open_store(None, None, settings, tz.clone())?;
            let updated = store.update_roll(&id, &NewRoll::from(roll)).await?;
            info!(
                roll_id = %updated.id,
                barcode = %updated.barcode,
                status = %updated.status,
                "Roll updated"
            );
        }
        Commands::DeleteRoll { id } => {
            let store = open_store(None, None, settings, tz.clone())?;
            store.delete_roll(&id).await?;
            info!(id = %id, "Roll deleted");
        }
    }

    Ok(())
}
