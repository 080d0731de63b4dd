use boxoffice::application::booking::BookingService;
use boxoffice::config::BookingConfig;
use boxoffice::domain::ports::LedgerStoreBox;
use boxoffice::infrastructure::clock::ManualClock;
use boxoffice::infrastructure::in_memory::InMemoryLedgerStore;
use boxoffice::infrastructure::payment::TokenPaymentGateway;
#[cfg(feature = "storage-rocksdb")]
use boxoffice::infrastructure::rocksdb::RocksDBLedgerStore;
use boxoffice::interfaces::batch::CommandRunner;
use boxoffice::interfaces::csv::command_reader::CommandReader;
use boxoffice::interfaces::csv::seat_writer::SeatWriter;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input booking commands CSV file
    input: PathBuf,

    /// Path to a persistent ledger (optional). If provided, uses RocksDB.
    #[arg(long, env = "BOXOFFICE_LEDGER_PATH")]
    ledger_path: Option<PathBuf>,

    /// Default hold lifetime in seconds
    #[arg(long, env = "BOXOFFICE_HOLD_TTL_SECS", default_value_t = 600)]
    hold_ttl_secs: u64,

    /// Upper bound on a payment authorization in milliseconds
    #[arg(long, env = "BOXOFFICE_PAYMENT_TIMEOUT_MS", default_value_t = 5_000)]
    payment_timeout_ms: u64,

    /// Seconds between background sweeps for expired holds
    #[arg(long, env = "BOXOFFICE_SWEEP_INTERVAL_SECS", default_value_t = 30)]
    sweep_interval_secs: u64,

    /// Attempts per ledger append when the store reports a transient failure
    #[arg(long, env = "BOXOFFICE_LEDGER_RETRY_ATTEMPTS", default_value_t = 3)]
    ledger_retry_attempts: u32,

    /// Base backoff between ledger append attempts in milliseconds
    #[arg(long, env = "BOXOFFICE_LEDGER_RETRY_BACKOFF_MS", default_value_t = 25)]
    ledger_retry_backoff_ms: u64,

    /// Return seats to sale when a booking is cancelled
    #[arg(long, env = "BOXOFFICE_RELEASE_ON_CANCEL")]
    release_on_cancel: bool,
}

impl Cli {
    fn config(&self) -> BookingConfig {
        BookingConfig {
            hold_ttl_secs: self.hold_ttl_secs,
            payment_timeout_ms: self.payment_timeout_ms,
            sweep_interval_secs: self.sweep_interval_secs,
            ledger_retry_attempts: self.ledger_retry_attempts,
            ledger_retry_backoff_ms: self.ledger_retry_backoff_ms,
            release_on_cancel: self.release_on_cancel,
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(io::stderr)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(io::stderr)
            .compact()
            .init();
    }
}

#[cfg(feature = "storage-rocksdb")]
fn ledger_store(path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    match path {
        Some(path) => Ok(Box::new(RocksDBLedgerStore::open(path).into_diagnostic()?)),
        None => Ok(Box::new(InMemoryLedgerStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn ledger_store(path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    if path.is_some() {
        eprintln!(
            "WARNING: Persistent ledger requested via --ledger-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Box::new(InMemoryLedgerStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config();

    let clock = ManualClock::default();
    let service = BookingService::open(
        config,
        ledger_store(cli.ledger_path)?,
        Arc::new(TokenPaymentGateway::new()),
        Arc::new(clock.clone()),
    )
    .await
    .into_diagnostic()?;
    let sweeper = service.spawn_sweeper();
    let mut runner = CommandRunner::new(service, clock);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = runner.execute(command).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }
    sweeper.shutdown().await;

    let seats = runner.seat_map().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = SeatWriter::new(stdout.lock());
    writer.write_seats(seats).into_diagnostic()?;

    Ok(())
}
