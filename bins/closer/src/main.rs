//! Carnet command-line driver.
//!
//! Loads the dossier snapshot, applies one command and writes the snapshot
//! back when the command changed anything.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carnet_core::closing::ClosingPhase;
use carnet_core::fiscal::{Ledger, PeriodBounds};
use carnet_core::ledger::Account;
use carnet_db::{ClosingObserver, ClosingWorkflow, Engine, EntryFilter, MemoryConnection};
use carnet_shared::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "carnet-closer", version, about = "Import, check and close Carnet dossiers")]
struct Cli {
    /// Dossier snapshot; defaults to the configured storage path.
    #[arg(long, env = "CARNET_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Creates an empty dossier with its first period.
    Init {
        #[arg(long)]
        begin: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Adds a ledger.
    Ledger { id: String, label: String },
    /// Adds an account to the chart.
    Account {
        id: String,
        label: String,
        currency: String,
        #[arg(long)]
        settleable: bool,
        #[arg(long)]
        reconciliable: bool,
        #[arg(long)]
        forward: bool,
    },
    /// Imports entries from a CSV file.
    Import {
        file: PathBuf,
        /// Clamp effect dates before a ledger's closing date instead of rejecting them.
        #[arg(long)]
        auto_correct: bool,
    },
    /// Exports every entry to a CSV file.
    Export { file: PathBuf },
    /// Checks that entries, ledgers and accounts balance and agree.
    Check,
    /// Changes the current period's dates, moving entries across the new bounds.
    Dates {
        #[arg(long)]
        begin: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Only count the entries that would move.
        #[arg(long)]
        dry_run: bool,
    },
    /// Closes the current period and opens the next one.
    Close {
        #[arg(long)]
        begin: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
}

/// Logs phase progress.
struct ProgressLog;

impl ClosingObserver for ProgressLog {
    fn phase_started(&mut self, phase: ClosingPhase) {
        info!(%phase, "Closing phase started");
    }

    fn phase_finished(&mut self, phase: ClosingPhase) {
        info!(%phase, "Closing phase finished");
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carnet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;
    let path = cli
        .snapshot
        .clone()
        .unwrap_or_else(|| config.storage.snapshot_path.clone());

    let conn = if matches!(cli.command, Command::Init { .. }) {
        MemoryConnection::new()
    } else {
        MemoryConnection::load(&path).with_context(|| format!("cannot open dossier {}", path.display()))?
    };
    let mut engine = Engine::new(conn, config);

    let dirty = match cli.command {
        Command::Init { begin, end } => {
            engine.install_period(PeriodBounds::new(Some(begin), Some(end)))?;
            info!(%begin, %end, "Dossier created");
            true
        }
        Command::Ledger { id, label } => {
            engine.add_ledger(&Ledger::new(id, label))?;
            true
        }
        Command::Account {
            id,
            label,
            currency,
            settleable,
            reconciliable,
            forward,
        } => {
            let mut account = Account::new(id, label, currency.to_uppercase());
            account.settleable = settleable;
            account.reconciliable = reconciliable;
            account.forward = forward;
            engine.add_account(&account)?;
            true
        }
        Command::Import { file, auto_correct } => {
            let reader = BufReader::new(File::open(&file).with_context(|| format!("cannot read {}", file.display()))?);
            let report = engine.import_csv(reader, auto_correct)?;
            for error in &report.errors {
                warn!(code = error.error_code(), "{error}");
            }
            info!(inserted = report.inserted.len(), rejected = report.errors.len(), "Import done");
            !report.inserted.is_empty()
        }
        Command::Export { file } => {
            let writer = BufWriter::new(File::create(&file).with_context(|| format!("cannot write {}", file.display()))?);
            let count = engine.export_csv(writer, &EntryFilter::new())?;
            info!(entries = count, file = %file.display(), "Export done");
            false
        }
        Command::Check => {
            engine.check_balances()?;
            info!("Dossier is balanced");
            false
        }
        Command::Dates { begin, end, dry_run } => {
            let report = engine.change_period_dates(PeriodBounds::new(begin, end), dry_run)?;
            info!(begin = report.begin, end = report.end, dry_run, "Entries moved by the new dates");
            !dry_run
        }
        Command::Close { begin, end } => {
            let mut workflow = ClosingWorkflow::new(PeriodBounds::new(Some(begin), Some(end)));
            let summary = workflow.run(&mut engine, &mut ProgressLog)?;
            info!(
                validated = summary.validated,
                soldes = summary.soldes,
                dropped = summary.dropped,
                forwards = summary.forwards,
                migrated = summary.migrated,
                "Period closed"
            );
            true
        }
    };

    if dirty {
        engine
            .into_connection()
            .save(&path)
            .with_context(|| format!("cannot save dossier {}", path.display()))?;
        info!(path = %path.display(), "Dossier saved");
    }
    Ok(())
}
