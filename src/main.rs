use clap::Parser;
use loanport::application::engine::{LendingEngine, Stores};
use loanport::domain::ports::SystemClock;
use loanport::error::Result as LendingResult;
use loanport::infrastructure::gateways::{sandbox_gateways, sandbox_webhook_keys};
use loanport::infrastructure::in_memory::InMemoryStore;
use loanport::interfaces::csv::report_writer::ReportWriter;
use loanport::interfaces::jsonl::command_reader::{Command, CommandReader};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input lifecycle commands, one JSON object per line
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let stores = build_stores(cli.db_path)?;
    let engine = LendingEngine::new(
        stores,
        sandbox_gateways(),
        sandbox_webhook_keys(),
        Arc::new(SystemClock),
    );

    // Apply commands one by one; a bad line never aborts the run.
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = apply_command(&engine, command).await {
                    eprintln!("Error applying command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    // Collect final state from engine
    let mut rows = Vec::new();
    for application in engine.applications().await.into_diagnostic()? {
        let disbursement = engine
            .disbursement_for(application.id)
            .await
            .into_diagnostic()?;
        rows.push((application, disbursement));
    }

    // Output final state
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_report(rows).into_diagnostic()?;

    Ok(())
}

/// Logs go to stderr so stdout stays clean for the CSV report.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

fn build_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    match db_path {
        Some(path) => persistent_stores(path),
        None => Ok(in_memory_stores()),
    }
}

fn in_memory_stores() -> Stores {
    let store = Arc::new(InMemoryStore::new());
    Stores {
        applications: store.clone(),
        payments: store.clone(),
        disbursements: store.clone(),
        fee_configs: store.clone(),
        fraud_logs: store,
    }
}

#[cfg(feature = "storage-rocksdb")]
fn persistent_stores(path: PathBuf) -> Result<Stores> {
    let store = Arc::new(
        loanport::infrastructure::rocksdb::RocksDBStore::open(path).into_diagnostic()?,
    );
    Ok(Stores {
        applications: store.clone(),
        payments: store.clone(),
        disbursements: store.clone(),
        fee_configs: store.clone(),
        fraud_logs: store,
    })
}

#[cfg(not(feature = "storage-rocksdb"))]
fn persistent_stores(_path: PathBuf) -> Result<Stores> {
    eprintln!(
        "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
    );
    Ok(in_memory_stores())
}

async fn apply_command(engine: &LendingEngine, command: Command) -> LendingResult<()> {
    match command {
        Command::Submit { submission } => {
            engine.submit(submission).await?;
        }
        Command::StartReview {
            application,
            reviewer,
        } => {
            engine.start_review(application, &reviewer).await?;
        }
        Command::Approve {
            application,
            amount,
            notes,
        } => {
            engine.approve(application, amount, notes.as_deref()).await?;
        }
        Command::Reject {
            application,
            reason,
        } => {
            engine.reject(application, &reason).await?;
        }
        Command::Cancel { application } => {
            engine.cancel(application).await?;
        }
        Command::SetFeeSchedule { schedule } => {
            engine.set_fee_schedule(schedule).await?;
        }
        Command::BeginPayment {
            application,
            method,
            provider,
            card_token,
            crypto_currency,
        } => {
            engine
                .begin_payment(application, method, provider, card_token, crypto_currency)
                .await?;
        }
        Command::ConfirmPayment { payment } => {
            engine.confirm_payment(payment).await?;
        }
        Command::Webhook {
            provider,
            body,
            signature,
        } => {
            engine.handle_webhook(provider, &body, &signature).await?;
        }
        Command::Disburse {
            application,
            method,
            destination,
            notes,
        } => {
            engine
                .disburse(application, method, &destination, notes)
                .await?;
        }
        Command::AnnotateFraudLog {
            log,
            reviewer,
            note,
        } => {
            engine.annotate_fraud_log(log, &reviewer, &note).await?;
        }
    }
    Ok(())
}
