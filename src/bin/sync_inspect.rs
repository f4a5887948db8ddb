//! Inspect the local mutation log.
//!
//! ```text
//! sync_inspect [--config <file>] [--retry-failed] [--drain]
//! ```
//!
//! Without flags the log and sync state are printed and nothing is sent.
//! `--retry-failed` requeues failed mutations, `--drain` runs one pass
//! against the configured server first.

use fieldsync::api_client::HttpRemoteApi;
use fieldsync::local_db::LocalDatabase;
use fieldsync::logging::init_tracing;
use fieldsync::offline::RetryPolicy;
use fieldsync::shared::{AppConfig, StoredMutation};
use fieldsync::sync::{DrainOutcome, NetworkMonitor, NetworkStatus, SyncManager};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    drain: bool,
    retry_failed: bool,
}

const USAGE: &str = "usage: sync_inspect [--config <file>] [--retry-failed] [--drain]";

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();
    let mut raw = std::env::args().skip(1);

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--drain" => args.drain = true,
            "--retry-failed" => args.retry_failed = true,
            "--config" => {
                let path = raw.next().ok_or("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            other => return Err(format!("unknown argument '{}'\n{}", other, USAGE)),
        }
    }
    Ok(args)
}

fn load_config(args: &Args) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut builder = AppConfig::builder();
    if let Some(path) = &args.config {
        let source = std::fs::read_to_string(path)?;
        builder = builder.toml_str(&source)?;
    }
    Ok(builder.with_env().build()?)
}

fn print_mutation(mutation: &StoredMutation) {
    println!(
        "{:>15}  {:<11}  {:<6}  {}/{}  retries={}{}",
        mutation.created_at,
        mutation.status.as_str(),
        mutation.kind.as_str(),
        mutation.entity,
        mutation.entity_id,
        mutation.retries,
        mutation
            .last_error
            .as_deref()
            .map(|e| format!("  last_error={:?}", e))
            .unwrap_or_default(),
    );
}

fn print_outcome(label: &str, outcome: &DrainOutcome) {
    match outcome {
        DrainOutcome::Skipped(reason) => println!("{}: skipped ({:?})", label, reason),
        DrainOutcome::Completed(report) => println!(
            "{}: delivered {}, failed {}{}",
            label,
            report.delivered,
            report.failed,
            report
                .halted
                .as_ref()
                .map(|h| format!(", halted: {:?}", h))
                .unwrap_or_default(),
        ),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };

    let config = load_config(&args)?;
    init_tracing(&config.log_level);

    let path = config.database_path();
    println!("Local store: {}", path.display());

    let db = Arc::new(LocalDatabase::open(&path).await?);
    let api = Arc::new(HttpRemoteApi::new(config.clone())?);
    // Offline unless asked to drain, so inspecting never sends anything
    let status = if args.drain {
        NetworkStatus::Online
    } else {
        NetworkStatus::Offline
    };
    let manager = SyncManager::new(
        Arc::clone(&db),
        api,
        Arc::new(NetworkMonitor::new(status)),
        RetryPolicy::mutation_delivery(&config),
    )
    .await?;

    if args.retry_failed {
        let requeued = manager.retry_all_failed().await?;
        println!("Requeued {} failed mutation(s)", requeued.count);
        if let Some(handle) = requeued.drain {
            print_outcome("Drain", &handle.await??);
        }
    }

    if args.drain {
        print_outcome("Drain", &manager.drain().await?);
    }

    let mut log = db.get_pending_mutations().await?;
    log.sort_by_key(|mutation| mutation.created_at);

    println!();
    if log.is_empty() {
        println!("Mutation log is empty");
    }
    for mutation in &log {
        print_mutation(mutation);
    }

    let state = manager.state().current();
    println!();
    println!("status:        {:?}", state.status);
    println!("pending:       {}", state.pending_count);
    println!("failed:        {}", state.failed_count);
    println!(
        "last sync:     {}",
        state
            .last_sync_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );
    if let Some(error) = state.error {
        println!("error:         {}", error);
    }

    db.close().await;
    Ok(())
}
