use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use nudge_core::config::NudgeConfig;
use nudge_core::ReminderSnapshot;
use nudge_manager::{ReminderService, ServiceSettings};
use nudge_protocol::{encode, Outbound};
use nudge_scheduler::SystemClock;
use nudge_store::SqliteStore;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

mod dispatch;
mod notifier;

use crate::dispatch::Dispatcher;
use crate::notifier::StdioNotifier;

/// Periodic reminder daemon speaking newline-delimited JSON on stdin/stdout.
#[derive(Parser, Debug)]
#[command(name = "nudge-daemon", version)]
struct Args {
    /// Config file. Defaults to $NUDGE_CONFIG, then ~/.nudge/nudge.toml.
    #[arg(long)]
    config: Option<String>,

    /// SQLite database file, overriding `storage.path`.
    #[arg(long)]
    db: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "nudge_daemon=info,nudge_manager=info,nudge_scheduler=info,nudge_store=info".into()
            }),
        )
        .init();

    let config = NudgeConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        NudgeConfig::default()
    });

    let db_path = args.db.unwrap_or_else(|| config.storage.path.clone());
    ensure_parent_dir(&db_path);
    info!(path = %db_path, slot = %config.storage.slot, "opening SQLite database");

    let conn = rusqlite::Connection::open(&db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    let store = SqliteStore::new(conn, config.storage.slot.clone())?;

    // Outbound channel: service listeners, notifier and dispatcher → stdout writer
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Outbound>();
    let writer = tokio::spawn(write_stdout(out_rx));

    let notifier = Arc::new(StdioNotifier::new(out_tx.clone()));
    let (service, handle) = ReminderService::new(
        Box::new(store),
        Arc::new(SystemClock),
        notifier.clone(),
        ServiceSettings::from(&config.notifications),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let service_task = tokio::spawn(service.run(shutdown_rx));

    let updates = out_tx.clone();
    let subscription = handle
        .subscribe(Arc::new(move |snapshot: &ReminderSnapshot| {
            let _ = updates.send(Outbound::from(snapshot.clone()));
        }))
        .await?;

    // initial state for the freshly attached client
    let _ = out_tx.send(handle.snapshot().await?.into());

    let dispatcher = Dispatcher::new(handle, notifier, out_tx);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupt received, shutting down");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => dispatcher.dispatch_line(&line).await,
                Ok(None) => {
                    info!("input closed, shutting down");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "failed to read input");
                    break;
                }
            },
        }
    }

    subscription.unsubscribe();
    let _ = shutdown_tx.send(true);
    service_task.await?;

    // Pending notification tasks may still hold a sender; don't wait on them.
    drop(dispatcher);
    let _ = tokio::time::timeout(Duration::from_secs(1), writer).await;
    info!("nudge daemon stopped");
    Ok(())
}

async fn write_stdout(mut rx: mpsc::UnboundedReceiver<Outbound>) {
    let mut stdout = tokio::io::stdout();
    while let Some(message) = rx.recv().await {
        let mut line = match encode(&message) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "failed to encode outbound message");
                continue;
            }
        };
        line.push('\n');
        if let Err(e) = stdout.write_all(line.as_bytes()).await {
            error!(error = %e, "stdout closed, dropping outbound messages");
            break;
        }
        let _ = stdout.flush().await;
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
