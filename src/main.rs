use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use chirp_digest::config::{self, Config};
use chirp_digest::db;
use chirp_digest::dispatch::BatchDispatcher;
use chirp_digest::jobs;
use chirp_digest::notify::ResendClient;
use chirp_digest::schedule;

#[derive(Debug, Parser)]
#[command(author, version, about = "Send the daily bird digest to subscribers every morning")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Send yesterday's digest immediately and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let sink = Arc::new(ResendClient::from_config(&cfg)?);
    let dispatcher = BatchDispatcher::new(sink, cfg.dispatch.max_in_flight);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    if args.once {
        run_daily(&cfg, &pool, &dispatcher, shutdown_rx).await;
        return Ok(());
    }

    let send_at = cfg.send_at()?;
    while !*shutdown_rx.borrow() {
        let now = Local::now();
        let next = schedule::next_run_after(&now, send_at);
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next_run = %next, "waiting for next daily summary");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown(shutdown_rx.clone()) => break,
        }

        run_daily(&cfg, &pool, &dispatcher, shutdown_rx.clone()).await;
    }

    info!("shutting down");
    Ok(())
}

/// Resolves once Ctrl-C has been received.
async fn shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn run_daily(
    cfg: &Config,
    pool: &db::Pool,
    dispatcher: &BatchDispatcher,
    shutdown_rx: watch::Receiver<bool>,
) {
    let formatter = cfg.timeline_formatter();
    let cancel = shutdown(shutdown_rx);
    let outcome = jobs::run_daily_summary_until(
        pool,
        pool,
        dispatcher,
        &Local::now(),
        formatter.as_ref(),
        cancel,
    )
    .await;
    match outcome {
        Ok(report) => info!(
            total = report.total_recipients,
            succeeded = report.succeeded,
            failed = report.failed,
            "daily summary sent"
        ),
        Err(err) => error!(%err, "daily summary failed"),
    }
}
