use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use chirp_digest::config;
use chirp_digest::db;
use chirp_digest::dispatch::BatchDispatcher;
use chirp_digest::jobs;
use chirp_digest::notify::ResendClient;

#[derive(Debug, Parser)]
#[command(author, version, about = "Alert every active subscriber about a special sighting")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[arg(long)]
    species: String,

    #[arg(long)]
    image_url: String,

    /// Detection confidence in [0, 1]
    #[arg(long)]
    confidence: f64,
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
    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let sink = Arc::new(ResendClient::from_config(&cfg)?);
    let dispatcher = BatchDispatcher::new(sink, cfg.dispatch.max_in_flight);

    let report = jobs::run_special_sighting(
        &pool,
        &dispatcher,
        &args.species,
        &args.image_url,
        args.confidence,
    )
    .await?;
    info!(
        total = report.total_recipients,
        succeeded = report.succeeded,
        failed = report.failed,
        "special sighting sent"
    );
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}
