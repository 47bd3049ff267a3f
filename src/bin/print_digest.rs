use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, TimeZone};
use clap::Parser;
use std::path::PathBuf;

use chirp_digest::config;
use chirp_digest::db;
use chirp_digest::digest;

#[derive(Parser, Debug)]
#[command(about = "Compute a daily digest and print it as JSON")]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Day to summarize (YYYY-MM-DD, local time). Defaults to yesterday.
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    // The digest for day D is computed "as of" midnight starting D + 1.
    let now = match args.date {
        Some(day) => {
            let next = day.succ_opt().context("date out of range")?;
            Local
                .from_local_datetime(&next.and_time(chrono::NaiveTime::MIN))
                .earliest()
                .context("local midnight does not exist for that date")?
        }
        None => Local::now(),
    };

    let formatter = cfg.timeline_formatter();
    let summary = digest::compute_daily_digest(&pool, &now, formatter.as_ref()).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
