use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chirp_digest::config;
use chirp_digest::db;
use chirp_digest::notify::ResendClient;
use chirp_digest::subscriptions;

#[derive(Parser, Debug)]
#[command(about = "Manage email subscriptions")]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe an address and send the welcome email
    Add {
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Deactivate an address
    Remove { email: String },
    /// Turn the daily summary on or off for an address
    Daily {
        email: String,
        #[arg(long, action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// List every subscription
    List,
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

    match args.command {
        Command::Add { email, name } => {
            let sink = ResendClient::from_config(&cfg)?;
            let id = subscriptions::subscribe(&pool, &sink, &email, name.as_deref()).await?;
            println!("Subscribed {email} (id {id})");
        }
        Command::Remove { email } => match subscriptions::unsubscribe(&pool, &email).await? {
            Some(sub) => println!("Unsubscribed {}", sub.email),
            None => println!("Email not found in subscriptions: {email}"),
        },
        Command::Daily { email, enabled } => {
            if db::set_daily_summary_enabled(&pool, &email, enabled).await? {
                println!("Daily summary for {email}: {}", if enabled { "on" } else { "off" });
            } else {
                println!("Email not found in subscriptions: {email}");
            }
        }
        Command::List => {
            for sub in db::list_subscriptions(&pool).await? {
                println!(
                    "{:>4}  {:<32} {:<20} active={} daily={} since {}",
                    sub.id,
                    sub.email,
                    sub.name.as_deref().unwrap_or("-"),
                    sub.is_active,
                    sub.daily_summary_enabled,
                    sub.created_at.format("%Y-%m-%d"),
                );
            }
        }
    }
    Ok(())
}
