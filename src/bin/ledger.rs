use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ondeck_optimizer::config;
use ondeck_optimizer::db;

#[derive(Debug, Parser)]
#[command(author, version, about = "Inspect and administer the optimization ledger")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the ledger table
    Migrate,
    /// Insert a placeholder row
    Seed,
    /// Show the record for one item key
    Get { key: String },
    /// List every record
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
        Command::Migrate => println!("ledger ready"),
        Command::Seed => {
            db::seed_optimizations(&pool).await?;
            println!("seeded {}", db::SEED_KEY);
        }
        Command::Get { key } => match db::get_optimization(&pool, &key).await? {
            Some(rec) => println!("{}\t{}\t{}", rec.key, rec.status, rec.updated_at.to_rfc3339()),
            None => println!("no record for {key}"),
        },
        Command::List => {
            for rec in db::list_optimizations(&pool).await? {
                println!("{}\t{}\t{}", rec.key, rec.status, rec.updated_at.to_rfc3339());
            }
        }
    }
    Ok(())
}
