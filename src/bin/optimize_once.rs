use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use ondeck_optimizer::config;
use ondeck_optimizer::db;
use ondeck_optimizer::plex::PlexConnector;
use ondeck_optimizer::reconcile;
use ondeck_optimizer::state::AppContext;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Run one on-deck optimization cycle and exit"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Read credentials from this file instead of `app.secrets_path`
    #[arg(long)]
    secrets: Option<PathBuf>,
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

    let connector = Arc::new(PlexConnector::from_config(&cfg)?);
    let mut ctx = AppContext::from_config(&cfg, pool, connector);
    if let Some(path) = args.secrets {
        ctx.secrets_path = path;
    }

    let report = reconcile::trigger(&ctx).await?;
    info!(summary = %report.summary(), "cycle complete");
    for failure in &report.failures {
        warn!(key = %failure.key, stage = ?failure.stage, error = %failure.error, "item not queued");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
