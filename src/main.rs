use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use ondeck_optimizer::config;
use ondeck_optimizer::db;
use ondeck_optimizer::plex::PlexConnector;
use ondeck_optimizer::scheduler;
use ondeck_optimizer::server;
use ondeck_optimizer::state::AppContext;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
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
    let ctx = AppContext::from_config(&cfg, pool, connector);

    let schedule = scheduler::parse_schedule(&cfg.cron_expression())?;
    let timer = scheduler::spawn(ctx.clone(), schedule);

    let addr = cfg.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, hour = cfg.schedule.hour, "serving optimize trigger");

    axum::serve(listener, server::router(ctx))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    timer.abort();
    Ok(())
}
