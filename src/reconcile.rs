//! One optimization cycle: resolve candidates, submit the ones the server is
//! not already optimizing, and record each submission in the ledger.
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::db;
use crate::model::{Credentials, OptimizationStatus};
use crate::resolver;
use crate::secrets::{self, SecretsError};
use crate::state::AppContext;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("failed to connect to media server: {0:#}")]
    Authentication(anyhow::Error),
    #[error("failed to list optimized items: {0:#}")]
    Remote(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    Secrets(#[from] SecretsError),
    #[error(transparent)]
    Cycle(#[from] CycleError),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Submit,
    Ledger,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub key: String,
    pub stage: FailureStage,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub candidates: usize,
    pub skipped: usize,
    pub queued: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

impl CycleReport {
    pub fn summary(&self) -> String {
        format!(
            "queued {} of {} on-deck items ({} already optimized, {} failed)",
            self.queued.len(),
            self.candidates,
            self.skipped,
            self.failures.len()
        )
    }
}

/// Read credentials fresh from the secrets file and run one cycle.
pub async fn trigger(ctx: &AppContext) -> Result<CycleReport, TriggerError> {
    let credentials = secrets::load(&ctx.secrets_path).await?;
    Ok(run(ctx, &credentials).await?)
}

#[instrument(skip_all, fields(user = %credentials.username))]
pub async fn run(ctx: &AppContext, credentials: &Credentials) -> Result<CycleReport, CycleError> {
    let directory = ctx
        .connector
        .connect(credentials)
        .await
        .map_err(CycleError::Authentication)?;

    let candidates = resolver::resolve(directory.as_ref()).await;
    let already = directory
        .optimized_keys()
        .await
        .map_err(CycleError::Remote)?;

    let mut report = CycleReport {
        candidates: candidates.len(),
        ..Default::default()
    };

    for item in candidates.iter() {
        if already.contains(&item.key) {
            report.skipped += 1;
            continue;
        }

        if let Err(err) = directory.optimize(item, ctx.target_tag_id).await {
            warn!(key = %item.key, ?err, "optimize submission failed");
            report.failures.push(ItemFailure {
                key: item.key.clone(),
                stage: FailureStage::Submit,
                error: format!("{err:#}"),
            });
            continue;
        }

        match db::upsert_optimization(&ctx.pool, &item.key, OptimizationStatus::Pending).await {
            Ok(()) => report.queued.push(item.key.clone()),
            Err(err) => {
                error!(key = %item.key, ?err, "optimize submitted but ledger write failed");
                report.failures.push(ItemFailure {
                    key: item.key.clone(),
                    stage: FailureStage::Ledger,
                    error: format!("{err:#}"),
                });
            }
        }
    }

    info!(
        candidates = report.candidates,
        skipped = report.skipped,
        queued = report.queued.len(),
        failed = report.failures.len(),
        "optimization cycle finished"
    );
    Ok(report)
}
