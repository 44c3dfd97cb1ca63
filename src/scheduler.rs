//! Daily trigger: sleeps until the next cron fire time and runs a cycle.
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use std::str::FromStr;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::reconcile;
use crate::state::AppContext;

pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    Schedule::from_str(expression)
        .with_context(|| format!("invalid cron expression {expression:?}"))
}

/// First fire time strictly after `now`.
pub fn next_fire<Tz: TimeZone>(schedule: &Schedule, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    schedule.after(now).next()
}

/// Spawn the scheduler loop on the current runtime. The task runs until the
/// schedule has no further fire times.
pub fn spawn(ctx: AppContext, schedule: Schedule) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = run_forever(ctx, schedule).await {
            error!(?err, "scheduler stopped");
        }
    })
}

async fn run_forever(ctx: AppContext, schedule: Schedule) -> Result<()> {
    loop {
        let now = Local::now();
        let next = next_fire(&schedule, &now).ok_or_else(|| anyhow!("schedule has no upcoming runs"))?;
        let wait = (next.clone() - now).to_std().unwrap_or_default();
        info!(next = %next, "next scheduled optimization");
        tokio::time::sleep(wait).await;

        match reconcile::trigger(&ctx).await {
            Ok(report) => info!(summary = %report.summary(), "scheduled optimization done"),
            Err(err) => warn!(%err, "scheduled optimization failed"),
        }
    }
}
