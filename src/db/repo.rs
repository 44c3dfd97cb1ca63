use crate::model::{OptimizationRecord, OptimizationStatus};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

pub type Pool = SqlitePool;

/// Key inserted by `seed_optimizations`, kept for parity with the admin tooling.
pub const SEED_KEY: &str = "testKey";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized)
        .await
        .with_context(|| format!("failed to open ledger database {normalized}"))?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, expand a leading `~/` and make sure the parent
/// directory exists. In-memory and non-sqlite URLs pass through unchanged.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }

    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path.is_empty() {
        return url.to_string();
    }

    let path = match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    match query {
        Some(q) => format!("sqlite://{path}?{q}"),
        None => format!("sqlite://{path}"),
    }
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Create the record for `key` or overwrite its status and timestamp in place.
/// A single statement, so concurrent writers to one key settle on the last one.
#[instrument(skip_all, fields(key = %key, status = %status))]
pub async fn upsert_optimization(pool: &Pool, key: &str, status: OptimizationStatus) -> Result<()> {
    sqlx::query(
        "INSERT INTO optimizations (key, status, updated_at) VALUES (?, ?, ?) \
         ON CONFLICT(key) DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(status.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn get_optimization(pool: &Pool, key: &str) -> Result<Option<OptimizationRecord>> {
    let row = sqlx::query("SELECT key, status, updated_at FROM optimizations WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    row.map(|r| map_record(&r)).transpose()
}

#[instrument(skip_all)]
pub async fn list_optimizations(pool: &Pool) -> Result<Vec<OptimizationRecord>> {
    let rows = sqlx::query("SELECT key, status, updated_at FROM optimizations ORDER BY key")
        .fetch_all(pool)
        .await?;
    rows.iter().map(map_record).collect()
}

pub async fn count_optimizations(pool: &Pool) -> Result<i64> {
    let cnt: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM optimizations")
        .fetch_one(pool)
        .await?;
    Ok(cnt)
}

/// Insert the placeholder row used to smoke-test a fresh database.
#[instrument(skip_all)]
pub async fn seed_optimizations(pool: &Pool) -> Result<()> {
    sqlx::query(
        "INSERT INTO optimizations (key, status, updated_at) VALUES (?, ?, ?) \
         ON CONFLICT(key) DO NOTHING",
    )
    .bind(SEED_KEY)
    .bind(OptimizationStatus::NotOptimized.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

fn map_record(row: &SqliteRow) -> Result<OptimizationRecord> {
    let key: String = row.get("key");
    let status: String = row.get("status");
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
    let status = OptimizationStatus::parse_status(&status)
        .ok_or_else(|| anyhow!("unknown optimization status {status:?} for {key}"))?;
    Ok(OptimizationRecord {
        key,
        status,
        updated_at,
    })
}
