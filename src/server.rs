use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::reconcile::{self, TriggerError};
use crate::state::AppContext;

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/optimize/ondeck", get(optimize_on_deck))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn hello() -> Json<Value> {
    Json(json!({ "hello": "world" }))
}

async fn optimize_on_deck(State(ctx): State<AppContext>) -> (StatusCode, Json<Value>) {
    match reconcile::trigger(&ctx).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "success": report.summary(),
                "candidates": report.candidates,
                "skipped": report.skipped,
                "queued": report.queued,
                "failures": report.failures,
            })),
        ),
        // Configuration problems are answered in-band; the cycle never started.
        Err(TriggerError::Secrets(err)) => {
            warn!(%err, "secrets unavailable; cycle not started");
            (StatusCode::OK, Json(json!({ "error": err.to_string() })))
        }
        Err(TriggerError::Cycle(err)) => {
            error!(%err, "optimization cycle aborted");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": err.to_string() })),
            )
        }
    }
}
