use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use potluck_core::{ParticipantOrder, PendingOrderStore};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::{AppState, RunReport};

#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    pub dry_run: Option<bool>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/fulfillment/run", post(run_fulfillment))
        .route("/v1/fulfillment/last", get(last_run))
        .route("/v1/orders", get(list_pending))
}

/// POST /v1/fulfillment/run
/// Place today's orders now. Blocks until every restaurant has a result.
async fn run_fulfillment(
    State(state): State<AppState>,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunReport>, AppError> {
    let dry_run = req.dry_run.unwrap_or(state.settings.dry_run_default);
    let report = state.run_fulfillment(dry_run).await?;
    Ok(Json(report))
}

/// GET /v1/fulfillment/last
async fn last_run(State(state): State<AppState>) -> Result<Json<RunReport>, AppError> {
    state
        .last_run
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError("No fulfillment run yet".to_string()))
}

/// GET /v1/orders
async fn list_pending(State(state): State<AppState>) -> Result<Json<Vec<ParticipantOrder>>, AppError> {
    let orders = state
        .orders
        .list()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(orders))
}
