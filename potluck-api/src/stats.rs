use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use potluck_core::Command;
use potluck_order::{CommandReply, StatsSummary};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub restaurant: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/stats/global", get(global_stats))
        .route("/v1/stats/participants/{participant}", get(participant_stats))
}

async fn summary(state: &AppState, command: Command) -> Result<StatsSummary, AppError> {
    match state.desk.handle(command).await.map_err(AppError::from_resolution)? {
        CommandReply::Stats(summary) => Ok(summary),
        other => Err(AppError::InternalServerError(format!("unexpected reply {:?}", other))),
    }
}

/// GET /v1/stats/global
async fn global_stats(State(state): State<AppState>) -> Result<Json<StatsSummary>, AppError> {
    Ok(Json(summary(&state, Command::GlobalStats).await?))
}

/// GET /v1/stats/participants/{participant}?restaurant=
async fn participant_stats(
    State(state): State<AppState>,
    Path(participant): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsSummary>, AppError> {
    let command = Command::Stats {
        participant,
        restaurant: query.restaurant,
    };
    Ok(Json(summary(&state, command).await?))
}
