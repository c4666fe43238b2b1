use axum::{extract::State, routing::post, Json, Router};
use potluck_core::Command;
use potluck_order::CommandReply;
use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub reply: CommandReply,
    /// Ready-to-post chat text
    pub text: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/commands", post(handle_command))
}

/// POST /v1/commands
async fn handle_command(
    State(state): State<AppState>,
    Json(command): Json<Command>,
) -> Result<Json<CommandResponse>, AppError> {
    info!(participant = ?command.participant(), "Handling command");

    let reply = state.desk.handle(command).await.map_err(AppError::from_resolution)?;
    let text = reply.text();
    Ok(Json(CommandResponse { reply, text }))
}
