use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use nook_types::api::{Claims, ReactionRequest, ToggleReactionResponse};

use crate::error::reject;
use crate::state::AppState;

pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReactionRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let (added, _) = state
        .relay
        .toggle_reaction(claims.sub, message_id, req.emoji)
        .await
        .map_err(reject)?;
    Ok(Json(ToggleReactionResponse { added }))
}

/// Idempotent add. Responds with the message's reaction set.
pub async fn add_reaction(
    State(state): State<AppState>,
    Path((message_id, emoji)): Path<(Uuid, String)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let reactions = state
        .relay
        .add_reaction(claims.sub, message_id, emoji)
        .await
        .map_err(reject)?;
    Ok(Json(reactions))
}

pub async fn remove_reaction(
    State(state): State<AppState>,
    Path((message_id, emoji)): Path<(Uuid, String)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let reactions = state
        .relay
        .remove_reaction(claims.sub, message_id, emoji)
        .await
        .map_err(reject)?;
    Ok(Json(reactions))
}
