//! Moderation endpoints for room messages. Every successful write is
//! mirrored to the connections in the message's room by the relay.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use nook_types::api::{Claims, EditMessageRequest};

use crate::error::reject;
use crate::state::AppState;

pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let message = state
        .relay
        .delete_message(claims.sub, message_id)
        .await
        .map_err(reject)?;
    Ok(Json(message))
}

pub async fn edit_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<EditMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let message = state
        .relay
        .edit_message(claims.sub, message_id, req.content)
        .await
        .map_err(reject)?;
    Ok(Json(message))
}

pub async fn pin_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let message = state
        .relay
        .set_pinned(claims.sub, message_id, true)
        .await
        .map_err(reject)?;
    Ok(Json(message))
}

pub async fn unpin_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let message = state
        .relay
        .set_pinned(claims.sub, message_id, false)
        .await
        .map_err(reject)?;
    Ok(Json(message))
}
