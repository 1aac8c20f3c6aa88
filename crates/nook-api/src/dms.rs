use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use nook_types::api::Claims;

use crate::error::reject;
use crate::state::AppState;

const MAX_DM_PAGE: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct DmQuery {
    pub limit: Option<u32>,
}

/// Conversation between the caller and `user_id`, oldest first.
pub async fn get_direct_messages(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<DmQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let limit = query.limit.map(|l| l.min(MAX_DM_PAGE));
    let messages = state
        .relay
        .direct_history(claims.sub, user_id, limit)
        .await
        .map_err(reject)?;
    Ok(Json(messages))
}
