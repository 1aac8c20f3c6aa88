use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use nook_types::api::{Claims, CreateRoomRequest};

use crate::error::reject;
use crate::state::AppState;

pub async fn create_room(
    State(state): State<AppState>,
    Path(club_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let room = state
        .relay
        .create_room(claims.sub, club_id, req.name, req.room_type)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn delete_room(
    State(state): State<AppState>,
    Path((club_id, room_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    state
        .relay
        .delete_room(claims.sub, club_id, room_id)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}
