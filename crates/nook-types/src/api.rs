use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::RoomType;

// -- JWT Claims --

/// Claims carried by tokens from the identity service. Shared by the REST
/// middleware and the websocket upgrade so both admit callers the same way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Moderation --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionRequest {
    pub emoji: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleReactionResponse {
    pub added: bool,
}

// -- Rooms --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(default = "default_room_type")]
    pub room_type: RoomType,
}

fn default_room_type() -> RoomType {
    RoomType::Public
}
