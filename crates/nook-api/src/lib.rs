//! REST surface: moderation, room management and DM history.

pub mod dms;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod reactions;
pub mod rooms;
pub mod state;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::middleware::require_auth;
use crate::state::AppState;

/// All REST routes, behind JWT authentication.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/messages/{message_id}",
            delete(messages::delete_message).patch(messages::edit_message),
        )
        .route(
            "/messages/{message_id}/pin",
            post(messages::pin_message).delete(messages::unpin_message),
        )
        .route("/messages/{message_id}/reactions", post(reactions::toggle_reaction))
        .route(
            "/messages/{message_id}/reactions/{emoji}",
            put(reactions::add_reaction).delete(reactions::remove_reaction),
        )
        .route("/clubs/{club_id}/rooms", post(rooms::create_room))
        .route("/clubs/{club_id}/rooms/{room_id}", delete(rooms::delete_room))
        .route("/dms/{user_id}", get(dms::get_direct_messages))
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}
