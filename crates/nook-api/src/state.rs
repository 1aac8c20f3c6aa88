use std::sync::Arc;

use nook_gateway::Relay;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub relay: Relay,
    pub jwt_secret: String,
}
