use axum::http::StatusCode;
use tracing::{error, warn};

use nook_gateway::RelayError;

/// Map a relay failure onto the REST surface.
pub fn status_for(err: &RelayError) -> StatusCode {
    match err {
        RelayError::ClubNotFound | RelayError::NotFound(_) => StatusCode::NOT_FOUND,
        RelayError::Forbidden(_) => StatusCode::FORBIDDEN,
        RelayError::InvalidState(_) | RelayError::NoRoomsAvailable => StatusCode::CONFLICT,
        RelayError::NotJoined => StatusCode::BAD_REQUEST,
        RelayError::Upstream(_) => StatusCode::BAD_GATEWAY,
    }
}

/// `map_err` adapter for handlers: logs, then converts.
pub fn reject(err: RelayError) -> StatusCode {
    match &err {
        RelayError::Upstream(e) => error!("Request failed upstream: {:#}", e),
        other => warn!("Request rejected ({}): {}", other.error_code(), other),
    }
    status_for(&err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(status_for(&RelayError::NotFound("message")), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&RelayError::Forbidden("nope")), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&RelayError::invalid("last room")), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&RelayError::Upstream(anyhow::anyhow!("db locked"))),
            StatusCode::BAD_GATEWAY
        );
    }
}
