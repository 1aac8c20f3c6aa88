//! Error taxonomy for relay operations.
//!
//! Every error raised while handling a client command is caught at the
//! connection boundary and turned into an `error` reply for that connection
//! only. `ClubNotFound` and `NoRoomsAvailable` additionally close it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("club not found")]
    ClubNotFound,

    #[error("club has no rooms")]
    NoRoomsAvailable,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    InvalidState(String),

    #[error("join a club or a DM channel first")]
    NotJoined,

    #[error("upstream failure: {0:#}")]
    Upstream(#[from] anyhow::Error),
}

impl RelayError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidState(reason.into())
    }

    /// Static error code for logs and REST bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ClubNotFound => "club_not_found",
            Self::NoRoomsAvailable => "no_rooms_available",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidState(_) => "invalid_state",
            Self::NotJoined => "not_joined",
            Self::Upstream(_) => "upstream_failure",
        }
    }

    /// No useful session can exist without a club and a room.
    pub fn closes_connection(&self) -> bool {
        matches!(self, Self::ClubNotFound | Self::NoRoomsAvailable)
    }

    /// Text shown to the client. Upstream details stay in the server log.
    pub fn client_message(&self) -> String {
        match self {
            Self::Upstream(_) => "Something went wrong, please try again".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_join_failures_close_the_connection() {
        assert!(RelayError::ClubNotFound.closes_connection());
        assert!(RelayError::NoRoomsAvailable.closes_connection());
        assert!(!RelayError::NotFound("message").closes_connection());
        assert!(!RelayError::invalid("nope").closes_connection());
    }

    #[test]
    fn upstream_details_are_not_sent_to_clients() {
        let err = RelayError::from(anyhow::anyhow!("disk I/O error at /var/lib/nook.db"));
        assert_eq!(err.error_code(), "upstream_failure");
        assert!(!err.client_message().contains("nook.db"));
        assert!(err.to_string().contains("nook.db"));
    }
}
