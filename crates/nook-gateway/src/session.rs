use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

use nook_types::events::GatewayEvent;

use crate::error::RelayError;
use crate::registry::{ClientHandle, Outbound};

/// A connection registered in a club. The current room lives in the
/// registry, which is the only place room switches are applied.
#[derive(Debug, Clone)]
pub struct RoomSession {
    pub club_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
}

/// A connection registered as a user's direct-message channel.
#[derive(Debug, Clone)]
pub struct DmSession {
    pub user_id: Uuid,
    pub username: String,
}

/// Per-connection protocol state.
#[derive(Debug, Clone, Default)]
pub enum Session {
    #[default]
    Unjoined,
    Room(RoomSession),
    Dm(DmSession),
    Closed,
}

/// One client connection as seen by the relay: its outbound handle, the
/// user admitted at the upgrade, and where it is in the protocol.
///
/// Owned by the connection's reader, so commands from one connection are
/// handled strictly in arrival order.
#[derive(Debug)]
pub struct Connection {
    handle: ClientHandle,
    admitted_user: Uuid,
    session: Session,
}

impl Connection {
    pub fn new(admitted_user: Uuid) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Self {
            handle: ClientHandle::new(tx),
            admitted_user,
            session: Session::Unjoined,
        };
        (conn, rx)
    }

    pub fn conn_id(&self) -> Uuid {
        self.handle.conn_id()
    }

    pub fn handle(&self) -> &ClientHandle {
        &self.handle
    }

    pub fn admitted_user(&self) -> Uuid {
        self.admitted_user
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    pub(crate) fn take_session(&mut self) -> Session {
        std::mem::replace(&mut self.session, Session::Closed)
    }

    pub(crate) fn reply(&self, event: GatewayEvent) {
        if !self.handle.send(event) {
            trace!("Reply dropped for closed connection {}", self.conn_id());
        }
    }

    pub(crate) fn room_session(&self) -> Result<&RoomSession, RelayError> {
        match &self.session {
            Session::Room(s) => Ok(s),
            _ => Err(RelayError::NotJoined),
        }
    }

    pub(crate) fn dm_session(&self) -> Result<&DmSession, RelayError> {
        match &self.session {
            Session::Dm(s) => Ok(s),
            _ => Err(RelayError::NotJoined),
        }
    }

    /// Join commands may only name the user admitted at the upgrade.
    pub(crate) fn check_admitted(&self, user_id: Uuid) -> Result<(), RelayError> {
        if user_id == self.admitted_user {
            Ok(())
        } else {
            Err(RelayError::Forbidden("cannot join as another user"))
        }
    }

    pub(crate) fn ensure_unjoined(&self) -> Result<(), RelayError> {
        match self.session {
            Session::Unjoined => Ok(()),
            Session::Closed => Err(RelayError::invalid("connection is closed")),
            _ => Err(RelayError::invalid("connection already joined")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_after_receiver_dropped_is_a_no_op() {
        let user = Uuid::new_v4();
        let (conn, rx) = Connection::new(user);
        drop(rx);

        assert!(!conn.handle().is_open());
        conn.reply(GatewayEvent::DmJoined { user_id: user });
        assert!(matches!(conn.session(), Session::Unjoined));
    }
}
