use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::Mutex;
use tracing::{error, warn};
use uuid::Uuid;

use nook_db::Database;
use nook_types::events::{GatewayCommand, GatewayEvent};
use nook_types::models::Message;

use crate::error::RelayError;
use crate::registry::Registry;
use crate::session::{Connection, Session};
use crate::store::{DirectMessageStore, MembershipOracle, SessionStore};

/// Messages returned in `init` and `room-switched` unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// How many recent messages a join or room switch replays.
    pub history_limit: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// The room and presence relay. Cheap to clone; all clones share one
/// registry.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    registry: Registry,
    store: Arc<dyn SessionStore>,
    members: Arc<dyn MembershipOracle>,
    direct: Arc<dyn DirectMessageStore>,
    config: RelayConfig,

    /// Held from persistence through fan-out of a chat message, and from the
    /// history read through registration of a join or room switch. Live
    /// delivery order therefore matches storage order, and a joining client
    /// sees each message exactly once: in its history or as a broadcast.
    publish: Mutex<()>,
}

impl Relay {
    pub fn new(
        store: Arc<dyn SessionStore>,
        members: Arc<dyn MembershipOracle>,
        direct: Arc<dyn DirectMessageStore>,
        config: RelayConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                registry: Registry::new(),
                store,
                members,
                direct,
                config,
                publish: Mutex::new(()),
            }),
        }
    }

    /// All three collaborators backed by one SQLite database.
    pub fn with_database(db: Arc<Database>, config: RelayConfig) -> Self {
        Self::new(db.clone(), db.clone(), db, config)
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    pub(crate) fn store(&self) -> Arc<dyn SessionStore> {
        self.inner.store.clone()
    }

    pub(crate) fn members(&self) -> Arc<dyn MembershipOracle> {
        self.inner.members.clone()
    }

    pub(crate) fn direct(&self) -> Arc<dyn DirectMessageStore> {
        self.inner.direct.clone()
    }

    pub(crate) async fn publish_lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.inner.publish.lock().await
    }

    /// Recent history of a room, oldest first.
    pub(crate) async fn history(&self, room_id: Uuid) -> Result<Vec<Message>, RelayError> {
        let store = self.store();
        let limit = self.inner.config.history_limit;
        run_blocking(move || Ok(store.list_recent_messages(room_id, limit)?)).await
    }

    /// Whether a room still exists and belongs to the club. Checked under the
    /// publish lock before registering a client in it, since a room deletion
    /// commits before it takes that lock to relocate clients.
    pub(crate) async fn room_in_club(&self, club_id: Uuid, room_id: Uuid) -> Result<bool, RelayError> {
        let store = self.store();
        let room = run_blocking(move || Ok(store.find_room(room_id)?)).await?;
        Ok(room.is_some_and(|r| r.club_id == club_id))
    }

    /// Handle one command from a connection. This is the error boundary:
    /// failures become an `error` reply to this connection only, and never
    /// reach other clients.
    pub async fn handle(&self, conn: &mut Connection, cmd: GatewayCommand) {
        let kind = cmd.kind();
        if let Err(err) = self.dispatch(conn, cmd).await {
            match &err {
                RelayError::Upstream(e) => {
                    error!("{} from {} failed: {:#}", kind, conn.admitted_user(), e)
                }
                other => warn!("{} from {} rejected: {}", kind, conn.admitted_user(), other),
            }

            conn.reply(GatewayEvent::Error {
                message: err.client_message(),
            });

            if err.closes_connection() {
                conn.set_session(Session::Closed);
                conn.handle().close();
            }
        }
    }

    async fn dispatch(&self, conn: &mut Connection, cmd: GatewayCommand) -> Result<(), RelayError> {
        match cmd {
            GatewayCommand::Join {
                club_id,
                user_id,
                display_name,
                room_id,
            } => self.join(conn, club_id, user_id, display_name, room_id).await,

            GatewayCommand::SwitchRoom { room_id } => self.switch_room(conn, room_id).await,

            GatewayCommand::JoinDm {
                user_id,
                display_name,
            } => self.join_dm(conn, user_id, display_name),

            GatewayCommand::ChatMessage {
                message,
                attachments,
                reply_to_id,
            } => {
                self.send_chat_message(conn, message, attachments, reply_to_id)
                    .await
            }

            GatewayCommand::Typing => self.typing(conn),

            GatewayCommand::DmMessage {
                receiver_id,
                content,
                attachments,
            } => {
                self.send_direct_message(conn, receiver_id, content, attachments)
                    .await
            }

            GatewayCommand::DeleteMessage { message_id } => {
                let actor = conn.room_session()?.user_id;
                self.delete_message(actor, message_id).await.map(drop)
            }

            GatewayCommand::EditMessage {
                message_id,
                content,
            } => {
                let actor = conn.room_session()?.user_id;
                self.edit_message(actor, message_id, content).await.map(drop)
            }

            GatewayCommand::PinMessage { message_id } => {
                let actor = conn.room_session()?.user_id;
                self.set_pinned(actor, message_id, true).await.map(drop)
            }

            GatewayCommand::UnpinMessage { message_id } => {
                let actor = conn.room_session()?.user_id;
                self.set_pinned(actor, message_id, false).await.map(drop)
            }

            GatewayCommand::AddReaction { message_id, emoji } => {
                let actor = conn.room_session()?.user_id;
                self.add_reaction(actor, message_id, emoji).await.map(drop)
            }

            GatewayCommand::RemoveReaction { message_id, emoji } => {
                let actor = conn.room_session()?.user_id;
                self.remove_reaction(actor, message_id, emoji).await.map(drop)
            }
        }
    }
}

/// Run a store call on the blocking pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, RelayError>
where
    F: FnOnce() -> Result<T, RelayError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        RelayError::Upstream(anyhow!("blocking task failed: {}", e))
    })?
}

/// Run a relay step on its own task. It finishes even if the connection
/// that started it is dropped halfway.
pub(crate) async fn run_detached<T, F>(fut: F) -> Result<T, RelayError>
where
    F: Future<Output = Result<T, RelayError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(fut).await.map_err(|e| {
        error!("relay task join error: {}", e);
        RelayError::Upstream(anyhow!("relay task failed: {}", e))
    })?
}
