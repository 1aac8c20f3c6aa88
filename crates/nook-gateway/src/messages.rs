//! Chat and direct-message relay: persist first, then fan out.

use tracing::{debug, trace};
use uuid::Uuid;

use nook_types::events::GatewayEvent;
use nook_types::models::DirectMessage;

use crate::error::RelayError;
use crate::presence;
use crate::relay::{Relay, run_blocking, run_detached};
use crate::session::{Connection, RoomSession};
use crate::store::NewChatMessage;

fn is_blank(content: Option<&str>) -> bool {
    content.is_none_or(|c| c.trim().is_empty())
}

impl Relay {
    /// Post to the sender's current room. Every client in that room receives
    /// the persisted message, the sender included. Nothing is broadcast if
    /// persistence fails, and nothing is stored without something to show:
    /// content or at least one attachment that could be linked.
    pub async fn send_chat_message(
        &self,
        conn: &mut Connection,
        content: Option<String>,
        attachment_ids: Vec<Uuid>,
        reply_to_id: Option<Uuid>,
    ) -> Result<(), RelayError> {
        let session = conn.room_session()?.clone();

        if is_blank(content.as_deref()) && attachment_ids.is_empty() {
            trace!("Ignoring empty chat message from {}", session.user_id);
            return Ok(());
        }

        let relay = self.clone();
        let conn_id = conn.conn_id();
        let content = content.filter(|c| !c.trim().is_empty());
        run_detached(async move {
            relay
                .publish_chat_message(session, conn_id, content, attachment_ids, reply_to_id)
                .await
        })
        .await
    }

    async fn publish_chat_message(
        &self,
        session: RoomSession,
        conn_id: Uuid,
        content: Option<String>,
        attachment_ids: Vec<Uuid>,
        reply_to_id: Option<Uuid>,
    ) -> Result<(), RelayError> {
        let _publish = self.publish_lock().await;

        // Read the room under the publish lock so a concurrent room deletion
        // cannot leave us posting into a room we were just moved out of.
        let room_id = self
            .registry()
            .room_client(session.club_id, conn_id)
            .map(|c| c.room_id)
            .ok_or(RelayError::NotJoined)?;

        let store = self.store();
        let draft = NewChatMessage {
            room_id,
            sender_id: session.user_id,
            sender_name: session.username,
            content,
            attachment_ids,
            reply_to_id,
        };
        let stored = run_blocking(move || {
            if let Some(parent_id) = draft.reply_to_id {
                let parent = store
                    .find_message(parent_id)?
                    .ok_or(RelayError::NotFound("replied-to message"))?;
                if parent.room_id != draft.room_id {
                    return Err(RelayError::invalid("cannot reply to a message from another room"));
                }
            }
            Ok(store.create_message(draft)?)
        })
        .await?;

        let Some(message) = stored else {
            trace!("Ignoring chat message from {} with no usable attachments", session.user_id);
            return Ok(());
        };

        let recipients = self.registry().room_clients(session.club_id, room_id);
        let delivered = presence::fan_out(
            &recipients,
            &GatewayEvent::ChatMessage { message },
            None,
        );
        debug!("Chat message in room {} delivered to {} clients", room_id, delivered);
        Ok(())
    }

    /// Let the rest of the room know this user is typing.
    pub fn typing(&self, conn: &Connection) -> Result<(), RelayError> {
        let session = conn.room_session()?;
        let Some(me) = self.registry().room_client(session.club_id, conn.conn_id()) else {
            return Err(RelayError::NotJoined);
        };
        let recipients = self.registry().room_clients(session.club_id, me.room_id);
        presence::fan_out(
            &recipients,
            &GatewayEvent::UserTyping {
                user_id: session.user_id,
                username: session.username.clone(),
            },
            Some(conn.conn_id()),
        );
        Ok(())
    }

    /// Persist a direct message through the user-domain store, confirm it to
    /// the sender and push it to the receiver if their DM channel is open.
    /// Offline receivers fetch it later over REST. Like room messages, the
    /// store and notify step runs to completion once started.
    pub async fn send_direct_message(
        &self,
        conn: &mut Connection,
        receiver_id: Uuid,
        content: String,
        attachment_ids: Vec<Uuid>,
    ) -> Result<(), RelayError> {
        let sender_id = conn.dm_session()?.user_id;

        let blank = content.trim().is_empty();
        if blank && attachment_ids.is_empty() {
            trace!("Ignoring empty direct message from {}", sender_id);
            return Ok(());
        }

        let direct = self.direct();
        let sender = conn.handle().clone();
        let relay = self.clone();
        let content = (!blank).then_some(content);
        run_detached(async move {
            let stored = run_blocking(move || {
                Ok(direct.create_direct_message(sender_id, receiver_id, content, attachment_ids)?)
            })
            .await?;
            let Some(message) = stored else {
                trace!("Ignoring direct message from {} with no usable attachments", sender_id);
                return Ok(());
            };

            if !sender.send(GatewayEvent::DmSent {
                message: message.clone(),
            }) {
                trace!("DM confirmation dropped for closed connection {}", sender.conn_id());
            }

            match relay.registry().get_dm_client(receiver_id) {
                Some(receiver) => {
                    receiver.handle.send(GatewayEvent::DmReceived { message });
                }
                None => debug!("DM receiver {} offline, left for later retrieval", receiver_id),
            }
            Ok(())
        })
        .await
    }

    /// Conversation between two users, oldest first.
    pub async fn direct_history(
        &self,
        user_id: Uuid,
        other_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<DirectMessage>, RelayError> {
        let direct = self.direct();
        let limit = limit.unwrap_or(self.config().history_limit);
        run_blocking(move || Ok(direct.list_direct_messages(user_id, other_id, limit)?)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_content_is_blank() {
        assert!(is_blank(None));
        assert!(is_blank(Some("  \n\t")));
        assert!(!is_blank(Some(" hi ")));
    }
}
