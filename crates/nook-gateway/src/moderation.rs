//! Moderation actions and room management.
//!
//! Each action checks permissions, writes through the session store and then
//! mirrors the persisted result to the connections in the affected room.
//! Both the REST surface and the websocket control plane call these.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use nook_types::events::GatewayEvent;
use nook_types::models::{Message, ReactionGroup, Role, Room, RoomType};

use crate::error::RelayError;
use crate::presence;
use crate::relay::{Relay, run_blocking};
use crate::store::{MembershipOracle, MessagePatch, SessionStore};

/// Sent alongside an empty `room-switched` when the new room's history could
/// not be read.
pub const ROOM_HISTORY_UNAVAILABLE: &str = "Room history is unavailable, please try again";

/// Load a message and the club it belongs to.
fn load_message(store: &dyn SessionStore, message_id: Uuid) -> Result<(Message, Uuid), RelayError> {
    let message = store
        .find_message(message_id)?
        .ok_or(RelayError::NotFound("message"))?;
    let room = store
        .find_room(message.room_id)?
        .ok_or(RelayError::NotFound("room"))?;
    Ok((message, room.club_id))
}

fn require_moderator(
    members: &dyn MembershipOracle,
    club_id: Uuid,
    user_id: Uuid,
    action: &'static str,
) -> Result<(), RelayError> {
    match members.get_role(club_id, user_id)? {
        Some(role) if role.can_moderate() => Ok(()),
        _ => Err(RelayError::Forbidden(action)),
    }
}

fn require_member(members: &dyn MembershipOracle, club_id: Uuid, user_id: Uuid) -> Result<Role, RelayError> {
    members
        .get_role(club_id, user_id)?
        .ok_or(RelayError::Forbidden("only club members can react"))
}

fn patched(updated: Option<Message>) -> Result<Message, RelayError> {
    updated.ok_or_else(|| RelayError::invalid("message is deleted"))
}

impl Relay {
    /// Delete a message. Authors may delete their own; anyone else needs a
    /// moderator role.
    pub async fn delete_message(&self, actor_id: Uuid, message_id: Uuid) -> Result<Message, RelayError> {
        let (store, members) = (self.store(), self.members());
        let (club_id, message) = run_blocking(move || {
            let (message, club_id) = load_message(store.as_ref(), message_id)?;
            if message.is_deleted() {
                return Err(RelayError::invalid("message is already deleted"));
            }
            if message.sender_id != actor_id {
                require_moderator(
                    members.as_ref(),
                    club_id,
                    actor_id,
                    "only the author or a moderator can delete this message",
                )?;
            }
            let patch = MessagePatch::Delete { by: actor_id, at: Utc::now() };
            Ok((club_id, patched(store.update_message(message_id, patch)?)?))
        })
        .await?;

        info!("Message {} deleted by {}", message_id, actor_id);
        self.mirror_message(club_id, &message);
        Ok(message)
    }

    /// Replace the content of one's own message.
    pub async fn edit_message(
        &self,
        actor_id: Uuid,
        message_id: Uuid,
        content: String,
    ) -> Result<Message, RelayError> {
        if content.trim().is_empty() {
            return Err(RelayError::invalid("message content cannot be empty"));
        }

        let store = self.store();
        let (club_id, message) = run_blocking(move || {
            let (message, club_id) = load_message(store.as_ref(), message_id)?;
            if message.sender_id != actor_id {
                return Err(RelayError::Forbidden("only the author can edit this message"));
            }
            if message.is_deleted() {
                return Err(RelayError::invalid("cannot edit a deleted message"));
            }
            let patch = MessagePatch::Edit { content, at: Utc::now() };
            Ok((club_id, patched(store.update_message(message_id, patch)?)?))
        })
        .await?;

        self.mirror_message(club_id, &message);
        Ok(message)
    }

    /// Pin or unpin a message. Moderators only; deleted messages cannot be
    /// pinned.
    pub async fn set_pinned(&self, actor_id: Uuid, message_id: Uuid, pinned: bool) -> Result<Message, RelayError> {
        let (store, members) = (self.store(), self.members());
        let (club_id, message) = run_blocking(move || {
            let (message, club_id) = load_message(store.as_ref(), message_id)?;
            require_moderator(members.as_ref(), club_id, actor_id, "only moderators can pin messages")?;
            if message.is_deleted() {
                return Err(RelayError::invalid("cannot pin a deleted message"));
            }
            Ok((club_id, patched(store.update_message(message_id, MessagePatch::Pin(pinned))?)?))
        })
        .await?;

        info!(
            "Message {} {} by {}",
            message_id,
            if pinned { "pinned" } else { "unpinned" },
            actor_id
        );
        self.mirror_message(club_id, &message);
        Ok(message)
    }

    /// Add a reaction. Re-adding an existing reaction changes nothing.
    pub async fn add_reaction(
        &self,
        actor_id: Uuid,
        message_id: Uuid,
        emoji: String,
    ) -> Result<Vec<ReactionGroup>, RelayError> {
        self.react(actor_id, message_id, emoji, ReactionOp::Add)
            .await
            .map(|(_, reactions)| reactions)
    }

    /// Remove a reaction. Removing an absent reaction changes nothing.
    pub async fn remove_reaction(
        &self,
        actor_id: Uuid,
        message_id: Uuid,
        emoji: String,
    ) -> Result<Vec<ReactionGroup>, RelayError> {
        self.react(actor_id, message_id, emoji, ReactionOp::Remove)
            .await
            .map(|(_, reactions)| reactions)
    }

    /// Flip a reaction. Returns whether it is present afterwards.
    pub async fn toggle_reaction(
        &self,
        actor_id: Uuid,
        message_id: Uuid,
        emoji: String,
    ) -> Result<(bool, Vec<ReactionGroup>), RelayError> {
        self.react(actor_id, message_id, emoji, ReactionOp::Toggle).await
    }

    async fn react(
        &self,
        actor_id: Uuid,
        message_id: Uuid,
        emoji: String,
        op: ReactionOp,
    ) -> Result<(bool, Vec<ReactionGroup>), RelayError> {
        let emoji = emoji.trim().to_string();
        if emoji.is_empty() {
            return Err(RelayError::invalid("emoji cannot be empty"));
        }

        let (store, members) = (self.store(), self.members());
        let outcome = run_blocking(move || {
            let (message, club_id) = load_message(store.as_ref(), message_id)?;
            require_member(members.as_ref(), club_id, actor_id)?;
            if message.is_deleted() {
                return Err(RelayError::invalid("cannot react to a deleted message"));
            }

            let (changed, present) = match op {
                ReactionOp::Add => {
                    let added = store.add_reaction(message_id, actor_id, &emoji)?;
                    (added, true)
                }
                ReactionOp::Remove => {
                    let removed = store.remove_reaction(message_id, actor_id, &emoji)?;
                    (removed, false)
                }
                ReactionOp::Toggle => {
                    let present = store.toggle_reaction(message_id, actor_id, &emoji)?;
                    (true, present)
                }
            };
            let reactions = store.list_reactions(message_id)?;
            Ok((club_id, message.room_id, changed, present, reactions))
        })
        .await?;

        let (club_id, room_id, changed, present, reactions) = outcome;
        if changed {
            let recipients = self.registry().room_clients(club_id, room_id);
            presence::fan_out(
                &recipients,
                &GatewayEvent::ReactionsUpdated {
                    message_id,
                    room_id,
                    reactions: reactions.clone(),
                },
                None,
            );
        }
        Ok((present, reactions))
    }

    /// Send a message's current state to the clients looking at its room.
    /// Also the entry point for writes performed outside the relay.
    pub fn broadcast_message_update(&self, club_id: Uuid, message: &Message) -> usize {
        self.mirror_message(club_id, message)
    }

    fn mirror_message(&self, club_id: Uuid, message: &Message) -> usize {
        let recipients = self.registry().room_clients(club_id, message.room_id);
        presence::fan_out(
            &recipients,
            &GatewayEvent::MessageUpdated {
                message: message.clone(),
            },
            None,
        )
    }

    // -- Rooms --

    /// Create a room in a club. Moderators only.
    pub async fn create_room(
        &self,
        actor_id: Uuid,
        club_id: Uuid,
        name: String,
        room_type: RoomType,
    ) -> Result<Room, RelayError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(RelayError::invalid("room name cannot be empty"));
        }
        if room_type == RoomType::Default {
            return Err(RelayError::invalid("a club has exactly one default room"));
        }

        let (store, members) = (self.store(), self.members());
        let room = run_blocking(move || {
            store.find_club(club_id)?.ok_or(RelayError::NotFound("club"))?;
            require_moderator(members.as_ref(), club_id, actor_id, "only moderators can create rooms")?;
            Ok(store.create_room(club_id, &name, room_type)?)
        })
        .await?;

        info!("Room {} ({}) created in club {} by {}", room.name, room.id, club_id, actor_id);
        let clients = self.registry().list_room_clients(club_id);
        presence::fan_out(&clients, &GatewayEvent::RoomCreated { room: room.clone() }, None);
        Ok(room)
    }

    /// Delete a room. The club's only room and its default room are never
    /// deleted. Clients that were in the room are moved to the club's first
    /// remaining room.
    pub async fn delete_room(&self, actor_id: Uuid, club_id: Uuid, room_id: Uuid) -> Result<(), RelayError> {
        let (store, members) = (self.store(), self.members());
        let fallback = run_blocking(move || {
            let club = store.find_club(club_id)?.ok_or(RelayError::NotFound("club"))?;
            require_moderator(members.as_ref(), club_id, actor_id, "only moderators can delete rooms")?;
            let room = club.room(room_id).ok_or(RelayError::NotFound("room"))?;

            if club.rooms.len() <= 1 {
                return Err(RelayError::invalid("cannot delete the club's only room"));
            }
            if room.room_type == RoomType::Default {
                return Err(RelayError::invalid("the default room cannot be deleted"));
            }
            let fallback = club
                .rooms
                .iter()
                .find(|r| r.id != room_id)
                .map(|r| r.id)
                .ok_or_else(|| RelayError::invalid("cannot delete the club's only room"))?;

            if !store.delete_room(room_id)? {
                return Err(RelayError::invalid("cannot delete the club's only room"));
            }
            Ok(fallback)
        })
        .await?;

        info!("Room {} deleted from club {} by {}", room_id, club_id, actor_id);

        let _publish = self.publish_lock().await;
        let clients = self.registry().list_room_clients(club_id);
        presence::fan_out(&clients, &GatewayEvent::RoomDeleted { room_id }, None);

        let moved = self.registry().relocate_room(club_id, room_id, fallback);
        if moved.is_empty() {
            return Ok(());
        }
        // The room is already gone; a failed history read only costs the
        // moved clients their backlog, and they are told so.
        let (messages, history_failed) = match self.history(fallback).await {
            Ok(messages) => (messages, false),
            Err(e) => {
                warn!("History for room {} unavailable after relocation: {}", fallback, e);
                (vec![], true)
            }
        };
        presence::fan_out(
            &moved,
            &GatewayEvent::RoomSwitched {
                room_id: fallback,
                messages,
            },
            None,
        );
        if history_failed {
            presence::fan_out(
                &moved,
                &GatewayEvent::Error {
                    message: ROOM_HISTORY_UNAVAILABLE.to_string(),
                },
                None,
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum ReactionOp {
    Add,
    Remove,
    Toggle,
}
