//! Collaborator contracts the relay consumes, and their SQLite-backed
//! implementation.
//!
//! The traits are synchronous: the relay always calls them from the
//! blocking pool, never from an async task.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use nook_db::Database;
use nook_db::models::{
    AttachmentRow, DirectMessageRow, MessageRow, NewDirectMessage, NewMessage, ReactionRow,
    RoomRow,
};
use nook_types::models::{
    Attachment, Club, DELETED_PLACEHOLDER, DirectMessage, MemberDetail, Message, ReactionGroup,
    Role, Room, RoomType,
};

/// A chat message about to be persisted.
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub room_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: Option<String>,
    pub attachment_ids: Vec<Uuid>,
    pub reply_to_id: Option<Uuid>,
}

/// State changes applied to an existing message.
#[derive(Debug, Clone)]
pub enum MessagePatch {
    Edit { content: String, at: DateTime<Utc> },
    Delete { by: Uuid, at: DateTime<Utc> },
    Pin(bool),
}

/// Durable storage for clubs, rooms and room messages.
pub trait SessionStore: Send + Sync {
    fn find_club(&self, club_id: Uuid) -> Result<Option<Club>>;

    fn find_room(&self, room_id: Uuid) -> Result<Option<Room>>;

    /// Returns `None`, storing nothing, when the draft has no content and
    /// none of its attachments could be linked to it.
    fn create_message(&self, draft: NewChatMessage) -> Result<Option<Message>>;

    fn find_message(&self, message_id: Uuid) -> Result<Option<Message>>;

    /// Most recent `limit` messages of a room, oldest first.
    fn list_recent_messages(&self, room_id: Uuid, limit: u32) -> Result<Vec<Message>>;

    /// Returns `None` if the message does not exist or is deleted.
    fn update_message(&self, message_id: Uuid, patch: MessagePatch) -> Result<Option<Message>>;

    /// Returns true if the reaction was newly added.
    fn add_reaction(&self, message_id: Uuid, user_id: Uuid, emoji: &str) -> Result<bool>;

    /// Returns true if a reaction was actually removed.
    fn remove_reaction(&self, message_id: Uuid, user_id: Uuid, emoji: &str) -> Result<bool>;

    /// Returns true if the reaction is present afterwards.
    fn toggle_reaction(&self, message_id: Uuid, user_id: Uuid, emoji: &str) -> Result<bool>;

    fn list_reactions(&self, message_id: Uuid) -> Result<Vec<ReactionGroup>>;

    fn create_room(&self, club_id: Uuid, name: &str, room_type: RoomType) -> Result<Room>;

    /// Returns false, leaving everything untouched, when the room is the
    /// last one of its club.
    fn delete_room(&self, room_id: Uuid) -> Result<bool>;
}

/// Answers who belongs to a club and with which role.
pub trait MembershipOracle: Send + Sync {
    fn get_role(&self, club_id: Uuid, user_id: Uuid) -> Result<Option<Role>>;

    fn is_member(&self, club_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self.get_role(club_id, user_id)?.is_some())
    }

    fn add_member(&self, club_id: Uuid, user_id: Uuid, display_name: &str) -> Result<()>;

    fn member_details(&self, club_id: Uuid) -> Result<Vec<MemberDetail>>;
}

/// Persistence for direct messages, owned by the user domain.
pub trait DirectMessageStore: Send + Sync {
    fn create_direct_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: Option<String>,
        attachment_ids: Vec<Uuid>,
    ) -> Result<Option<DirectMessage>>;

    /// Most recent `limit` messages between two users, oldest first.
    fn list_direct_messages(&self, user_a: Uuid, user_b: Uuid, limit: u32) -> Result<Vec<DirectMessage>>;
}

// -- SQLite implementation --

impl SessionStore for Database {
    fn find_club(&self, club_id: Uuid) -> Result<Option<Club>> {
        let id = club_id.to_string();
        let Some(row) = self.get_club(&id)? else {
            return Ok(None);
        };

        let member_ids = self
            .get_member_ids(&id)?
            .iter()
            .map(|s| parse_uuid(s))
            .collect::<Result<Vec<_>>>()?;
        let rooms = self
            .get_rooms(&id)?
            .into_iter()
            .map(room_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Club {
            id: parse_uuid(&row.id)?,
            name: row.name,
            creator_id: parse_uuid(&row.creator_id)?,
            is_private: row.is_private,
            member_ids,
            rooms,
        }))
    }

    fn find_room(&self, room_id: Uuid) -> Result<Option<Room>> {
        self.get_room(&room_id.to_string())?.map(room_from_row).transpose()
    }

    fn create_message(&self, draft: NewChatMessage) -> Result<Option<Message>> {
        let id = Uuid::new_v4().to_string();
        let room_id = draft.room_id.to_string();
        let sender_id = draft.sender_id.to_string();
        let reply_to_id = draft.reply_to_id.map(|r| r.to_string());
        let attachment_ids: Vec<String> = draft.attachment_ids.iter().map(Uuid::to_string).collect();
        let created_at = Utc::now().to_rfc3339();

        let stored = self.insert_message(&NewMessage {
            id: &id,
            room_id: &room_id,
            sender_id: &sender_id,
            sender_name: &draft.sender_name,
            content: draft.content.as_deref(),
            reply_to_id: reply_to_id.as_deref(),
            created_at: &created_at,
            attachment_ids: &attachment_ids,
        })?;
        if !stored {
            return Ok(None);
        }

        reload_message(self, &id).map(Some)
    }

    fn find_message(&self, message_id: Uuid) -> Result<Option<Message>> {
        match self.get_message(&message_id.to_string())? {
            Some(row) => Ok(assemble_messages(self, vec![row])?.pop()),
            None => Ok(None),
        }
    }

    fn list_recent_messages(&self, room_id: Uuid, limit: u32) -> Result<Vec<Message>> {
        let rows = self.get_recent_messages(&room_id.to_string(), limit)?;
        assemble_messages(self, rows)
    }

    fn update_message(&self, message_id: Uuid, patch: MessagePatch) -> Result<Option<Message>> {
        let id = message_id.to_string();
        let applied = match patch {
            MessagePatch::Edit { content, at } => {
                self.edit_message_content(&id, &content, &at.to_rfc3339())?
            }
            MessagePatch::Delete { by, at } => self.mark_message_deleted(
                &id,
                &by.to_string(),
                &at.to_rfc3339(),
                DELETED_PLACEHOLDER,
            )?,
            MessagePatch::Pin(pinned) => self.set_message_pinned(&id, pinned)?,
        };

        if !applied {
            return Ok(None);
        }
        reload_message(self, &id).map(Some)
    }

    fn add_reaction(&self, message_id: Uuid, user_id: Uuid, emoji: &str) -> Result<bool> {
        Database::add_reaction(self, &message_id.to_string(), &user_id.to_string(), emoji)
    }

    fn remove_reaction(&self, message_id: Uuid, user_id: Uuid, emoji: &str) -> Result<bool> {
        Database::remove_reaction(self, &message_id.to_string(), &user_id.to_string(), emoji)
    }

    fn toggle_reaction(&self, message_id: Uuid, user_id: Uuid, emoji: &str) -> Result<bool> {
        Database::toggle_reaction(self, &message_id.to_string(), &user_id.to_string(), emoji)
    }

    fn list_reactions(&self, message_id: Uuid) -> Result<Vec<ReactionGroup>> {
        let id = message_id.to_string();
        let rows = self.get_reactions_for_messages(std::slice::from_ref(&id))?;
        Ok(group_reactions(&rows).remove(&id).unwrap_or_default())
    }

    fn create_room(&self, club_id: Uuid, name: &str, room_type: RoomType) -> Result<Room> {
        let id = Uuid::new_v4();
        self.insert_room(&id.to_string(), &club_id.to_string(), name, room_type.as_str())?;
        Ok(Room {
            id,
            club_id,
            name: name.to_string(),
            room_type,
        })
    }

    fn delete_room(&self, room_id: Uuid) -> Result<bool> {
        Database::delete_room(self, &room_id.to_string())
    }
}

impl MembershipOracle for Database {
    fn get_role(&self, club_id: Uuid, user_id: Uuid) -> Result<Option<Role>> {
        let role = self.get_member_role(&club_id.to_string(), &user_id.to_string())?;
        Ok(role.map(|r| parse_role(&r)))
    }

    fn add_member(&self, club_id: Uuid, user_id: Uuid, display_name: &str) -> Result<()> {
        let user = user_id.to_string();
        self.ensure_user(&user, display_name)?;
        Database::add_member(self, &club_id.to_string(), &user, Role::Member.as_str())?;
        Ok(())
    }

    fn member_details(&self, club_id: Uuid) -> Result<Vec<MemberDetail>> {
        self.get_members(&club_id.to_string())?
            .into_iter()
            .map(|row| {
                Ok(MemberDetail {
                    user_id: parse_uuid(&row.user_id)?,
                    username: row.username,
                    role: parse_role(&row.role),
                })
            })
            .collect()
    }
}

impl DirectMessageStore for Database {
    fn create_direct_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: Option<String>,
        attachment_ids: Vec<Uuid>,
    ) -> Result<Option<DirectMessage>> {
        let id = Uuid::new_v4().to_string();
        let sender = sender_id.to_string();
        let receiver = receiver_id.to_string();
        let attachment_ids: Vec<String> = attachment_ids.iter().map(Uuid::to_string).collect();
        let created_at = Utc::now().to_rfc3339();

        let stored = self.insert_direct_message(&NewDirectMessage {
            id: &id,
            sender_id: &sender,
            receiver_id: &receiver,
            content: content.as_deref(),
            reply_to_id: None,
            created_at: &created_at,
            attachment_ids: &attachment_ids,
        })?;
        if !stored {
            return Ok(None);
        }

        let row = self
            .get_direct_message(&id)?
            .ok_or_else(|| anyhow!("direct message {} vanished after insert", id))?;
        assemble_direct_messages(self, vec![row])?
            .pop()
            .map(Some)
            .ok_or_else(|| anyhow!("direct message {} could not be assembled", id))
    }

    fn list_direct_messages(&self, user_a: Uuid, user_b: Uuid, limit: u32) -> Result<Vec<DirectMessage>> {
        let rows = self.get_direct_messages_between(&user_a.to_string(), &user_b.to_string(), limit)?;
        assemble_direct_messages(self, rows)
    }
}

// -- Row conversion --

fn reload_message(db: &Database, id: &str) -> Result<Message> {
    let row = db
        .get_message(id)?
        .ok_or_else(|| anyhow!("message {} vanished after write", id))?;
    assemble_messages(db, vec![row])?
        .pop()
        .ok_or_else(|| anyhow!("message {} could not be assembled", id))
}

/// Attach attachments and reactions to message rows, preserving row order.
fn assemble_messages(db: &Database, rows: Vec<MessageRow>) -> Result<Vec<Message>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut attachments = group_attachments(db.get_attachments_for_messages(&ids)?, |a| {
        a.message_id.clone()
    })?;
    let mut reactions = group_reactions(&db.get_reactions_for_messages(&ids)?);

    rows.into_iter()
        .map(|row| {
            Ok(Message {
                id: parse_uuid(&row.id)?,
                room_id: parse_uuid(&row.room_id)?,
                sender_id: parse_uuid(&row.sender_id)?,
                sender_name: row.sender_name,
                content: row.content,
                attachments: attachments.remove(&row.id).unwrap_or_default(),
                reply_to_id: row.reply_to_id.as_deref().map(parse_uuid).transpose()?,
                created_at: parse_time(&row.created_at)?,
                edited_at: row.edited_at.as_deref().map(parse_time).transpose()?,
                deleted_at: row.deleted_at.as_deref().map(parse_time).transpose()?,
                deleted_by: row.deleted_by.as_deref().map(parse_uuid).transpose()?,
                is_pinned: row.is_pinned,
                reactions: reactions.remove(&row.id).unwrap_or_default(),
            })
        })
        .collect()
}

fn assemble_direct_messages(db: &Database, rows: Vec<DirectMessageRow>) -> Result<Vec<DirectMessage>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut attachments = group_attachments(db.get_attachments_for_direct_messages(&ids)?, |a| {
        a.direct_message_id.clone()
    })?;

    rows.into_iter()
        .map(|row| {
            Ok(DirectMessage {
                id: parse_uuid(&row.id)?,
                sender_id: parse_uuid(&row.sender_id)?,
                receiver_id: parse_uuid(&row.receiver_id)?,
                content: row.content,
                attachments: attachments.remove(&row.id).unwrap_or_default(),
                reply_to_id: row.reply_to_id.as_deref().map(parse_uuid).transpose()?,
                created_at: parse_time(&row.created_at)?,
                edited_at: row.edited_at.as_deref().map(parse_time).transpose()?,
            })
        })
        .collect()
}

fn group_attachments(
    rows: Vec<AttachmentRow>,
    owner: impl Fn(&AttachmentRow) -> Option<String>,
) -> Result<HashMap<String, Vec<Attachment>>> {
    let mut map: HashMap<String, Vec<Attachment>> = HashMap::new();
    for row in rows {
        let Some(owner_id) = owner(&row) else { continue };
        map.entry(owner_id).or_default().push(Attachment {
            id: parse_uuid(&row.id)?,
            file_name: row.file_name,
            content_type: row.content_type,
            url: row.url,
            size: row.size,
        });
    }
    Ok(map)
}

/// Group reactions by message_id -> emoji -> user_ids, keeping the order in
/// which each emoji first appeared.
fn group_reactions(rows: &[ReactionRow]) -> HashMap<String, Vec<ReactionGroup>> {
    let mut map: HashMap<String, Vec<ReactionGroup>> = HashMap::new();
    for r in rows {
        let Ok(user_id) = r.user_id.parse::<Uuid>() else {
            warn!("Corrupt reaction user_id '{}' on message '{}'", r.user_id, r.message_id);
            continue;
        };
        let groups = map.entry(r.message_id.clone()).or_default();
        match groups.iter_mut().find(|g| g.emoji == r.emoji) {
            Some(group) => {
                group.user_ids.push(user_id);
                group.count = group.user_ids.len();
            }
            None => groups.push(ReactionGroup {
                emoji: r.emoji.clone(),
                count: 1,
                user_ids: vec![user_id],
            }),
        }
    }
    map
}

fn room_from_row(row: RoomRow) -> Result<Room> {
    let room_type = RoomType::parse(&row.room_type).unwrap_or_else(|| {
        warn!("Unknown room type '{}' on room '{}'", row.room_type, row.id);
        RoomType::Public
    });
    Ok(Room {
        id: parse_uuid(&row.id)?,
        club_id: parse_uuid(&row.club_id)?,
        name: row.name,
        room_type,
    })
}

fn parse_role(s: &str) -> Role {
    Role::parse(s).unwrap_or_else(|| {
        warn!("Unknown member role '{}', treating as member", s);
        Role::Member
    })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    s.parse().with_context(|| format!("corrupt id '{}'", s))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite defaults store "YYYY-MM-DD HH:MM:SS" without timezone.
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{}'", s))
}
