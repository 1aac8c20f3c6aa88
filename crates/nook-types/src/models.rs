use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder text that replaces the content of a deleted message.
pub const DELETED_PLACEHOLDER: &str = "[Message deleted]";

/// A club member's standing. Ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Moderator,
    Admin,
    Owner,
}

impl Role {
    /// Moderators and above may pin, unpin, delete other people's messages
    /// and manage rooms.
    pub fn can_moderate(self) -> bool {
        self >= Role::Moderator
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "member" => Some(Role::Member),
            "moderator" => Some(Role::Moderator),
            "admin" => Some(Role::Admin),
            "owner" => Some(Role::Owner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Default,
    Public,
    Private,
    Announcement,
}

impl RoomType {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomType::Default => "default",
            RoomType::Public => "public",
            RoomType::Private => "private",
            RoomType::Announcement => "announcement",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(RoomType::Default),
            "public" => Some(RoomType::Public),
            "private" => Some(RoomType::Private),
            "announcement" => Some(RoomType::Announcement),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub club_id: Uuid,
    pub name: String,
    pub room_type: RoomType,
}

/// Club snapshot as the relay sees it. Rooms are listed in creation order,
/// so the first entry is the club's entry room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Club {
    pub id: Uuid,
    pub name: String,
    pub creator_id: Uuid,
    pub is_private: bool,
    pub member_ids: Vec<Uuid>,
    pub rooms: Vec<Room>,
}

impl Club {
    pub fn room(&self, room_id: Uuid) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == room_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub url: String,
    pub size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub emoji: String,
    pub count: usize,
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: Option<String>,
    pub attachments: Vec<Attachment>,
    pub reply_to_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub is_pinned: bool,
    pub reactions: Vec<ReactionGroup>,
}

impl Message {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Messages between two users. Owned by the user domain, not by any club.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: Option<String>,
    pub attachments: Vec<Attachment>,
    pub reply_to_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

/// Display details for a club member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDetail {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

/// A connection currently present in a club.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineUser {
    pub client_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub room_id: Uuid,
}
