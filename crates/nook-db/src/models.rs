//! Database row types. These map directly to SQLite rows.
//! Distinct from nook-types models to keep the DB layer independent.

pub struct ClubRow {
    pub id: String,
    pub name: String,
    pub creator_id: String,
    pub is_private: bool,
}

pub struct RoomRow {
    pub id: String,
    pub club_id: String,
    pub name: String,
    pub room_type: String,
}

pub struct MemberRow {
    pub user_id: String,
    pub username: String,
    pub role: String,
}

pub struct MessageRow {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: Option<String>,
    pub reply_to_id: Option<String>,
    pub created_at: String,
    pub edited_at: Option<String>,
    pub deleted_at: Option<String>,
    pub deleted_by: Option<String>,
    pub is_pinned: bool,
}

pub struct DirectMessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: Option<String>,
    pub reply_to_id: Option<String>,
    pub created_at: String,
    pub edited_at: Option<String>,
}

pub struct AttachmentRow {
    pub id: String,
    pub message_id: Option<String>,
    pub direct_message_id: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub url: String,
    pub size: i64,
}

pub struct ReactionRow {
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
}

/// Fields of a new chat message.
pub struct NewMessage<'a> {
    pub id: &'a str,
    pub room_id: &'a str,
    pub sender_id: &'a str,
    pub sender_name: &'a str,
    pub content: Option<&'a str>,
    pub reply_to_id: Option<&'a str>,
    pub created_at: &'a str,
    pub attachment_ids: &'a [String],
}

/// Fields of a new direct message.
pub struct NewDirectMessage<'a> {
    pub id: &'a str,
    pub sender_id: &'a str,
    pub receiver_id: &'a str,
    pub content: Option<&'a str>,
    pub reply_to_id: Option<&'a str>,
    pub created_at: &'a str,
    pub attachment_ids: &'a [String],
}
