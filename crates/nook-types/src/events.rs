use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Club, DirectMessage, MemberDetail, Message, OnlineUser, ReactionGroup, Room,
};

/// Events sent over the relay websocket, server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum GatewayEvent {
    /// Initial snapshot after a successful room join
    Init {
        client_id: Uuid,
        club: Club,
        current_room_id: Uuid,
        messages: Vec<Message>,
        members: Vec<MemberDetail>,
        users: Vec<OnlineUser>,
    },

    /// Reply to a room switch, carrying the new room's history
    RoomSwitched { room_id: Uuid, messages: Vec<Message> },

    /// Another connection entered the club. `members` is only present when
    /// the join added a new club member.
    UserJoined {
        user: OnlineUser,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        members: Option<Vec<MemberDetail>>,
    },

    /// A connection left the club
    UserLeft { user_id: Uuid, username: String },

    /// A user is typing in the recipient's room
    UserTyping { user_id: Uuid, username: String },

    /// A persisted chat message
    ChatMessage { message: Message },

    /// A message changed state (edit, delete, pin, unpin)
    MessageUpdated { message: Message },

    /// The reaction set of a message changed
    ReactionsUpdated {
        message_id: Uuid,
        room_id: Uuid,
        reactions: Vec<ReactionGroup>,
    },

    RoomCreated { room: Room },

    RoomDeleted { room_id: Uuid },

    /// Acknowledges a DM registration
    DmJoined { user_id: Uuid },

    /// Confirmation to the sender of a persisted direct message
    DmSent { message: DirectMessage },

    /// Push to the receiver of a direct message
    DmReceived { message: DirectMessage },

    Error { message: String },
}

/// Commands sent FROM client TO server over the relay websocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum GatewayCommand {
    /// Enter a club, optionally at a specific room
    Join {
        club_id: Uuid,
        user_id: Uuid,
        display_name: String,
        #[serde(default)]
        room_id: Option<Uuid>,
    },

    SwitchRoom { room_id: Uuid },

    /// Post to the current room. `message` may be absent for
    /// attachment-only posts.
    ChatMessage {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        attachments: Vec<Uuid>,
        #[serde(default)]
        reply_to_id: Option<Uuid>,
    },

    Typing,

    /// Register this connection as the user's direct-message channel
    JoinDm { user_id: Uuid, display_name: String },

    DmMessage {
        receiver_id: Uuid,
        content: String,
        #[serde(default)]
        attachments: Vec<Uuid>,
    },

    DeleteMessage { message_id: Uuid },

    EditMessage { message_id: Uuid, content: String },

    PinMessage { message_id: Uuid },

    UnpinMessage { message_id: Uuid },

    AddReaction { message_id: Uuid, emoji: String },

    RemoveReaction { message_id: Uuid, emoji: String },
}

impl GatewayCommand {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::SwitchRoom { .. } => "switch-room",
            Self::ChatMessage { .. } => "chat-message",
            Self::Typing => "typing",
            Self::JoinDm { .. } => "join-dm",
            Self::DmMessage { .. } => "dm-message",
            Self::DeleteMessage { .. } => "delete-message",
            Self::EditMessage { .. } => "edit-message",
            Self::PinMessage { .. } => "pin-message",
            Self::UnpinMessage { .. } => "unpin-message",
            Self::AddReaction { .. } => "add-reaction",
            Self::RemoveReaction { .. } => "remove-reaction",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_without_room_parses() {
        let club_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"join","data":{{"club_id":"{club_id}","user_id":"{user_id}","display_name":"Ada"}}}}"#
        );
        let cmd: GatewayCommand = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            cmd,
            GatewayCommand::Join {
                club_id,
                user_id,
                display_name: "Ada".into(),
                room_id: None,
            }
        );
    }

    #[test]
    fn attachment_only_chat_message_parses() {
        let attachment = Uuid::new_v4();
        let raw = format!(r#"{{"type":"chat-message","data":{{"attachments":["{attachment}"]}}}}"#);
        let cmd: GatewayCommand = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            cmd,
            GatewayCommand::ChatMessage {
                message: None,
                attachments: vec![attachment],
                reply_to_id: None,
            }
        );
    }

    #[test]
    fn user_joined_omits_members_when_absent() {
        let event = GatewayEvent::UserJoined {
            user: OnlineUser {
                client_id: Uuid::nil(),
                user_id: Uuid::nil(),
                username: "ada".into(),
                room_id: Uuid::nil(),
            },
            members: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "user-joined");
        assert!(json["data"].get("members").is_none());
    }

    #[test]
    fn dm_event_names_are_kebab_case() {
        let json = serde_json::to_value(GatewayEvent::DmJoined { user_id: Uuid::nil() }).unwrap();
        assert_eq!(json["type"], "dm-joined");
    }
}
