use crate::models::{
    AttachmentRow, ClubRow, DirectMessageRow, MemberRow, MessageRow, NewDirectMessage,
    NewMessage, ReactionRow, RoomRow,
};
use crate::Database;
use anyhow::Result;
use rusqlite::{Row, params, params_from_iter};

const MESSAGE_COLUMNS: &str = "id, room_id, sender_id, sender_name, content, reply_to_id, \
     created_at, edited_at, deleted_at, deleted_by, is_pinned";

const DIRECT_MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, content, reply_to_id, created_at, edited_at";

impl Database {
    // -- Users --

    /// Record a user's display name. Users are owned by the identity
    /// service; this only mirrors what member listings need.
    pub fn upsert_user(&self, id: &str, username: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET username = excluded.username",
                (id, username),
            )?;
            Ok(())
        })
    }

    /// Record a user only if the identity service has not already done so.
    pub fn ensure_user(&self, id: &str, username: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("INSERT OR IGNORE INTO users (id, username) VALUES (?1, ?2)", (id, username))?;
            Ok(())
        })
    }

    // -- Clubs --

    pub fn insert_club(&self, id: &str, name: &str, creator_id: &str, is_private: bool) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO clubs (id, name, creator_id, is_private) VALUES (?1, ?2, ?3, ?4)",
                params![id, name, creator_id, is_private],
            )?;
            tx.execute(
                "INSERT INTO club_members (club_id, user_id, role) VALUES (?1, ?2, 'owner')",
                (id, creator_id),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_club(&self, id: &str) -> Result<Option<ClubRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, creator_id, is_private FROM clubs WHERE id = ?1",
                [id],
                |row| {
                    Ok(ClubRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        creator_id: row.get(2)?,
                        is_private: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Membership --

    pub fn get_member_role(&self, club_id: &str, user_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT role FROM club_members WHERE club_id = ?1 AND user_id = ?2",
                (club_id, user_id),
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Add a member. Returns false if the user already belonged to the club.
    pub fn add_member(&self, club_id: &str, user_id: &str, role: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO club_members (club_id, user_id, role) VALUES (?1, ?2, ?3)",
                (club_id, user_id, role),
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn get_member_ids(&self, club_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM club_members WHERE club_id = ?1 ORDER BY joined_at, user_id",
            )?;
            let ids = stmt
                .query_map([club_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    pub fn get_members(&self, club_id: &str) -> Result<Vec<MemberRow>> {
        // JOIN users to fetch display names in a single query
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT cm.user_id, u.username, cm.role
                 FROM club_members cm
                 LEFT JOIN users u ON cm.user_id = u.id
                 WHERE cm.club_id = ?1
                 ORDER BY cm.joined_at, cm.user_id",
            )?;
            let rows = stmt
                .query_map([club_id], |row| {
                    Ok(MemberRow {
                        user_id: row.get(0)?,
                        username: row
                            .get::<_, Option<String>>(1)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        role: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Rooms --

    pub fn insert_room(&self, id: &str, club_id: &str, name: &str, room_type: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO rooms (id, club_id, name, room_type) VALUES (?1, ?2, ?3, ?4)",
                (id, club_id, name, room_type),
            )?;
            Ok(())
        })
    }

    pub fn get_room(&self, id: &str) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, club_id, name, room_type FROM rooms WHERE id = ?1",
                [id],
                room_from_row,
            )
            .optional()
        })
    }

    /// Rooms of a club in creation order.
    pub fn get_rooms(&self, club_id: &str) -> Result<Vec<RoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, club_id, name, room_type FROM rooms WHERE club_id = ?1 ORDER BY seq",
            )?;
            let rows = stmt
                .query_map([club_id], room_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete a room together with its messages and their reactions.
    /// Refuses to remove the last room of a club; returns false in that case.
    pub fn delete_room(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let remaining: i64 = tx.query_row(
                "SELECT COUNT(*) FROM rooms
                 WHERE club_id = (SELECT club_id FROM rooms WHERE id = ?1)",
                [id],
                |row| row.get(0),
            )?;
            if remaining <= 1 {
                return Ok(false);
            }

            tx.execute(
                "DELETE FROM reactions WHERE message_id IN (SELECT id FROM messages WHERE room_id = ?1)",
                [id],
            )?;
            tx.execute(
                "UPDATE attachments SET message_id = NULL
                 WHERE message_id IN (SELECT id FROM messages WHERE room_id = ?1)",
                [id],
            )?;
            tx.execute("DELETE FROM messages WHERE room_id = ?1", [id])?;
            tx.execute("DELETE FROM rooms WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(true)
        })
    }

    // -- Attachments --

    /// Record an uploaded file. Uploads land in external storage; the relay
    /// only links their records to messages.
    pub fn insert_attachment(
        &self,
        id: &str,
        uploader_id: &str,
        file_name: &str,
        content_type: &str,
        url: &str,
        size: i64,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO attachments (id, uploader_id, file_name, content_type, url, size)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, uploader_id, file_name, content_type, url, size],
            )?;
            Ok(())
        })
    }

    pub fn get_attachments_for_messages(&self, message_ids: &[String]) -> Result<Vec<AttachmentRow>> {
        self.attachments_where("message_id", message_ids)
    }

    pub fn get_attachments_for_direct_messages(&self, ids: &[String]) -> Result<Vec<AttachmentRow>> {
        self.attachments_where("direct_message_id", ids)
    }

    fn attachments_where(&self, column: &str, ids: &[String]) -> Result<Vec<AttachmentRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, message_id, direct_message_id, file_name, content_type, url, size
                 FROM attachments WHERE {} IN ({}) ORDER BY created_at, id",
                column,
                placeholders(ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(ids.iter()), |row| {
                    Ok(AttachmentRow {
                        id: row.get(0)?,
                        message_id: row.get(1)?,
                        direct_message_id: row.get(2)?,
                        file_name: row.get(3)?,
                        content_type: row.get(4)?,
                        url: row.get(5)?,
                        size: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    /// Insert a message and link the sender's unclaimed attachments to it,
    /// in one transaction. Attachment ids the sender did not upload, or that
    /// already belong to another message, are ignored.
    ///
    /// Returns false, storing nothing, when the message has no content and
    /// none of its attachments could be linked.
    pub fn insert_message(&self, msg: &NewMessage<'_>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (id, room_id, sender_id, sender_name, content, reply_to_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    msg.id,
                    msg.room_id,
                    msg.sender_id,
                    msg.sender_name,
                    msg.content,
                    msg.reply_to_id,
                    msg.created_at
                ],
            )?;
            let mut linked = 0;
            for attachment_id in msg.attachment_ids {
                linked += tx.execute(
                    "UPDATE attachments SET message_id = ?1
                     WHERE id = ?2 AND uploader_id = ?3
                       AND message_id IS NULL AND direct_message_id IS NULL",
                    (msg.id, attachment_id, msg.sender_id),
                )?;
            }
            if msg.content.is_none() && linked == 0 {
                tx.rollback()?;
                return Ok(false);
            }
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
            conn.query_row(&sql, [id], message_from_row).optional()
        })
    }

    /// The `limit` most recent messages of a room, oldest first.
    pub fn get_recent_messages(&self, room_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages WHERE room_id = ?1 ORDER BY seq DESC LIMIT ?2",
                MESSAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt
                .query_map(params![room_id, limit], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();
            Ok(rows)
        })
    }

    pub fn edit_message_content(&self, id: &str, content: &str, edited_at: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET content = ?2, edited_at = ?3 WHERE id = ?1 AND deleted_at IS NULL",
                (id, content, edited_at),
            )?;
            Ok(changed > 0)
        })
    }

    /// Soft-delete: the row keeps its id and position, the content becomes
    /// `placeholder`, the pin is cleared and reactions are dropped.
    pub fn mark_message_deleted(
        &self,
        id: &str,
        deleted_by: &str,
        deleted_at: &str,
        placeholder: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE messages
                 SET content = ?2, deleted_at = ?3, deleted_by = ?4, is_pinned = 0
                 WHERE id = ?1 AND deleted_at IS NULL",
                (id, placeholder, deleted_at, deleted_by),
            )?;
            tx.execute("DELETE FROM reactions WHERE message_id = ?1", [id])?;
            tx.commit()?;
            Ok(changed > 0)
        })
    }

    pub fn set_message_pinned(&self, id: &str, pinned: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET is_pinned = ?2 WHERE id = ?1 AND deleted_at IS NULL",
                params![id, pinned],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Reactions --

    /// Returns true if the reaction was not present before.
    pub fn add_reaction(&self, message_id: &str, user_id: &str, emoji: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO reactions (message_id, user_id, emoji) VALUES (?1, ?2, ?3)",
                (message_id, user_id, emoji),
            )?;
            Ok(inserted > 0)
        })
    }

    /// Returns true if a reaction was actually removed.
    pub fn remove_reaction(&self, message_id: &str, user_id: &str, emoji: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM reactions WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                (message_id, user_id, emoji),
            )?;
            Ok(removed > 0)
        })
    }

    /// Toggle a reaction: removes if exists, inserts if not.
    /// Returns true when the reaction is present afterwards.
    pub fn toggle_reaction(&self, message_id: &str, user_id: &str, emoji: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM reactions WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                (message_id, user_id, emoji),
            )?;
            if removed == 0 {
                tx.execute(
                    "INSERT INTO reactions (message_id, user_id, emoji) VALUES (?1, ?2, ?3)",
                    (message_id, user_id, emoji),
                )?;
            }
            tx.commit()?;
            Ok(removed == 0)
        })
    }

    /// Batch-fetch reactions for a set of message IDs, in the order they
    /// were added.
    pub fn get_reactions_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReactionRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT message_id, user_id, emoji FROM reactions
                 WHERE message_id IN ({}) ORDER BY rowid",
                placeholders(message_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(message_ids.iter()), |row| {
                    Ok(ReactionRow {
                        message_id: row.get(0)?,
                        user_id: row.get(1)?,
                        emoji: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Direct messages --

    /// Direct-message counterpart of `insert_message`, with the same rule
    /// for empty messages.
    pub fn insert_direct_message(&self, msg: &NewDirectMessage<'_>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO direct_messages (id, sender_id, receiver_id, content, reply_to_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    msg.id,
                    msg.sender_id,
                    msg.receiver_id,
                    msg.content,
                    msg.reply_to_id,
                    msg.created_at
                ],
            )?;
            let mut linked = 0;
            for attachment_id in msg.attachment_ids {
                linked += tx.execute(
                    "UPDATE attachments SET direct_message_id = ?1
                     WHERE id = ?2 AND uploader_id = ?3
                       AND message_id IS NULL AND direct_message_id IS NULL",
                    (msg.id, attachment_id, msg.sender_id),
                )?;
            }
            if msg.content.is_none() && linked == 0 {
                tx.rollback()?;
                return Ok(false);
            }
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn get_direct_message(&self, id: &str) -> Result<Option<DirectMessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM direct_messages WHERE id = ?1", DIRECT_MESSAGE_COLUMNS);
            conn.query_row(&sql, [id], direct_message_from_row).optional()
        })
    }

    /// The `limit` most recent messages exchanged between two users, oldest
    /// first.
    pub fn get_direct_messages_between(
        &self,
        user_a: &str,
        user_b: &str,
        limit: u32,
    ) -> Result<Vec<DirectMessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM direct_messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY seq DESC LIMIT ?3",
                DIRECT_MESSAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt
                .query_map(params![user_a, user_b, limit], direct_message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();
            Ok(rows)
        })
    }
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

fn room_from_row(row: &Row<'_>) -> rusqlite::Result<RoomRow> {
    Ok(RoomRow {
        id: row.get(0)?,
        club_id: row.get(1)?,
        name: row.get(2)?,
        room_type: row.get(3)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        room_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row.get(3)?,
        content: row.get(4)?,
        reply_to_id: row.get(5)?,
        created_at: row.get(6)?,
        edited_at: row.get(7)?,
        deleted_at: row.get(8)?,
        deleted_by: row.get(9)?,
        is_pinned: row.get(10)?,
    })
}

fn direct_message_from_row(row: &Row<'_>) -> rusqlite::Result<DirectMessageRow> {
    Ok(DirectMessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        content: row.get(3)?,
        reply_to_id: row.get(4)?,
        created_at: row.get(5)?,
        edited_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLUB: &str = "c0000000-0000-0000-0000-000000000001";
    const OWNER: &str = "u0000000-0000-0000-0000-000000000001";
    const READER: &str = "u0000000-0000-0000-0000-000000000002";

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user(OWNER, "owner").unwrap();
        db.insert_club(CLUB, "Slow Readers", OWNER, false).unwrap();
        db.insert_room("general", CLUB, "general", "default").unwrap();
        db
    }

    fn post(db: &Database, id: &str, content: &str) {
        db.insert_message(&NewMessage {
            id,
            room_id: "general",
            sender_id: READER,
            sender_name: "reader",
            content: Some(content),
            reply_to_id: None,
            created_at: "2026-01-01T00:00:00Z",
            attachment_ids: &[],
        })
        .unwrap();
    }

    #[test]
    fn creator_becomes_owner() {
        let db = seeded();
        assert_eq!(db.get_member_role(CLUB, OWNER).unwrap().as_deref(), Some("owner"));
        assert!(db.add_member(CLUB, READER, "member").unwrap());
        assert!(!db.add_member(CLUB, READER, "member").unwrap());

        let members = db.get_members(CLUB).unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.iter().any(|m| m.username == "unknown"));
    }

    #[test]
    fn recent_messages_are_bounded_and_ascending() {
        let db = seeded();
        for i in 0..5 {
            post(&db, &format!("m{}", i), &format!("message {}", i));
        }

        let rows = db.get_recent_messages("general", 3).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["m2", "m3", "m4"]);
    }

    #[test]
    fn last_room_is_never_deleted() {
        let db = seeded();
        assert!(!db.delete_room("general").unwrap());
        assert_eq!(db.get_rooms(CLUB).unwrap().len(), 1);

        db.insert_room("spoilers", CLUB, "spoilers", "public").unwrap();
        post(&db, "m1", "hi");
        assert!(db.delete_room("general").unwrap());
        assert!(db.get_message("m1").unwrap().is_none());
        assert_eq!(db.get_rooms(CLUB).unwrap().len(), 1);
    }

    #[test]
    fn soft_delete_clears_pin_and_reactions() {
        let db = seeded();
        post(&db, "m1", "spoiler!");
        assert!(db.set_message_pinned("m1", true).unwrap());
        assert!(db.add_reaction("m1", OWNER, "👍").unwrap());

        assert!(db.mark_message_deleted("m1", OWNER, "2026-01-02T00:00:00Z", "[gone]").unwrap());
        let row = db.get_message("m1").unwrap().unwrap();
        assert_eq!(row.content.as_deref(), Some("[gone]"));
        assert!(!row.is_pinned);
        assert_eq!(row.deleted_by.as_deref(), Some(OWNER));
        assert!(db.get_reactions_for_messages(&["m1".into()]).unwrap().is_empty());

        // Deleted rows can be neither deleted again nor re-pinned
        assert!(!db.mark_message_deleted("m1", OWNER, "2026-01-03T00:00:00Z", "[gone]").unwrap());
        assert!(!db.set_message_pinned("m1", true).unwrap());
    }

    #[test]
    fn reactions_are_idempotent() {
        let db = seeded();
        post(&db, "m1", "chapter 3 thoughts");

        assert!(db.add_reaction("m1", OWNER, "📚").unwrap());
        assert!(!db.add_reaction("m1", OWNER, "📚").unwrap());
        assert!(db.remove_reaction("m1", OWNER, "📚").unwrap());
        assert!(!db.remove_reaction("m1", OWNER, "📚").unwrap());

        assert!(db.toggle_reaction("m1", OWNER, "📚").unwrap());
        assert!(!db.toggle_reaction("m1", OWNER, "📚").unwrap());
        assert!(db.get_reactions_for_messages(&["m1".into()]).unwrap().is_empty());
    }

    #[test]
    fn attachments_link_only_to_their_uploader() {
        let db = seeded();
        db.insert_attachment("a1", READER, "cover.png", "image/png", "/files/a1", 10).unwrap();
        db.insert_attachment("a2", OWNER, "notes.pdf", "application/pdf", "/files/a2", 20).unwrap();

        db.insert_message(&NewMessage {
            id: "m1",
            room_id: "general",
            sender_id: READER,
            sender_name: "reader",
            content: None,
            reply_to_id: None,
            created_at: "2026-01-01T00:00:00Z",
            attachment_ids: &["a1".into(), "a2".into()],
        })
        .unwrap();

        let linked = db.get_attachments_for_messages(&["m1".into()]).unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].id, "a1");
    }

    #[test]
    fn message_without_content_or_linkable_attachments_is_not_stored() {
        let db = seeded();
        db.insert_attachment("a2", OWNER, "notes.pdf", "application/pdf", "/files/a2", 20).unwrap();

        let stored = db
            .insert_message(&NewMessage {
                id: "m1",
                room_id: "general",
                sender_id: READER,
                sender_name: "reader",
                content: None,
                reply_to_id: None,
                created_at: "2026-01-01T00:00:00Z",
                attachment_ids: &["missing".into(), "a2".into()],
            })
            .unwrap();
        assert!(!stored);
        assert!(db.get_message("m1").unwrap().is_none());

        let stored = db
            .insert_direct_message(&NewDirectMessage {
                id: "d1",
                sender_id: READER,
                receiver_id: OWNER,
                content: None,
                reply_to_id: None,
                created_at: "2026-01-01T00:00:00Z",
                attachment_ids: &["missing".into()],
            })
            .unwrap();
        assert!(!stored);
        assert!(db.get_direct_message("d1").unwrap().is_none());
        assert!(db.get_direct_messages_between(READER, OWNER, 50).unwrap().is_empty());
    }

    #[test]
    fn direct_messages_list_both_directions() {
        let db = seeded();
        for (i, (from, to)) in [(OWNER, READER), (READER, OWNER), (OWNER, "someone-else")]
            .into_iter()
            .enumerate()
        {
            db.insert_direct_message(&NewDirectMessage {
                id: &format!("d{}", i),
                sender_id: from,
                receiver_id: to,
                content: Some("hey"),
                reply_to_id: None,
                created_at: "2026-01-01T00:00:00Z",
                attachment_ids: &[],
            })
            .unwrap();
        }

        let rows = db.get_direct_messages_between(READER, OWNER, 50).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["d0", "d1"]);
    }
}
