use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Tables owned by the wider platform (users, clubs, memberships, uploads)
/// are created here too so a standalone relay has a complete schema.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS clubs (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            creator_id  TEXT NOT NULL,
            is_private  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS club_members (
            club_id     TEXT NOT NULL REFERENCES clubs(id),
            user_id     TEXT NOT NULL,
            role        TEXT NOT NULL DEFAULT 'member',
            joined_at   TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (club_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS rooms (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            id          TEXT NOT NULL UNIQUE,
            club_id     TEXT NOT NULL REFERENCES clubs(id),
            name        TEXT NOT NULL,
            room_type   TEXT NOT NULL DEFAULT 'public',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_rooms_club
            ON rooms(club_id, seq);

        -- seq gives every message a monotonic creation order that history
        -- queries sort on; created_at is informational.
        CREATE TABLE IF NOT EXISTS messages (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            id              TEXT NOT NULL UNIQUE,
            room_id         TEXT NOT NULL REFERENCES rooms(id),
            sender_id       TEXT NOT NULL,
            sender_name     TEXT NOT NULL,
            content         TEXT,
            reply_to_id     TEXT,
            created_at      TEXT NOT NULL,
            edited_at       TEXT,
            deleted_at      TEXT,
            deleted_by      TEXT,
            is_pinned       INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_messages_room
            ON messages(room_id, seq);

        CREATE TABLE IF NOT EXISTS direct_messages (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            id              TEXT NOT NULL UNIQUE,
            sender_id       TEXT NOT NULL,
            receiver_id     TEXT NOT NULL,
            content         TEXT,
            reply_to_id     TEXT,
            created_at      TEXT NOT NULL,
            edited_at       TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_direct_messages_pair
            ON direct_messages(sender_id, receiver_id, seq);

        CREATE TABLE IF NOT EXISTS attachments (
            id                  TEXT PRIMARY KEY,
            uploader_id         TEXT NOT NULL,
            message_id          TEXT REFERENCES messages(id),
            direct_message_id   TEXT REFERENCES direct_messages(id),
            file_name           TEXT NOT NULL,
            content_type        TEXT NOT NULL,
            url                 TEXT NOT NULL,
            size                INTEGER NOT NULL,
            created_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_attachments_message
            ON attachments(message_id);

        CREATE INDEX IF NOT EXISTS idx_attachments_direct_message
            ON attachments(direct_message_id);

        CREATE TABLE IF NOT EXISTS reactions (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            user_id     TEXT NOT NULL,
            emoji       TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (message_id, user_id, emoji)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
