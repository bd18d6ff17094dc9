//! Database schema definitions and table creation.
//!
//! Relational layout for users, roles, photos, incidents, alert/chat
//! messages, per-user recipient copies and conversations. Foreign keys
//! cascade from photos to the rows that display them.

use rusqlite::Connection;
use br_core::error::{BrError, BrResult};
use tracing::debug;

/// Create all database tables and indexes if they do not exist.
pub fn create_tables(conn: &Connection) -> BrResult<()> {
    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| BrError::Database(format!("failed to create schema: {e}")))?;
    debug!("database schema verified");
    Ok(())
}

/// Complete SQL schema for all tables.
const SCHEMA_SQL: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

-- Static roles (seeded by migration v1)
CREATE TABLE IF NOT EXISTS roles (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    name                TEXT NOT NULL,
    description         TEXT NOT NULL DEFAULT ''
);

-- Images referenced by users and incidents, deduplicated by URL
CREATE TABLE IF NOT EXISTS photos (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    name                TEXT NOT NULL,
    url                 TEXT NOT NULL UNIQUE
);

-- Accounts
CREATE TABLE IF NOT EXISTS users (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    run                 TEXT NOT NULL,
    dv                  TEXT NOT NULL,
    username            TEXT NOT NULL,
    name                TEXT NOT NULL,
    email               TEXT NOT NULL,
    phone               TEXT NOT NULL,
    password            TEXT NOT NULL,
    foto_id             INTEGER NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
    rol_id              INTEGER NOT NULL REFERENCES roles(id)
);

CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);
CREATE INDEX IF NOT EXISTS idx_users_foto ON users(foto_id);

-- Incident reports. Assigned and closed incidents always carry an assignee.
CREATE TABLE IF NOT EXISTS incidents (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    title               TEXT NOT NULL,
    created_at          INTEGER NOT NULL,
    detail              TEXT NOT NULL,
    foto_id             INTEGER REFERENCES photos(id) ON DELETE CASCADE,
    latitude            REAL,
    longitude           REAL,
    comuna              TEXT,
    region              TEXT,
    address             TEXT,
    state               TEXT NOT NULL DEFAULT 'CREATED'
                        CHECK (state IN ('CREATED', 'ASSIGNED', 'CLOSED')),
    assigned_to         INTEGER REFERENCES users(id) ON DELETE RESTRICT,
    reported_by         INTEGER REFERENCES users(id) ON DELETE CASCADE,
    CHECK (state = 'CREATED' OR assigned_to IS NOT NULL)
);

CREATE INDEX IF NOT EXISTS idx_incidents_state ON incidents(state);
CREATE INDEX IF NOT EXISTS idx_incidents_assigned ON incidents(assigned_to);
CREATE INDEX IF NOT EXISTS idx_incidents_created ON incidents(created_at);
CREATE INDEX IF NOT EXISTS idx_incidents_foto ON incidents(foto_id);

-- Conversations
CREATE TABLE IF NOT EXISTS conversations (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    name                TEXT NOT NULL,
    kind                TEXT NOT NULL CHECK (kind IN ('INDIVIDUAL', 'GROUP')),
    created_at          INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS conversation_participants (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id     INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    user_id             INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    joined_at           INTEGER NOT NULL,
    UNIQUE (conversation_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_participants_user ON conversation_participants(user_id);

-- Alert templates and chat messages
CREATE TABLE IF NOT EXISTS messages (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    title               TEXT NOT NULL DEFAULT '',
    body                TEXT NOT NULL,
    created_at          INTEGER NOT NULL,
    read                INTEGER NOT NULL DEFAULT 0,
    kind                TEXT NOT NULL CHECK (kind IN ('ALERT', 'CHAT')),
    sender_id           INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    conversation_id     INTEGER REFERENCES conversations(id) ON DELETE CASCADE,
    withdrawn           INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_messages_kind ON messages(kind);
CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at, id);

-- Per-user notification copies. Template deletion leaves copies in place.
CREATE TABLE IF NOT EXISTS recipient_copies (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    recipient_id        INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    template_id         INTEGER REFERENCES messages(id) ON DELETE SET NULL,
    title               TEXT NOT NULL,
    body                TEXT NOT NULL,
    created_at          INTEGER NOT NULL,
    read                INTEGER NOT NULL DEFAULT 0,
    deleted             INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_copies_recipient ON recipient_copies(recipient_id, deleted);
CREATE INDEX IF NOT EXISTS idx_copies_template ON recipient_copies(template_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        let tables = ["roles", "photos", "users", "incidents", "conversations",
                      "conversation_participants", "messages", "recipient_copies",
                      "schema_version"];
        for table in &tables {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "table {table} should exist");
        }
    }

    #[test]
    fn test_create_tables_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_closed_incident_requires_assignee() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO incidents (title, created_at, detail, state) VALUES ('t', 0, 'd', 'CLOSED')",
            [],
        );
        assert!(result.is_err());
    }
}
