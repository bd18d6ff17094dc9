//! Message entity model: alert templates and chat messages share one table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, Row};
use br_core::error::{BrError, BrResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Broadcast template, fanned out to recipient copies.
    Alert,
    /// Delivered inside a conversation.
    Chat,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Alert => "ALERT",
            MessageKind::Chat => "CHAT",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = BrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALERT" => Ok(MessageKind::Alert),
            "CHAT" => Ok(MessageKind::Chat),
            other => Err(BrError::validation("kind", format!("unknown message kind {other}"))),
        }
    }
}

impl ToSql for MessageKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MessageKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: BrError| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Option<i64>,
    pub title: String,
    pub body: String,
    pub created_at: i64,
    pub read: bool,
    pub kind: MessageKind,
    pub sender_id: i64,
    pub conversation_id: Option<i64>,
    pub withdrawn: bool,
}

impl Message {
    pub fn alert(title: impl Into<String>, body: impl Into<String>, sender_id: i64, created_at: i64) -> Self {
        Self {
            id: None,
            title: title.into(),
            body: body.into(),
            created_at,
            read: false,
            kind: MessageKind::Alert,
            sender_id,
            conversation_id: None,
            withdrawn: false,
        }
    }

    pub fn chat(conversation_id: i64, sender_id: i64, body: impl Into<String>, read: bool, created_at: i64) -> Self {
        Self {
            id: None,
            title: String::new(),
            body: body.into(),
            created_at,
            read,
            kind: MessageKind::Chat,
            sender_id,
            conversation_id: Some(conversation_id),
            withdrawn: false,
        }
    }

    /// Construct a Message from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            body: row.get("body")?,
            created_at: row.get("created_at")?,
            read: row.get("read")?,
            kind: row.get("kind")?,
            sender_id: row.get("sender_id")?,
            conversation_id: row.get("conversation_id")?,
            withdrawn: row.get("withdrawn")?,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> BrResult<Option<Self>> {
        match conn.query_row("SELECT * FROM messages WHERE id = ?1", [id], Self::from_row) {
            Ok(m) => Ok(Some(m)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(BrError::Database(e.to_string())),
        }
    }

    /// Insert a message (ABORT on conflict).
    pub fn insert(&mut self, conn: &Connection) -> BrResult<i64> {
        conn.execute(
            "INSERT INTO messages (title, body, created_at, read, kind, sender_id, conversation_id, withdrawn)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.title,
                self.body,
                self.created_at,
                self.read,
                self.kind,
                self.sender_id,
                self.conversation_id,
                self.withdrawn,
            ],
        )
        .map_err(|e| BrError::Database(e.to_string()))?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Mark one message as read. Already-read rows are left untouched.
    pub fn mark_read(conn: &Connection, id: i64) -> BrResult<usize> {
        conn.execute("UPDATE messages SET read = 1 WHERE id = ?1 AND read = 0", [id])
            .map_err(|e| BrError::Database(e.to_string()))
    }

    /// Mark every unread message in a conversation not sent by `reader` as read.
    pub fn mark_conversation_read(conn: &Connection, conversation_id: i64, reader: i64) -> BrResult<usize> {
        conn.execute(
            "UPDATE messages SET read = 1
             WHERE conversation_id = ?1 AND sender_id <> ?2 AND read = 0",
            params![conversation_id, reader],
        )
        .map_err(|e| BrError::Database(e.to_string()))
    }

    /// Flag an alert template as withdrawn.
    pub fn set_withdrawn(conn: &Connection, id: i64) -> BrResult<usize> {
        conn.execute(
            "UPDATE messages SET withdrawn = 1 WHERE id = ?1 AND kind = 'ALERT' AND withdrawn = 0",
            [id],
        )
        .map_err(|e| BrError::Database(e.to_string()))
    }

    pub fn delete(conn: &Connection, id: i64) -> BrResult<bool> {
        let changed = conn
            .execute("DELETE FROM messages WHERE id = ?1", [id])
            .map_err(|e| BrError::Database(e.to_string()))?;
        Ok(changed > 0)
    }
}
