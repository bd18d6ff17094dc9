//! Conversation and participant entity models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, Row};
use br_core::error::{BrError, BrResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationKind {
    Individual,
    Group,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Individual => "INDIVIDUAL",
            ConversationKind::Group => "GROUP",
        }
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationKind {
    type Err = BrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INDIVIDUAL" => Ok(ConversationKind::Individual),
            "GROUP" => Ok(ConversationKind::Group),
            other => Err(BrError::validation("kind", format!("unknown conversation kind {other}"))),
        }
    }
}

impl ToSql for ConversationKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ConversationKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: BrError| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Option<i64>,
    pub name: String,
    pub kind: ConversationKind,
    pub created_at: i64,
}

/// Membership of a user in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Option<i64>,
    pub conversation_id: i64,
    pub user_id: i64,
    pub joined_at: i64,
}

impl Conversation {
    pub fn new(name: impl Into<String>, kind: ConversationKind, created_at: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind,
            created_at,
        }
    }

    /// Construct a Conversation from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            kind: row.get("kind")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> BrResult<Option<Self>> {
        match conn.query_row("SELECT * FROM conversations WHERE id = ?1", [id], Self::from_row) {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(BrError::Database(e.to_string())),
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> BrResult<i64> {
        conn.execute(
            "INSERT INTO conversations (name, kind, created_at) VALUES (?1, ?2, ?3)",
            params![self.name, self.kind, self.created_at],
        )
        .map_err(|e| BrError::Database(e.to_string()))?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// The INDIVIDUAL conversation whose participants are exactly `a` and `b`.
    pub fn find_individual_between(conn: &Connection, a: i64, b: i64) -> BrResult<Option<Self>> {
        let result = conn.query_row(
            "SELECT c.* FROM conversations c
             WHERE c.kind = 'INDIVIDUAL'
               AND EXISTS (SELECT 1 FROM conversation_participants p WHERE p.conversation_id = c.id AND p.user_id = ?1)
               AND EXISTS (SELECT 1 FROM conversation_participants p WHERE p.conversation_id = c.id AND p.user_id = ?2)
               AND (SELECT COUNT(*) FROM conversation_participants p WHERE p.conversation_id = c.id) = 2
             ORDER BY c.id LIMIT 1",
            params![a, b],
            Self::from_row,
        );
        match result {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(BrError::Database(e.to_string())),
        }
    }

    pub fn delete(conn: &Connection, id: i64) -> BrResult<bool> {
        let changed = conn
            .execute("DELETE FROM conversations WHERE id = ?1", [id])
            .map_err(|e| BrError::Database(e.to_string()))?;
        Ok(changed > 0)
    }
}

impl Participant {
    /// Construct a Participant from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            conversation_id: row.get("conversation_id")?,
            user_id: row.get("user_id")?,
            joined_at: row.get("joined_at")?,
        })
    }

    /// Add a participant, replacing an existing membership row (REPLACE).
    pub fn upsert(conn: &Connection, conversation_id: i64, user_id: i64, joined_at: i64) -> BrResult<()> {
        conn.execute(
            "INSERT OR REPLACE INTO conversation_participants (conversation_id, user_id, joined_at)
             VALUES (?1, ?2, ?3)",
            params![conversation_id, user_id, joined_at],
        )
        .map_err(|e| BrError::Database(e.to_string()))?;
        Ok(())
    }

    pub fn remove(conn: &Connection, conversation_id: i64, user_id: i64) -> BrResult<bool> {
        let changed = conn
            .execute(
                "DELETE FROM conversation_participants WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id, user_id],
            )
            .map_err(|e| BrError::Database(e.to_string()))?;
        Ok(changed > 0)
    }

    pub fn list_for(conn: &Connection, conversation_id: i64) -> BrResult<Vec<Self>> {
        let mut stmt = conn
            .prepare("SELECT * FROM conversation_participants WHERE conversation_id = ?1 ORDER BY joined_at, id")
            .map_err(|e| BrError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([conversation_id], Self::from_row)
            .map_err(|e| BrError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| BrError::Database(e.to_string()))
    }

    pub fn is_member(conn: &Connection, conversation_id: i64, user_id: i64) -> BrResult<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM conversation_participants WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id, user_id],
                |row| row.get(0),
            )
            .map_err(|e| BrError::Database(e.to_string()))?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::tests::{insert_user, seeded_conn};

    #[test]
    fn test_participant_upsert_is_idempotent() {
        let conn = seeded_conn();
        let a = insert_user(&conn, "alice", "alice@x.cl");
        let conv = Conversation::new("chat", ConversationKind::Group, 1).insert(&conn).unwrap();

        Participant::upsert(&conn, conv, a, 1).unwrap();
        Participant::upsert(&conn, conv, a, 2).unwrap();
        let members = Participant::list_for(&conn, conv).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].joined_at, 2);
    }

    #[test]
    fn test_find_individual_between() {
        let conn = seeded_conn();
        let a = insert_user(&conn, "alice", "alice@x.cl");
        let b = insert_user(&conn, "bob", "bob@x.cl");
        let c = insert_user(&conn, "carol", "carol@x.cl");
        let conv = Conversation::new("a-b", ConversationKind::Individual, 1).insert(&conn).unwrap();
        Participant::upsert(&conn, conv, a, 1).unwrap();
        Participant::upsert(&conn, conv, b, 1).unwrap();

        let found = Conversation::find_individual_between(&conn, b, a).unwrap().unwrap();
        assert_eq!(found.id, Some(conv));
        assert!(Conversation::find_individual_between(&conn, a, c).unwrap().is_none());
    }

    #[test]
    fn test_user_delete_cascades_membership() {
        let conn = seeded_conn();
        let a = insert_user(&conn, "alice", "alice@x.cl");
        let conv = Conversation::new("chat", ConversationKind::Group, 1).insert(&conn).unwrap();
        Participant::upsert(&conn, conv, a, 1).unwrap();
        crate::models::user::User::delete(&conn, a).unwrap();
        assert!(!Participant::is_member(&conn, conv, a).unwrap());
    }
}
