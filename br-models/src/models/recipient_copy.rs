//! Per-user notification copies of alert templates.
//!
//! Each copy is mutated independently: marking one recipient's copy read or
//! deleted never touches another recipient's copy or the template.

use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use br_core::error::{BrError, BrResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientCopy {
    pub id: Option<i64>,
    pub recipient_id: i64,
    /// Alert template this copy came from. `None` for ad-hoc notices.
    pub template_id: Option<i64>,
    pub title: String,
    pub body: String,
    pub created_at: i64,
    pub read: bool,
    pub deleted: bool,
}

impl RecipientCopy {
    /// An ad-hoc notice for a single user.
    pub fn notice(recipient_id: i64, title: impl Into<String>, body: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: None,
            recipient_id,
            template_id: None,
            title: title.into(),
            body: body.into(),
            created_at,
            read: false,
            deleted: false,
        }
    }

    /// Construct a RecipientCopy from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            recipient_id: row.get("recipient_id")?,
            template_id: row.get("template_id")?,
            title: row.get("title")?,
            body: row.get("body")?,
            created_at: row.get("created_at")?,
            read: row.get("read")?,
            deleted: row.get("deleted")?,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> BrResult<Option<Self>> {
        match conn.query_row("SELECT * FROM recipient_copies WHERE id = ?1", [id], Self::from_row) {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(BrError::Database(e.to_string())),
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> BrResult<i64> {
        conn.execute(
            "INSERT INTO recipient_copies (recipient_id, template_id, title, body, created_at, read, deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.recipient_id,
                self.template_id,
                self.title,
                self.body,
                self.created_at,
                self.read,
                self.deleted,
            ],
        )
        .map_err(|e| BrError::Database(e.to_string()))?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Create one copy of `template_id` for every user that exists right now.
    ///
    /// A single `INSERT .. SELECT`, so the recipient set is the users table
    /// as of this statement. Returns the number of copies created.
    pub fn fan_out(conn: &Connection, template_id: i64, title: &str, body: &str, created_at: i64) -> BrResult<usize> {
        conn.execute(
            "INSERT INTO recipient_copies (recipient_id, template_id, title, body, created_at, read, deleted)
             SELECT id, ?1, ?2, ?3, ?4, 0, 0 FROM users",
            params![template_id, title, body, created_at],
        )
        .map_err(|e| BrError::Database(e.to_string()))
    }

    pub fn count_for_template(conn: &Connection, template_id: i64) -> BrResult<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM recipient_copies WHERE template_id = ?1",
            [template_id],
            |row| row.get(0),
        )
        .map_err(|e| BrError::Database(e.to_string()))
    }

    /// Mark one of a recipient's copies read. Returns false when the
    /// recipient has no such copy.
    pub fn mark_read(conn: &Connection, recipient_id: i64, id: i64) -> BrResult<bool> {
        Self::set_flag(
            conn,
            "UPDATE recipient_copies SET read = 1 WHERE id = ?1 AND recipient_id = ?2",
            recipient_id,
            id,
        )
    }

    /// Soft-delete one of a recipient's copies. Returns false when the
    /// recipient has no such copy.
    pub fn mark_deleted(conn: &Connection, recipient_id: i64, id: i64) -> BrResult<bool> {
        Self::set_flag(
            conn,
            "UPDATE recipient_copies SET deleted = 1 WHERE id = ?1 AND recipient_id = ?2",
            recipient_id,
            id,
        )
    }

    fn set_flag(conn: &Connection, sql: &str, recipient_id: i64, id: i64) -> BrResult<bool> {
        let changed = conn
            .execute(sql, params![id, recipient_id])
            .map_err(|e| BrError::Database(e.to_string()))?;
        Ok(changed > 0)
    }

    /// Mark every unread, visible copy of a user read.
    pub fn mark_all_read_for(conn: &Connection, recipient_id: i64) -> BrResult<usize> {
        conn.execute(
            "UPDATE recipient_copies SET read = 1
             WHERE recipient_id = ?1 AND read = 0 AND deleted = 0",
            [recipient_id],
        )
        .map_err(|e| BrError::Database(e.to_string()))
    }

    /// Soft-delete every visible copy of a user.
    pub fn mark_all_deleted_for(conn: &Connection, recipient_id: i64) -> BrResult<usize> {
        conn.execute(
            "UPDATE recipient_copies SET deleted = 1 WHERE recipient_id = ?1 AND deleted = 0",
            [recipient_id],
        )
        .map_err(|e| BrError::Database(e.to_string()))
    }

    /// Soft-delete every copy of a template, across all recipients.
    pub fn mark_deleted_by_template(conn: &Connection, template_id: i64) -> BrResult<usize> {
        conn.execute(
            "UPDATE recipient_copies SET deleted = 1 WHERE template_id = ?1 AND deleted = 0",
            [template_id],
        )
        .map_err(|e| BrError::Database(e.to_string()))
    }

    /// Mark every copy of a template read, across all recipients.
    pub fn mark_read_by_template(conn: &Connection, template_id: i64) -> BrResult<usize> {
        conn.execute(
            "UPDATE recipient_copies SET read = 1 WHERE template_id = ?1 AND read = 0",
            [template_id],
        )
        .map_err(|e| BrError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Message;
    use crate::models::user::tests::{insert_user, seeded_conn};

    #[test]
    fn test_fan_out_snapshot() {
        let conn = seeded_conn();
        let admin = insert_user(&conn, "admin", "a@a.cl");
        insert_user(&conn, "bombero", "b@b.cl");
        let template = Message::alert("t", "b", admin, 1).insert(&conn).unwrap();

        assert_eq!(RecipientCopy::fan_out(&conn, template, "t", "b", 1).unwrap(), 2);
        insert_user(&conn, "late", "late@c.cl");
        assert_eq!(RecipientCopy::count_for_template(&conn, template).unwrap(), 2);
    }

    #[test]
    fn test_bulk_marks_are_idempotent_and_scoped() {
        let conn = seeded_conn();
        let admin = insert_user(&conn, "admin", "a@a.cl");
        let other = insert_user(&conn, "bombero", "b@b.cl");
        let template = Message::alert("t", "b", admin, 1).insert(&conn).unwrap();
        RecipientCopy::fan_out(&conn, template, "t", "b", 1).unwrap();

        assert_eq!(RecipientCopy::mark_all_read_for(&conn, admin).unwrap(), 1);
        assert_eq!(RecipientCopy::mark_all_read_for(&conn, admin).unwrap(), 0);

        let unread_other: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM recipient_copies WHERE recipient_id = ?1 AND read = 0",
                [other],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(unread_other, 1);
    }

    #[test]
    fn test_template_delete_keeps_copies() {
        let conn = seeded_conn();
        let admin = insert_user(&conn, "admin", "a@a.cl");
        let template = Message::alert("t", "b", admin, 1).insert(&conn).unwrap();
        RecipientCopy::fan_out(&conn, template, "t", "b", 1).unwrap();

        Message::delete(&conn, template).unwrap();
        let copy: RecipientCopy = conn
            .query_row("SELECT * FROM recipient_copies LIMIT 1", [], RecipientCopy::from_row)
            .unwrap();
        assert_eq!(copy.template_id, None);
        assert_eq!(copy.title, "t");
    }
}
