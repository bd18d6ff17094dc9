//! User entity model.

use std::fmt;

use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use br_core::error::{BrError, BrResult};

/// An account. `password` holds an argon2 PHC string, or plaintext for
/// legacy rows that have not been upgraded yet.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<i64>,
    pub run: String,
    pub dv: String,
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub foto_id: i64,
    pub rol_id: i64,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("rol_id", &self.rol_id)
            .field("foto_id", &self.foto_id)
            .finish_non_exhaustive()
    }
}

/// Mutable profile fields. Email, role and photo are changed elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub name: String,
    pub username: String,
    pub phone: String,
    pub run: String,
    pub dv: String,
}

impl User {
    /// Construct a User from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            run: row.get("run")?,
            dv: row.get("dv")?,
            username: row.get("username")?,
            name: row.get("name")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            password: row.get("password")?,
            foto_id: row.get("foto_id")?,
            rol_id: row.get("rol_id")?,
        })
    }

    // ─── Static finders ──────────────────────────────────────────────────

    pub fn find_by_id(conn: &Connection, id: i64) -> BrResult<Option<Self>> {
        Self::find_one(conn, "SELECT * FROM users WHERE id = ?1", &id)
    }

    /// Case-insensitive email lookup.
    pub fn find_by_email(conn: &Connection, email: &str) -> BrResult<Option<Self>> {
        Self::find_one(
            conn,
            "SELECT * FROM users WHERE lower(email) = lower(?1) ORDER BY id LIMIT 1",
            &email.trim(),
        )
    }

    /// Username lookup. Usernames are not unique; the oldest row wins.
    pub fn find_by_username(conn: &Connection, username: &str) -> BrResult<Option<Self>> {
        Self::find_one(
            conn,
            "SELECT * FROM users WHERE username = ?1 ORDER BY id LIMIT 1",
            &username.trim(),
        )
    }

    /// Login lookup: an identifier containing `@` is an email, anything else
    /// a username.
    pub fn find_by_identifier(conn: &Connection, identifier: &str) -> BrResult<Option<Self>> {
        if identifier.contains('@') {
            Self::find_by_email(conn, identifier)
        } else {
            Self::find_by_username(conn, identifier)
        }
    }

    fn find_one(conn: &Connection, sql: &str, param: &dyn rusqlite::ToSql) -> BrResult<Option<Self>> {
        match conn.query_row(sql, [param], Self::from_row) {
            Ok(u) => Ok(Some(u)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(BrError::Database(e.to_string())),
        }
    }

    pub fn email_exists(conn: &Connection, email: &str) -> BrResult<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE lower(email) = lower(?1)",
                [email.trim()],
                |row| row.get(0),
            )
            .map_err(|e| BrError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    pub fn count(conn: &Connection) -> BrResult<i64> {
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .map_err(|e| BrError::Database(e.to_string()))
    }

    pub fn list(conn: &Connection) -> BrResult<Vec<Self>> {
        let mut stmt = conn
            .prepare("SELECT * FROM users ORDER BY id")
            .map_err(|e| BrError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::from_row)
            .map_err(|e| BrError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| BrError::Database(e.to_string()))
    }

    // ─── Commands ────────────────────────────────────────────────────────

    /// Insert a new user (ABORT on conflict).
    pub fn insert(&mut self, conn: &Connection) -> BrResult<i64> {
        conn.execute(
            "INSERT INTO users (run, dv, username, name, email, phone, password, foto_id, rol_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                self.run,
                self.dv,
                self.username,
                self.name,
                self.email,
                self.phone,
                self.password,
                self.foto_id,
                self.rol_id,
            ],
        )
        .map_err(|e| BrError::Database(e.to_string()))?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Insert a batch of users with ABORT semantics, filling in each id.
    /// The first failing row aborts the batch.
    pub fn insert_all(conn: &Connection, users: &mut [User]) -> BrResult<()> {
        for user in users.iter_mut() {
            user.insert(conn)?;
        }
        Ok(())
    }

    /// Persist the mutable profile fields. Returns false if the user does not exist.
    pub fn update_fields(conn: &Connection, id: i64, update: &UserUpdate) -> BrResult<bool> {
        let changed = conn
            .execute(
                "UPDATE users SET name = ?1, username = ?2, phone = ?3, run = ?4, dv = ?5 WHERE id = ?6",
                params![update.name, update.username, update.phone, update.run, update.dv, id],
            )
            .map_err(|e| BrError::Database(e.to_string()))?;
        Ok(changed > 0)
    }

    pub fn update_password(conn: &Connection, id: i64, password: &str) -> BrResult<bool> {
        let changed = conn
            .execute("UPDATE users SET password = ?1 WHERE id = ?2", params![password, id])
            .map_err(|e| BrError::Database(e.to_string()))?;
        Ok(changed > 0)
    }

    pub fn update_photo(conn: &Connection, id: i64, foto_id: i64) -> BrResult<bool> {
        let changed = conn
            .execute("UPDATE users SET foto_id = ?1 WHERE id = ?2", params![foto_id, id])
            .map_err(|e| BrError::Database(e.to_string()))?;
        Ok(changed > 0)
    }

    pub fn delete(conn: &Connection, id: i64) -> BrResult<bool> {
        let changed = conn
            .execute("DELETE FROM users WHERE id = ?1", [id])
            .map_err(|e| BrError::Database(e.to_string()))?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::photo::Photo;
    use crate::models::role::Role;
    use crate::schema;

    pub(crate) fn seeded_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        schema::create_tables(&conn).unwrap();
        for role in Role::seed() {
            role.upsert(&conn).unwrap();
        }
        conn
    }

    pub(crate) fn insert_user(conn: &Connection, username: &str, email: &str) -> i64 {
        let foto_id = Photo::new(username, format!("https://img/{username}.png"))
            .find_or_insert(conn)
            .unwrap();
        let mut user = User {
            id: None,
            run: "12345678".into(),
            dv: "5".into(),
            username: username.into(),
            name: "Test User".into(),
            email: email.into(),
            phone: "912345678".into(),
            password: "secret".into(),
            foto_id,
            rol_id: 3,
        };
        user.insert(conn).unwrap()
    }

    #[test]
    fn test_find_by_identifier() {
        let conn = seeded_conn();
        let id = insert_user(&conn, "alice", "Alice@Example.cl");

        let by_email = User::find_by_identifier(&conn, "alice@example.cl").unwrap().unwrap();
        assert_eq!(by_email.id, Some(id));
        let by_name = User::find_by_identifier(&conn, "alice").unwrap().unwrap();
        assert_eq!(by_name.id, Some(id));
        assert!(User::find_by_identifier(&conn, "bob").unwrap().is_none());
        assert!(User::email_exists(&conn, "ALICE@example.cl").unwrap());
    }

    #[test]
    fn test_update_fields_leaves_email_and_role() {
        let conn = seeded_conn();
        let id = insert_user(&conn, "alice", "alice@example.cl");
        let update = UserUpdate {
            name: "Alicia".into(),
            username: "alicia".into(),
            phone: "987654321".into(),
            run: "11111111".into(),
            dv: "1".into(),
        };
        assert!(User::update_fields(&conn, id, &update).unwrap());

        let user = User::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(user.name, "Alicia");
        assert_eq!(user.email, "alice@example.cl");
        assert_eq!(user.rol_id, 3);
        assert!(!User::update_fields(&conn, 999, &update).unwrap());
    }

    #[test]
    fn test_debug_redacts_password() {
        let conn = seeded_conn();
        let id = insert_user(&conn, "alice", "alice@example.cl");
        let user = User::find_by_id(&conn, id).unwrap().unwrap();
        assert!(!format!("{user:?}").contains("secret"));
    }

    #[test]
    fn test_photo_delete_cascades_to_user() {
        let conn = seeded_conn();
        let id = insert_user(&conn, "alice", "alice@example.cl");
        let user = User::find_by_id(&conn, id).unwrap().unwrap();
        Photo::delete(&conn, user.foto_id).unwrap();
        assert!(User::find_by_id(&conn, id).unwrap().is_none());
    }
}
