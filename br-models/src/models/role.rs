//! Role entity model. Roles are static seed data.

use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use br_core::constants::roles;
use br_core::error::{BrError, BrResult};

/// A user role (Administrator, Firefighter, Citizen).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: String,
}

impl Role {
    /// Rows inserted by migration v1.
    pub fn seed() -> Vec<Role> {
        vec![
            Role::new(roles::ADMINISTRATOR, "Administrator", "Manages incidents and broadcasts alerts"),
            Role::new(roles::FIREFIGHTER, "Firefighter", "Takes and closes incidents"),
            Role::new(roles::CITIZEN, "Citizen", "Reports incidents"),
        ]
    }

    fn new(id: i64, name: &str, description: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: description.to_string(),
        }
    }

    /// Construct a Role from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
        })
    }

    /// Find a role by id.
    pub fn find_by_id(conn: &Connection, id: i64) -> BrResult<Option<Self>> {
        match conn.query_row("SELECT * FROM roles WHERE id = ?1", [id], Self::from_row) {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(BrError::Database(e.to_string())),
        }
    }

    /// All roles ordered by id.
    pub fn list(conn: &Connection) -> BrResult<Vec<Self>> {
        let mut stmt = conn
            .prepare("SELECT * FROM roles ORDER BY id")
            .map_err(|e| BrError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::from_row)
            .map_err(|e| BrError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| BrError::Database(e.to_string()))
    }

    /// Insert or replace this role by id, so re-seeding is idempotent.
    pub fn upsert(&self, conn: &Connection) -> BrResult<()> {
        conn.execute(
            "INSERT INTO roles (id, name, description) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, description = excluded.description",
            params![self.id, self.name, self.description],
        )
        .map_err(|e| BrError::Database(e.to_string()))?;
        Ok(())
    }
}
