//! Photo entity model. Photos are deduplicated by URL.

use serde::{Deserialize, Serialize};
use rusqlite::{params, Connection, Row};
use br_core::error::{BrError, BrResult};

/// An image referenced by users and incidents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: Option<i64>,
    pub name: String,
    pub url: String,
}

impl Photo {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            url: url.into(),
        }
    }

    /// Construct a Photo from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            url: row.get("url")?,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> BrResult<Option<Self>> {
        match conn.query_row("SELECT * FROM photos WHERE id = ?1", [id], Self::from_row) {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(BrError::Database(e.to_string())),
        }
    }

    pub fn find_by_url(conn: &Connection, url: &str) -> BrResult<Option<Self>> {
        match conn.query_row("SELECT * FROM photos WHERE url = ?1", [url], Self::from_row) {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(BrError::Database(e.to_string())),
        }
    }

    /// Insert a new photo row. Fails if the URL already exists.
    pub fn insert(&mut self, conn: &Connection) -> BrResult<i64> {
        conn.execute(
            "INSERT INTO photos (name, url) VALUES (?1, ?2)",
            params![self.name, self.url],
        )
        .map_err(|e| BrError::Database(e.to_string()))?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Return the id of the row holding this URL, inserting it if absent.
    ///
    /// An existing row keeps its original name.
    pub fn find_or_insert(&mut self, conn: &Connection) -> BrResult<i64> {
        conn.execute(
            "INSERT INTO photos (name, url) VALUES (?1, ?2) ON CONFLICT(url) DO NOTHING",
            params![self.name, self.url],
        )
        .map_err(|e| BrError::Database(e.to_string()))?;

        let id: i64 = conn
            .query_row("SELECT id FROM photos WHERE url = ?1", [&self.url], |row| row.get(0))
            .map_err(|e| BrError::Database(e.to_string()))?;
        self.id = Some(id);
        Ok(id)
    }

    /// Find-or-insert a batch of photos, filling in each id. Entries sharing a
    /// URL end up on the same row, which keeps the first name stored.
    pub fn insert_all(conn: &Connection, photos: &mut [Photo]) -> BrResult<()> {
        for photo in photos.iter_mut() {
            photo.find_or_insert(conn)?;
        }
        Ok(())
    }

    /// Delete a photo. Users and incidents referencing it are removed by cascade.
    pub fn delete(conn: &Connection, id: i64) -> BrResult<bool> {
        let changed = conn
            .execute("DELETE FROM photos WHERE id = ?1", [id])
            .map_err(|e| BrError::Database(e.to_string()))?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn
    }

    #[test]
    fn test_find_or_insert_dedups_by_url() {
        let conn = conn();
        let first = Photo::new("a", "https://img/a.png").find_or_insert(&conn).unwrap();
        let second = Photo::new("other name", "https://img/a.png").find_or_insert(&conn).unwrap();
        assert_eq!(first, second);

        let stored = Photo::find_by_url(&conn, "https://img/a.png").unwrap().unwrap();
        assert_eq!(stored.name, "a");
    }

    #[test]
    fn test_insert_all_shares_rows_by_url() {
        let conn = conn();
        let mut photos = vec![
            Photo::new("a", "https://img/a.png"),
            Photo::new("b", "https://img/b.png"),
            Photo::new("a again", "https://img/a.png"),
        ];
        Photo::insert_all(&conn, &mut photos).unwrap();

        assert_eq!(photos[0].id, photos[2].id);
        assert_ne!(photos[0].id, photos[1].id);
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_plain_insert_rejects_duplicate_url() {
        let conn = conn();
        Photo::new("a", "https://img/a.png").insert(&conn).unwrap();
        assert!(Photo::new("b", "https://img/a.png").insert(&conn).is_err());
    }
}
