//! Incident entity model and its state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, Row};
use br_core::error::{BrError, BrResult};

/// Incident lifecycle: `Created -> Assigned -> Closed`. Closed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentState {
    Created,
    Assigned,
    Closed,
}

impl IncidentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentState::Created => "CREATED",
            IncidentState::Assigned => "ASSIGNED",
            IncidentState::Closed => "CLOSED",
        }
    }

    /// The only state this one may move to.
    pub fn next(&self) -> Option<IncidentState> {
        match self {
            IncidentState::Created => Some(IncidentState::Assigned),
            IncidentState::Assigned => Some(IncidentState::Closed),
            IncidentState::Closed => None,
        }
    }

    pub fn can_transition_to(&self, to: IncidentState) -> bool {
        self.next() == Some(to)
    }
}

impl fmt::Display for IncidentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentState {
    type Err = BrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATED" => Ok(IncidentState::Created),
            // Older rows and some clients call the assigned state TAKEN.
            "ASSIGNED" | "TAKEN" => Ok(IncidentState::Assigned),
            "CLOSED" => Ok(IncidentState::Closed),
            other => Err(BrError::validation("state", format!("unknown incident state {other}"))),
        }
    }
}

impl ToSql for IncidentState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for IncidentState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse().map_err(|e: BrError| FromSqlError::Other(Box::new(e)))
    }
}

/// Editable incident content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentDetails {
    pub title: String,
    pub detail: String,
    pub foto_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub comuna: Option<String>,
    pub region: Option<String>,
    pub address: Option<String>,
}

/// A user-reported incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: Option<i64>,
    pub title: String,
    pub created_at: i64,
    pub detail: String,
    pub foto_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub comuna: Option<String>,
    pub region: Option<String>,
    pub address: Option<String>,
    pub state: IncidentState,
    pub assigned_to: Option<i64>,
    pub reported_by: Option<i64>,
}

impl Incident {
    /// A fresh incident in the `Created` state.
    pub fn new(details: IncidentDetails, reported_by: Option<i64>, created_at: i64) -> Self {
        Self {
            id: None,
            title: details.title,
            created_at,
            detail: details.detail,
            foto_id: details.foto_id,
            latitude: details.latitude,
            longitude: details.longitude,
            comuna: details.comuna,
            region: details.region,
            address: details.address,
            state: IncidentState::Created,
            assigned_to: None,
            reported_by,
        }
    }

    /// Construct an Incident from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            created_at: row.get("created_at")?,
            detail: row.get("detail")?,
            foto_id: row.get("foto_id")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
            comuna: row.get("comuna")?,
            region: row.get("region")?,
            address: row.get("address")?,
            state: row.get("state")?,
            assigned_to: row.get("assigned_to")?,
            reported_by: row.get("reported_by")?,
        })
    }

    pub fn details(&self) -> IncidentDetails {
        IncidentDetails {
            title: self.title.clone(),
            detail: self.detail.clone(),
            foto_id: self.foto_id,
            latitude: self.latitude,
            longitude: self.longitude,
            comuna: self.comuna.clone(),
            region: self.region.clone(),
            address: self.address.clone(),
        }
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> BrResult<Option<Self>> {
        match conn.query_row("SELECT * FROM incidents WHERE id = ?1", [id], Self::from_row) {
            Ok(i) => Ok(Some(i)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(BrError::Database(e.to_string())),
        }
    }

    pub fn count_by_state(conn: &Connection, state: IncidentState) -> BrResult<i64> {
        conn.query_row("SELECT COUNT(*) FROM incidents WHERE state = ?1", [state], |row| row.get(0))
            .map_err(|e| BrError::Database(e.to_string()))
    }

    /// Insert a new incident (ABORT on conflict).
    pub fn insert(&mut self, conn: &Connection) -> BrResult<i64> {
        conn.execute(
            "INSERT INTO incidents (title, created_at, detail, foto_id, latitude, longitude,
                                    comuna, region, address, state, assigned_to, reported_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                self.title,
                self.created_at,
                self.detail,
                self.foto_id,
                self.latitude,
                self.longitude,
                self.comuna,
                self.region,
                self.address,
                self.state,
                self.assigned_to,
                self.reported_by,
            ],
        )
        .map_err(|e| BrError::Database(e.to_string()))?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Overwrite the editable content of an incident that is not closed.
    /// Returns the number of rows changed (0 when missing or closed).
    pub fn update_details(conn: &Connection, id: i64, details: &IncidentDetails) -> BrResult<usize> {
        conn.execute(
            "UPDATE incidents SET title = ?1, detail = ?2, foto_id = ?3, latitude = ?4,
                    longitude = ?5, comuna = ?6, region = ?7, address = ?8
             WHERE id = ?9 AND state <> 'CLOSED'",
            params![
                details.title,
                details.detail,
                details.foto_id,
                details.latitude,
                details.longitude,
                details.comuna,
                details.region,
                details.address,
                id,
            ],
        )
        .map_err(|e| BrError::Database(e.to_string()))
    }

    /// Conditionally move a `Created`, unassigned incident to `Assigned`.
    ///
    /// The guard lives in the WHERE clause so concurrent callers cannot both
    /// succeed. Returns the number of rows changed.
    pub fn try_assign(conn: &Connection, id: i64, user_id: i64) -> BrResult<usize> {
        conn.execute(
            "UPDATE incidents SET state = 'ASSIGNED', assigned_to = ?1
             WHERE id = ?2 AND state = 'CREATED' AND assigned_to IS NULL",
            params![user_id, id],
        )
        .map_err(|e| BrError::Database(e.to_string()))
    }

    /// Conditionally move an `Assigned` incident to `Closed`.
    pub fn try_close(conn: &Connection, id: i64) -> BrResult<usize> {
        conn.execute(
            "UPDATE incidents SET state = 'CLOSED' WHERE id = ?1 AND state = 'ASSIGNED'",
            [id],
        )
        .map_err(|e| BrError::Database(e.to_string()))
    }

    pub fn delete(conn: &Connection, id: i64) -> BrResult<bool> {
        let changed = conn
            .execute("DELETE FROM incidents WHERE id = ?1", [id])
            .map_err(|e| BrError::Database(e.to_string()))?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::tests::{insert_user, seeded_conn};

    fn details(title: &str) -> IncidentDetails {
        IncidentDetails {
            title: title.into(),
            detail: "smoke seen near the hill".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_state_parsing() {
        assert_eq!("created".parse::<IncidentState>().unwrap(), IncidentState::Created);
        assert_eq!("TAKEN".parse::<IncidentState>().unwrap(), IncidentState::Assigned);
        assert!("open".parse::<IncidentState>().is_err());
        assert!(IncidentState::Created.can_transition_to(IncidentState::Assigned));
        assert!(!IncidentState::Created.can_transition_to(IncidentState::Closed));
        assert!(!IncidentState::Closed.can_transition_to(IncidentState::Created));
    }

    #[test]
    fn test_assign_then_close() {
        let conn = seeded_conn();
        let user = insert_user(&conn, "bombero", "b@b.cl");
        let id = Incident::new(details("Fire on the hill"), None, 1).insert(&conn).unwrap();

        assert_eq!(Incident::try_close(&conn, id).unwrap(), 0);
        assert_eq!(Incident::try_assign(&conn, id, user).unwrap(), 1);
        assert_eq!(Incident::try_assign(&conn, id, user).unwrap(), 0);
        assert_eq!(Incident::try_close(&conn, id).unwrap(), 1);

        let incident = Incident::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(incident.state, IncidentState::Closed);
        assert_eq!(incident.assigned_to, Some(user));
        assert_eq!(Incident::count_by_state(&conn, IncidentState::Closed).unwrap(), 1);
    }

    #[test]
    fn test_closed_incident_is_not_editable() {
        let conn = seeded_conn();
        let user = insert_user(&conn, "bombero", "b@b.cl");
        let id = Incident::new(details("Fire on the hill"), None, 1).insert(&conn).unwrap();
        Incident::try_assign(&conn, id, user).unwrap();
        Incident::try_close(&conn, id).unwrap();

        assert_eq!(Incident::update_details(&conn, id, &details("Another title")).unwrap(), 0);
    }

    #[test]
    fn test_reporter_deletion_cascades() {
        let conn = seeded_conn();
        let user = insert_user(&conn, "vecino", "v@v.cl");
        let id = Incident::new(details("Fire on the hill"), Some(user), 1).insert(&conn).unwrap();
        crate::models::user::User::delete(&conn, user).unwrap();
        assert!(Incident::find_by_id(&conn, id).unwrap().is_none());
    }
}
