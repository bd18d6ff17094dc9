//! Joined and filtered queries backing live views.
//!
//! Every function takes a plain `&Connection` so it can run inside
//! `Database::read`, `Database::write` or as the body of a live query.

use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use br_core::error::{BrError, BrResult};

use crate::models::conversation::Conversation;
use crate::models::incident::{Incident, IncidentState};
use crate::models::message::Message;
use crate::models::recipient_copy::RecipientCopy;

fn collect<T>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> BrResult<Vec<T>> {
    let mut stmt = conn.prepare(sql).map_err(|e| BrError::Database(e.to_string()))?;
    let rows = stmt
        .query_map(params, map)
        .map_err(|e| BrError::Database(e.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| BrError::Database(e.to_string()))
}

// ─── Profile ────────────────────────────────────────────────────────────────

/// User joined with role and photo, flattened for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub run: String,
    pub dv: String,
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub rol_id: i64,
    pub role_name: String,
    pub foto_id: i64,
    pub photo_name: String,
    pub photo_url: String,
}

impl UserProfile {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get("id")?,
            run: row.get("run")?,
            dv: row.get("dv")?,
            username: row.get("username")?,
            name: row.get("name")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            rol_id: row.get("rol_id")?,
            role_name: row.get("role_name")?,
            foto_id: row.get("foto_id")?,
            photo_name: row.get("photo_name")?,
            photo_url: row.get("photo_url")?,
        })
    }
}

pub fn user_profile(conn: &Connection, user_id: i64) -> BrResult<Option<UserProfile>> {
    let result = conn.query_row(
        "SELECT u.id, u.run, u.dv, u.username, u.name, u.email, u.phone, u.rol_id, u.foto_id,
                r.name AS role_name, p.name AS photo_name, p.url AS photo_url
         FROM users u
         JOIN roles r ON r.id = u.rol_id
         JOIN photos p ON p.id = u.foto_id
         WHERE u.id = ?1",
        [user_id],
        UserProfile::from_row,
    );
    match result {
        Ok(p) => Ok(Some(p)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(BrError::Database(e.to_string())),
    }
}

// ─── Incidents ──────────────────────────────────────────────────────────────

/// Optional constraints for incident listings. The default matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncidentFilter {
    pub state: Option<IncidentState>,
    pub assigned_to: Option<i64>,
    pub reported_by: Option<i64>,
}

impl IncidentFilter {
    pub fn by_state(state: IncidentState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn assigned_to(user_id: i64) -> Self {
        Self {
            assigned_to: Some(user_id),
            ..Default::default()
        }
    }
}

/// Incident with its photo URL and the names of the people involved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentWithDetails {
    pub incident: Incident,
    pub photo_url: Option<String>,
    pub assignee_name: Option<String>,
    pub reporter_name: Option<String>,
}

impl IncidentWithDetails {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            incident: Incident::from_row(row)?,
            photo_url: row.get("photo_url")?,
            assignee_name: row.get("assignee_name")?,
            reporter_name: row.get("reporter_name")?,
        })
    }
}

const INCIDENT_DETAILS_SELECT: &str =
    "SELECT i.*, p.url AS photo_url, ua.name AS assignee_name, ur.name AS reporter_name
     FROM incidents i
     LEFT JOIN photos p ON p.id = i.foto_id
     LEFT JOIN users ua ON ua.id = i.assigned_to
     LEFT JOIN users ur ON ur.id = i.reported_by";

/// Incidents matching `filter`, newest first.
pub fn incidents_with_details(conn: &Connection, filter: &IncidentFilter) -> BrResult<Vec<IncidentWithDetails>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(state) = filter.state {
        clauses.push("i.state = ?");
        values.push(Box::new(state));
    }
    if let Some(user) = filter.assigned_to {
        clauses.push("i.assigned_to = ?");
        values.push(Box::new(user));
    }
    if let Some(user) = filter.reported_by {
        clauses.push("i.reported_by = ?");
        values.push(Box::new(user));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!("{INCIDENT_DETAILS_SELECT} {where_clause} ORDER BY i.created_at DESC, i.id DESC");

    let param_refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    collect(conn, &sql, &param_refs, IncidentWithDetails::from_row)
}

pub fn incident_with_details(conn: &Connection, id: i64) -> BrResult<Option<IncidentWithDetails>> {
    let sql = format!("{INCIDENT_DETAILS_SELECT} WHERE i.id = ?1");
    match conn.query_row(&sql, [id], IncidentWithDetails::from_row) {
        Ok(i) => Ok(Some(i)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(BrError::Database(e.to_string())),
    }
}

/// Incident counts per state, in lifecycle order.
pub fn incident_counts(conn: &Connection) -> BrResult<Vec<(IncidentState, i64)>> {
    [IncidentState::Created, IncidentState::Assigned, IncidentState::Closed]
        .into_iter()
        .map(|state| -> BrResult<(IncidentState, i64)> {
            Ok((state, Incident::count_by_state(conn, state)?))
        })
        .collect()
}

// ─── Notifications ──────────────────────────────────────────────────────────

/// Visible (not deleted) notifications of a user, newest first.
pub fn notifications_for_user(conn: &Connection, user_id: i64) -> BrResult<Vec<RecipientCopy>> {
    collect(
        conn,
        "SELECT * FROM recipient_copies
         WHERE recipient_id = ?1 AND deleted = 0
         ORDER BY created_at DESC, id DESC",
        &[&user_id],
        RecipientCopy::from_row,
    )
}

pub fn unread_notification_count(conn: &Connection, user_id: i64) -> BrResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM recipient_copies WHERE recipient_id = ?1 AND read = 0 AND deleted = 0",
        [user_id],
        |row| row.get(0),
    )
    .map_err(|e| BrError::Database(e.to_string()))
}

/// Alert template with delivery statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub template: Message,
    pub recipients: i64,
    pub read_count: i64,
}

impl AlertSummary {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            template: Message::from_row(row)?,
            recipients: row.get("recipients")?,
            read_count: row.get("read_count")?,
        })
    }
}

/// All alert templates, newest first.
pub fn alert_templates(conn: &Connection) -> BrResult<Vec<AlertSummary>> {
    collect(
        conn,
        "SELECT m.*,
            (SELECT COUNT(*) FROM recipient_copies rc WHERE rc.template_id = m.id) AS recipients,
            (SELECT COUNT(*) FROM recipient_copies rc WHERE rc.template_id = m.id AND rc.read = 1) AS read_count
         FROM messages m
         WHERE m.kind = 'ALERT'
         ORDER BY m.created_at DESC, m.id DESC",
        &[],
        AlertSummary::from_row,
    )
}

// ─── Chat ───────────────────────────────────────────────────────────────────

/// Chat message with its sender's display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message: Message,
    pub sender_username: String,
    pub sender_name: String,
}

impl ChatMessage {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            message: Message::from_row(row)?,
            sender_username: row.get("sender_username")?,
            sender_name: row.get("sender_name")?,
        })
    }
}

/// Messages of a conversation in delivery order. Timestamps can collide,
/// so the row id breaks ties.
pub fn messages_for_conversation(conn: &Connection, conversation_id: i64) -> BrResult<Vec<ChatMessage>> {
    collect(
        conn,
        "SELECT m.*, u.username AS sender_username, u.name AS sender_name
         FROM messages m
         JOIN users u ON u.id = m.sender_id
         WHERE m.conversation_id = ?1 AND m.kind = 'CHAT'
         ORDER BY m.created_at ASC, m.id ASC",
        &[&conversation_id],
        ChatMessage::from_row,
    )
}

/// Conversation list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub participant_count: i64,
    pub last_message: Option<String>,
    pub last_message_at: Option<i64>,
    pub unread_count: i64,
}

impl ConversationSummary {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            conversation: Conversation::from_row(row)?,
            participant_count: row.get("participant_count")?,
            last_message: row.get("last_message")?,
            last_message_at: row.get("last_message_at")?,
            unread_count: row.get("unread_count")?,
        })
    }
}

/// Conversations `user_id` participates in, most recently active first.
pub fn conversations_for_user(conn: &Connection, user_id: i64) -> BrResult<Vec<ConversationSummary>> {
    collect(
        conn,
        "SELECT c.*,
            (SELECT COUNT(*) FROM conversation_participants p2 WHERE p2.conversation_id = c.id) AS participant_count,
            lm.body AS last_message,
            lm.created_at AS last_message_at,
            (SELECT COUNT(*) FROM messages m2
               WHERE m2.conversation_id = c.id AND m2.read = 0 AND m2.sender_id <> ?1) AS unread_count
         FROM conversations c
         JOIN conversation_participants p ON p.conversation_id = c.id AND p.user_id = ?1
         LEFT JOIN messages lm ON lm.id = (
            SELECT m.id FROM messages m WHERE m.conversation_id = c.id
            ORDER BY m.created_at DESC, m.id DESC LIMIT 1
         )
         ORDER BY COALESCE(lm.created_at, c.created_at) DESC, c.id DESC",
        &[&user_id],
        ConversationSummary::from_row,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::conversation::{ConversationKind, Participant};
    use crate::models::incident::IncidentDetails;
    use crate::models::user::tests::{insert_user, seeded_conn};

    fn incident(conn: &Connection, title: &str, created_at: i64, reporter: Option<i64>) -> i64 {
        let details = IncidentDetails {
            title: title.into(),
            detail: "detail text long enough".into(),
            ..Default::default()
        };
        Incident::new(details, reporter, created_at).insert(conn).unwrap()
    }

    #[test]
    fn test_user_profile_joins_role_and_photo() {
        let conn = seeded_conn();
        let id = insert_user(&conn, "alice", "alice@x.cl");
        let profile = user_profile(&conn, id).unwrap().unwrap();
        assert_eq!(profile.role_name, "Citizen");
        assert_eq!(profile.photo_url, "https://img/alice.png");
        assert!(user_profile(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn test_incident_filters() {
        let conn = seeded_conn();
        let reporter = insert_user(&conn, "vecino", "v@x.cl");
        let firefighter = insert_user(&conn, "bombero", "b@x.cl");
        let first = incident(&conn, "First incident", 1, Some(reporter));
        let second = incident(&conn, "Second incident", 2, None);
        Incident::try_assign(&conn, first, firefighter).unwrap();

        let all = incidents_with_details(&conn, &IncidentFilter::default()).unwrap();
        assert_eq!(all.iter().map(|i| i.incident.id).collect::<Vec<_>>(), vec![Some(second), Some(first)]);

        let assigned = incidents_with_details(&conn, &IncidentFilter::assigned_to(firefighter)).unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].assignee_name.as_deref(), Some("Test User"));
        assert_eq!(assigned[0].reporter_name.as_deref(), Some("Test User"));

        let created = incidents_with_details(&conn, &IncidentFilter::by_state(IncidentState::Created)).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].incident.id, Some(second));

        let counts = incident_counts(&conn).unwrap();
        assert_eq!(counts, vec![(IncidentState::Created, 1), (IncidentState::Assigned, 1), (IncidentState::Closed, 0)]);
    }

    #[test]
    fn test_notifications_hide_deleted() {
        let conn = seeded_conn();
        let user = insert_user(&conn, "alice", "alice@x.cl");
        let keep = RecipientCopy::notice(user, "keep", "b", 1).insert(&conn).unwrap();
        let gone = RecipientCopy::notice(user, "gone", "b", 2).insert(&conn).unwrap();
        RecipientCopy::mark_deleted(&conn, user, gone).unwrap();

        let visible = notifications_for_user(&conn, user).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, Some(keep));
        assert_eq!(unread_notification_count(&conn, user).unwrap(), 1);
    }

    #[test]
    fn test_chat_order_breaks_timestamp_ties_by_id() {
        let conn = seeded_conn();
        let a = insert_user(&conn, "alice", "alice@x.cl");
        let b = insert_user(&conn, "bob", "bob@x.cl");
        let conv = Conversation::new("a-b", ConversationKind::Individual, 1).insert(&conn).unwrap();
        Participant::upsert(&conn, conv, a, 1).unwrap();
        Participant::upsert(&conn, conv, b, 1).unwrap();

        let first = Message::chat(conv, a, "hola", true, 100).insert(&conn).unwrap();
        let second = Message::chat(conv, b, "hola!", false, 100).insert(&conn).unwrap();
        let earlier = Message::chat(conv, a, "antes", true, 50).insert(&conn).unwrap();

        let ids: Vec<_> = messages_for_conversation(&conn, conv)
            .unwrap()
            .into_iter()
            .map(|m| m.message.id.unwrap())
            .collect();
        assert_eq!(ids, vec![earlier, first, second]);

        let summaries = conversations_for_user(&conn, a).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].unread_count, 1);
        assert_eq!(summaries[0].last_message.as_deref(), Some("hola!"));
    }
}
