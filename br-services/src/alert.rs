//! Alert repository: broadcast fan-out and per-recipient notification state.
//!
//! A broadcast stores one ALERT template and, in the same transaction, one
//! recipient copy per user existing at that moment. Copies are then mutated
//! per recipient; bulk operations only touch rows not already in the target
//! state, so repeating them is a no-op.

use tracing::{debug, info};

use br_core::error::{BrError, BrResult};
use br_models::queries::{self, AlertSummary};
use br_models::{now_millis, Database, LiveQuery, Message, MessageKind, RecipientCopy, Table, User};

use crate::event_bus::{AppEvent, EventBus};
use crate::service::{impl_service, ServiceState};

/// Result of a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReceipt {
    pub template_id: i64,
    pub recipients: usize,
}

#[derive(Clone)]
pub struct AlertRepository {
    state: ServiceState,
    database: Database,
    event_bus: EventBus,
}

fn validate_alert(title: &str, body: &str) -> BrResult<()> {
    if title.trim().is_empty() {
        return Err(BrError::validation("title", "title is required"));
    }
    if body.trim().is_empty() {
        return Err(BrError::validation("body", "message is required"));
    }
    Ok(())
}

impl AlertRepository {
    pub fn new(database: Database, event_bus: EventBus) -> Self {
        Self {
            state: ServiceState::Created,
            database,
            event_bus,
        }
    }

    /// Store an alert template and fan it out to every current user.
    ///
    /// Users created afterwards never receive a copy of this template.
    pub fn broadcast_alert(&self, sender_id: i64, title: &str, body: &str) -> BrResult<BroadcastReceipt> {
        validate_alert(title, body)?;
        let (title, body) = (title.trim(), body.trim());

        let receipt = self.database.write(|conn| {
            if User::find_by_id(conn, sender_id)?.is_none() {
                return Err(BrError::not_found("user", sender_id));
            }
            let created_at = now_millis();
            let template_id = Message::alert(title, body, sender_id, created_at).insert(conn)?;
            let recipients = RecipientCopy::fan_out(conn, template_id, title, body, created_at)?;
            Ok(BroadcastReceipt { template_id, recipients })
        })?;

        info!("alert {} broadcast to {} user(s)", receipt.template_id, receipt.recipients);
        self.event_bus.emit(AppEvent::AlertBroadcast {
            template_id: receipt.template_id,
            recipients: receipt.recipients,
        });
        Ok(receipt)
    }

    /// Deliver an ad-hoc notice to one user, with no template behind it.
    pub fn notify_user(&self, recipient_id: i64, title: &str, body: &str) -> BrResult<RecipientCopy> {
        validate_alert(title, body)?;
        self.database.write(|conn| {
            if User::find_by_id(conn, recipient_id)?.is_none() {
                return Err(BrError::not_found("user", recipient_id));
            }
            let mut copy = RecipientCopy::notice(recipient_id, title.trim(), body.trim(), now_millis());
            copy.insert(conn)?;
            debug!("notice {:?} delivered to user {recipient_id}", copy.id);
            Ok(copy)
        })
    }

    /// Mark one of `user_id`'s notifications read. Copies of other users
    /// are reported as not found.
    pub fn mark_read(&self, user_id: i64, copy_id: i64) -> BrResult<()> {
        let found = self
            .database
            .write(|conn| RecipientCopy::mark_read(conn, user_id, copy_id))?;
        if !found {
            return Err(BrError::not_found("notification", copy_id));
        }
        Ok(())
    }

    pub fn mark_deleted(&self, user_id: i64, copy_id: i64) -> BrResult<()> {
        let found = self
            .database
            .write(|conn| RecipientCopy::mark_deleted(conn, user_id, copy_id))?;
        if !found {
            return Err(BrError::not_found("notification", copy_id));
        }
        Ok(())
    }

    /// Mark every visible notification of a user read. Returns how many changed.
    pub fn mark_all_read(&self, user_id: i64) -> BrResult<usize> {
        let changed = self.database.write(|conn| RecipientCopy::mark_all_read_for(conn, user_id))?;
        debug!("marked {changed} notification(s) read for user {user_id}");
        Ok(changed)
    }

    /// Soft-delete every notification of a user. Returns how many changed.
    pub fn mark_all_deleted(&self, user_id: i64) -> BrResult<usize> {
        let changed = self.database.write(|conn| RecipientCopy::mark_all_deleted_for(conn, user_id))?;
        debug!("deleted {changed} notification(s) for user {user_id}");
        Ok(changed)
    }

    fn require_template(&self, template_id: i64) -> BrResult<Message> {
        match self.database.read(|conn| Message::find_by_id(conn, template_id))? {
            Some(message) if message.kind == MessageKind::Alert => Ok(message),
            _ => Err(BrError::not_found("alert", template_id)),
        }
    }

    /// Withdraw a broadcast: soft-delete every recipient copy, then flag the
    /// template. Two separate writes; read flags on the copies are kept.
    pub fn withdraw_alert(&self, template_id: i64) -> BrResult<usize> {
        self.require_template(template_id)?;

        let copies = self
            .database
            .write(|conn| RecipientCopy::mark_deleted_by_template(conn, template_id))?;
        self.database.write(|conn| Message::set_withdrawn(conn, template_id))?;

        info!("alert {template_id} withdrawn from {copies} recipient(s)");
        self.event_bus.emit(AppEvent::AlertWithdrawn { template_id, copies });
        Ok(copies)
    }

    /// Mark every recipient copy of a template read. The template is untouched.
    pub fn mark_template_read(&self, template_id: i64) -> BrResult<usize> {
        self.require_template(template_id)?;
        self.database
            .write(|conn| RecipientCopy::mark_read_by_template(conn, template_id))
    }

    pub fn notifications(&self, user_id: i64) -> BrResult<Vec<RecipientCopy>> {
        self.database.read(|conn| queries::notifications_for_user(conn, user_id))
    }

    pub fn templates(&self) -> BrResult<Vec<AlertSummary>> {
        self.database.read(queries::alert_templates)
    }

    // ─── Live queries ────────────────────────────────────────────────────

    pub fn observe_notifications(&self, user_id: i64) -> LiveQuery<Vec<RecipientCopy>> {
        self.database
            .watch(&[Table::RecipientCopies], move |conn| queries::notifications_for_user(conn, user_id))
    }

    pub fn observe_unread_count(&self, user_id: i64) -> LiveQuery<i64> {
        self.database
            .watch(&[Table::RecipientCopies], move |conn| queries::unread_notification_count(conn, user_id))
    }

    pub fn observe_templates(&self) -> LiveQuery<Vec<AlertSummary>> {
        self.database
            .watch(&[Table::Messages, Table::RecipientCopies], queries::alert_templates)
    }
}

impl_service!(AlertRepository, "alert");
