//! Notification inbox and, for administrators, the broadcast form.
//!
//! Intents act for the user logged in when the controller was built. Once
//! that user logs out the inbox is emptied and every intent is refused.

use std::sync::Arc;

use br_core::error::BrResult;
use br_models::queries::AlertSummary;
use br_models::RecipientCopy;
use br_services::{AlertRepository, Session, SessionUser};

use super::{blocking, failure_text, follow, set_field_error, FieldErrors, SessionBinding, SIGNED_OUT};
use crate::events::EventChannel;
use crate::scope::TaskScope;
use crate::state::StateHolder;

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationsState {
    pub loading: bool,
    pub notifications: Vec<RecipientCopy>,
    pub unread: i64,
    pub is_admin: bool,
    /// Sent alerts with delivery counts. Administrators only.
    pub templates: Vec<AlertSummary>,
    pub draft_title: String,
    pub draft_body: String,
    pub errors: FieldErrors,
    pub can_broadcast: bool,
    pub submitting: bool,
    /// The owning user logged out; nothing more will load.
    pub signed_out: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl NotificationsState {
    fn new(is_admin: bool) -> Self {
        Self {
            loading: true,
            notifications: Vec::new(),
            unread: 0,
            is_admin,
            templates: Vec::new(),
            draft_title: String::new(),
            draft_body: String::new(),
            errors: FieldErrors::new(),
            can_broadcast: false,
            submitting: false,
            signed_out: false,
            message: None,
            error: None,
        }
    }

    fn close(&mut self) {
        *self = Self::new(false);
        self.loading = false;
        self.signed_out = true;
    }

    fn revalidate(&mut self) {
        let required = |value: &str, text: &str| {
            if value.trim().is_empty() {
                Err(text.to_string())
            } else {
                Ok(())
            }
        };
        set_field_error(&mut self.errors, "title", required(&self.draft_title, "title is required"));
        set_field_error(&mut self.errors, "body", required(&self.draft_body, "message is required"));
        self.can_broadcast = self.is_admin && self.errors.is_empty();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationsEvent {
    /// A broadcast went out; go back to the inbox.
    AlertSent { template_id: i64, recipients: usize },
}

pub struct NotificationsController {
    binding: SessionBinding,
    alerts: AlertRepository,
    state: StateHolder<NotificationsState>,
    events: EventChannel<NotificationsEvent>,
    scope: Arc<TaskScope>,
}

impl NotificationsController {
    pub fn new(alerts: AlertRepository, session: &Session) -> BrResult<Self> {
        let is_admin = session.require()?.is_admin();
        let controller = Self {
            binding: SessionBinding::new(session)?,
            state: StateHolder::new(NotificationsState::new(is_admin)),
            events: EventChannel::new("notifications"),
            scope: Arc::new(TaskScope::new()),
            alerts,
        };

        let user_id = controller.binding.user_id();
        follow(
            &controller.scope,
            controller.alerts.observe_notifications(user_id),
            controller.state.clone(),
            |s, result| {
                s.loading = false;
                match result {
                    Ok(rows) => s.notifications = rows,
                    Err(e) => s.error = Some(e.to_string()),
                }
            },
        );
        follow(
            &controller.scope,
            controller.alerts.observe_unread_count(user_id),
            controller.state.clone(),
            |s, result| match result {
                Ok(count) => s.unread = count,
                Err(e) => s.error = Some(e.to_string()),
            },
        );
        if is_admin {
            follow(
                &controller.scope,
                controller.alerts.observe_templates(),
                controller.state.clone(),
                |s, result| match result {
                    Ok(templates) => s.templates = templates,
                    Err(e) => s.error = Some(e.to_string()),
                },
            );
        }
        controller
            .binding
            .end_with_session(&controller.scope, controller.state.clone(), NotificationsState::close);
        Ok(controller)
    }

    pub fn state(&self) -> &StateHolder<NotificationsState> {
        &self.state
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<NotificationsState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> &EventChannel<NotificationsEvent> {
        &self.events
    }

    /// The owning user while still logged in. Otherwise the refusal lands
    /// in the error slot.
    fn active_user(&self) -> Option<SessionUser> {
        let user = self.binding.active();
        if user.is_none() {
            self.state.update(|s| s.error = Some(SIGNED_OUT.into()));
        }
        user
    }

    /// Run a write for the owning user in the scope; failures land in the
    /// error slot.
    fn run<T, F>(&self, action: &'static str, f: F)
    where
        F: FnOnce(AlertRepository, i64) -> BrResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let Some(user) = self.active_user() else {
            return;
        };
        let alerts = self.alerts.clone();
        let state = self.state.clone();
        self.scope.spawn(async move {
            if let Err(e) = blocking(move || f(alerts, user.user_id)).await {
                let text = failure_text(action, &e);
                state.update(|s| s.error = Some(text));
            }
        });
    }

    pub fn mark_read(&self, copy_id: i64) {
        self.run("mark notification read", move |alerts, user_id| alerts.mark_read(user_id, copy_id));
    }

    pub fn delete(&self, copy_id: i64) {
        self.run("delete notification", move |alerts, user_id| alerts.mark_deleted(user_id, copy_id));
    }

    pub fn mark_all_read(&self) {
        self.run("mark all read", |alerts, user_id| alerts.mark_all_read(user_id));
    }

    pub fn delete_all(&self) {
        self.run("delete all notifications", |alerts, user_id| alerts.mark_all_deleted(user_id));
    }

    pub fn set_title(&self, value: &str) {
        self.state.update(|s| {
            s.draft_title = value.to_string();
            s.revalidate();
        });
    }

    pub fn set_body(&self, value: &str) {
        self.state.update(|s| {
            s.draft_body = value.to_string();
            s.revalidate();
        });
    }

    /// The owning user if still logged in as an administrator.
    fn require_admin(&self) -> Option<SessionUser> {
        let user = self.active_user()?;
        if user.is_admin() {
            return Some(user);
        }
        self.state
            .update(|s| s.error = Some("only administrators can send alerts".into()));
        None
    }

    /// Broadcast the drafted alert to every current user.
    pub fn broadcast(&self) {
        let Some(user) = self.require_admin() else {
            return;
        };
        self.state.update(|s| s.revalidate());
        let current = self.state.snapshot();
        if !current.can_broadcast || current.submitting {
            return;
        }
        self.state.update(|s| {
            s.submitting = true;
            s.error = None;
        });

        let (alerts, sender) = (self.alerts.clone(), user.user_id);
        let state = self.state.clone();
        let events = self.events.clone();
        self.scope.spawn(async move {
            let (title, body) = (current.draft_title, current.draft_body);
            match blocking(move || alerts.broadcast_alert(sender, &title, &body)).await {
                Ok(receipt) => {
                    state.update(|s| {
                        s.submitting = false;
                        s.draft_title.clear();
                        s.draft_body.clear();
                        s.errors.clear();
                        s.can_broadcast = false;
                        s.message = Some(format!("alert sent to {} user(s)", receipt.recipients));
                    });
                    events.emit(NotificationsEvent::AlertSent {
                        template_id: receipt.template_id,
                        recipients: receipt.recipients,
                    });
                }
                Err(e) => {
                    let text = failure_text("broadcast", &e);
                    state.update(|s| {
                        s.submitting = false;
                        s.error = Some(text);
                    });
                }
            }
        });
    }

    /// Withdraw a sent alert from every inbox.
    pub fn withdraw(&self, template_id: i64) {
        if self.require_admin().is_none() {
            return;
        }
        let alerts = self.alerts.clone();
        let state = self.state.clone();
        self.scope.spawn(async move {
            let result = blocking(move || alerts.withdraw_alert(template_id)).await;
            state.update(|s| match result {
                Ok(copies) => s.message = Some(format!("alert withdrawn from {copies} inbox(es)")),
                Err(e) => s.error = Some(failure_text("withdraw", &e)),
            });
        });
    }

    pub fn clear_messages(&self) {
        self.state.update(|s| {
            s.error = None;
            s.message = None;
        });
    }
}
