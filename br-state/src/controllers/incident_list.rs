//! Incident list: live listing, optimistic take and pessimistic close.
//!
//! A take is shown as assigned to the caller before the store confirms it.
//! If another user won the race the row is restored from the store and a
//! message explains why. A close only shows up once the store committed it.
//! An optional "since" date narrows the rows shown without touching the
//! live query.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use br_core::error::{BrResult, ErrorKind};
use br_models::queries::{IncidentFilter, IncidentWithDetails};
use br_models::IncidentState;
use br_services::validation;
use br_services::{IncidentRepository, Session, TakeOutcome};

use super::{blocking, failure_text, follow};
use crate::scope::TaskScope;
use crate::state::StateHolder;

#[derive(Debug, Clone, PartialEq)]
pub struct IncidentListState {
    pub loading: bool,
    pub incidents: Vec<IncidentWithDetails>,
    /// Takes sent but not yet confirmed: incident id to taker.
    pub pending_takes: BTreeMap<i64, i64>,
    /// Closes sent but not yet confirmed.
    pub closing: BTreeSet<i64>,
    /// `YYYY-MM-DD` lower bound on the creation date, as typed.
    pub since: String,
    pub since_error: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl Default for IncidentListState {
    fn default() -> Self {
        Self {
            loading: true,
            incidents: Vec::new(),
            pending_takes: BTreeMap::new(),
            closing: BTreeSet::new(),
            since: String::new(),
            since_error: None,
            message: None,
            error: None,
        }
    }
}

impl IncidentListState {
    pub fn get(&self, id: i64) -> Option<&IncidentWithDetails> {
        self.incidents.iter().find(|row| row.incident.id == Some(id))
    }

    /// Rows created on or after the `since` date. Everything while the
    /// date is empty or invalid.
    pub fn visible(&self) -> Vec<&IncidentWithDetails> {
        let from = if self.since_error.is_none() {
            validation::date_start_millis(&self.since)
        } else {
            None
        };
        self.incidents
            .iter()
            .filter(|row| from.map_or(true, |from| row.incident.created_at >= from))
            .collect()
    }

    /// Show pending takes as already assigned.
    fn overlay_pending(&mut self) {
        for row in &mut self.incidents {
            let Some(id) = row.incident.id else { continue };
            if let Some(user_id) = self.pending_takes.get(&id) {
                if row.incident.state == IncidentState::Created {
                    row.incident.state = IncidentState::Assigned;
                    row.incident.assigned_to = Some(*user_id);
                }
            }
        }
    }

    /// Settle a finished take with the row reloaded from the store.
    ///
    /// A row that no longer exists is dropped. A failed reload keeps the
    /// row as shown and reports the failure; the live query corrects it on
    /// the next change.
    fn settle_take(&mut self, id: i64, reloaded: BrResult<IncidentWithDetails>) {
        self.pending_takes.remove(&id);
        match reloaded {
            Ok(fresh) => {
                if let Some(row) = self.incidents.iter_mut().find(|row| row.incident.id == Some(id)) {
                    *row = fresh;
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.incidents.retain(|row| row.incident.id != Some(id));
            }
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(failure_text("reload incident", &e));
                }
            }
        }
    }
}

pub struct IncidentListController {
    incidents: IncidentRepository,
    session: Session,
    state: StateHolder<IncidentListState>,
    scope: TaskScope,
}

impl IncidentListController {
    pub fn new(incidents: IncidentRepository, session: Session, filter: IncidentFilter) -> Self {
        let controller = Self {
            state: StateHolder::new(IncidentListState::default()),
            scope: TaskScope::new(),
            incidents,
            session,
        };

        follow(
            &controller.scope,
            controller.incidents.observe(filter),
            controller.state.clone(),
            |s, result| {
                s.loading = false;
                match result {
                    Ok(rows) => {
                        s.incidents = rows;
                        s.overlay_pending();
                    }
                    Err(e) => s.error = Some(e.to_string()),
                }
            },
        );
        controller
    }

    /// Every incident, newest first.
    pub fn all(incidents: IncidentRepository, session: Session) -> Self {
        Self::new(incidents, session, IncidentFilter::default())
    }

    /// Incidents assigned to the logged-in user.
    pub fn mine(incidents: IncidentRepository, session: Session) -> BrResult<Self> {
        let user_id = session.require()?.user_id;
        Ok(Self::new(incidents, session, IncidentFilter::assigned_to(user_id)))
    }

    pub fn state(&self) -> &StateHolder<IncidentListState> {
        &self.state
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<IncidentListState> {
        self.state.subscribe()
    }

    /// Only show incidents created on or after `value` (`YYYY-MM-DD`).
    /// An empty value shows everything.
    pub fn set_since(&self, value: &str) {
        self.state.update(|s| {
            s.since = value.to_string();
            s.since_error = if value.trim().is_empty() {
                None
            } else {
                validation::date(value).err()
            };
        });
    }

    /// Take an incident for the logged-in user.
    pub fn take(&self, id: i64) {
        let user_id = match self.session.require() {
            Ok(user) => user.user_id,
            Err(e) => {
                let text = failure_text("take", &e);
                self.state.update(|s| s.error = Some(text));
                return;
            }
        };
        self.submit_take(id, user_id);
    }

    /// Assign an incident to another user. Administrators only.
    pub fn assign(&self, id: i64, assignee: i64) {
        match self.session.require() {
            Ok(user) if user.is_admin() => self.submit_take(id, assignee),
            Ok(_) => self
                .state
                .update(|s| s.error = Some("only administrators can assign incidents".into())),
            Err(e) => {
                let text = failure_text("assign", &e);
                self.state.update(|s| s.error = Some(text));
            }
        }
    }

    fn submit_take(&self, id: i64, user_id: i64) {
        let mut accepted = false;
        self.state.update(|s| {
            let takeable = s.get(id).is_some_and(|row| row.incident.state == IncidentState::Created);
            if takeable && !s.pending_takes.contains_key(&id) {
                s.pending_takes.insert(id, user_id);
                s.overlay_pending();
                s.error = None;
                accepted = true;
            }
        });
        if !accepted {
            return;
        }

        let incidents = self.incidents.clone();
        let state = self.state.clone();
        self.scope.spawn(async move {
            let repo = incidents.clone();
            let outcome = blocking(move || repo.take_incident(id, user_id)).await;

            let (message, error) = match &outcome {
                Ok(TakeOutcome::Taken(_)) => (Some("incident taken".to_string()), None),
                Ok(TakeOutcome::AlreadyTaken { assigned_to }) => {
                    info!("take of incident {id} lost to user {assigned_to}");
                    (Some("this incident was already taken".to_string()), None)
                }
                Err(e) => (None, Some(failure_text("take", e))),
            };

            // Reload the row so a lost or failed take is rolled back.
            let reloaded = blocking(move || incidents.find(id)).await;
            state.update(|s| {
                s.message = message;
                s.error = error;
                s.settle_take(id, reloaded);
            });
        });
    }

    /// Close an assigned incident. The row changes only after the store confirms.
    pub fn close(&self, id: i64) {
        let mut accepted = false;
        self.state.update(|s| {
            accepted = s.closing.insert(id);
            s.error = None;
        });
        if !accepted {
            return;
        }

        let incidents = self.incidents.clone();
        let state = self.state.clone();
        self.scope.spawn(async move {
            let result = blocking(move || incidents.close_incident(id)).await;
            state.update(|s| {
                s.closing.remove(&id);
                match result {
                    Ok(closed) => {
                        if let Some(row) = s.incidents.iter_mut().find(|row| row.incident.id == Some(id)) {
                            row.incident = closed;
                        }
                        s.message = Some("incident closed".into());
                    }
                    Err(e) => s.error = Some(failure_text("close", &e)),
                }
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
