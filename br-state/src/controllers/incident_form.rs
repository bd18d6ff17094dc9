//! Incident create/edit form.

use std::sync::Arc;

use br_models::IncidentState;
use br_services::validation;
use br_services::{IncidentInput, IncidentRepository, Session};

use super::{blocking, failure_text, set_field_error, FieldErrors};
use crate::events::EventChannel;
use crate::picker::{ImagePicker, PickResult};
use crate::scope::TaskScope;
use crate::state::StateHolder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentField {
    Title,
    Detail,
    Latitude,
    Longitude,
    Comuna,
    Region,
    Address,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncidentFormState {
    pub mode: FormMode,
    pub form: IncidentInput,
    pub errors: FieldErrors,
    pub can_submit: bool,
    pub loading: bool,
    pub submitting: bool,
    /// Closed incidents are shown but cannot be saved.
    pub read_only: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl IncidentFormState {
    fn new(mode: FormMode) -> Self {
        let mut state = Self {
            mode,
            form: IncidentInput::default(),
            errors: FieldErrors::new(),
            can_submit: false,
            loading: matches!(mode, FormMode::Edit(_)),
            submitting: false,
            read_only: false,
            message: None,
            error: None,
        };
        state.revalidate();
        // Nothing typed yet: keep the form quiet until the first change.
        state.errors.clear();
        state
    }

    fn revalidate(&mut self) {
        let f = &self.form;
        set_field_error(&mut self.errors, "title", validation::incident_title(&f.title));
        set_field_error(&mut self.errors, "detail", validation::incident_detail(&f.detail));
        set_field_error(&mut self.errors, "latitude", validation::coordinate(&f.latitude));
        set_field_error(&mut self.errors, "longitude", validation::coordinate(&f.longitude));
        set_field_error(&mut self.errors, "comuna", validation::incident_comuna(&f.comuna));
        set_field_error(&mut self.errors, "address", validation::incident_address(&f.address));
        self.can_submit = self.errors.is_empty() && !self.read_only && !self.loading;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IncidentFormEvent {
    /// Incident stored; leave the form.
    Saved { incident_id: i64 },
}

pub struct IncidentFormController {
    incidents: IncidentRepository,
    session: Session,
    state: StateHolder<IncidentFormState>,
    events: EventChannel<IncidentFormEvent>,
    scope: TaskScope,
}

impl IncidentFormController {
    pub fn create(incidents: IncidentRepository, session: Session) -> Self {
        Self::with_mode(incidents, session, FormMode::Create)
    }

    /// Edit an existing incident. The form fills in once it has been loaded.
    pub fn edit(incidents: IncidentRepository, session: Session, id: i64) -> Self {
        let controller = Self::with_mode(incidents, session, FormMode::Edit(id));

        let repo = controller.incidents.clone();
        let state = controller.state.clone();
        controller.scope.spawn(async move {
            let loaded = blocking(move || repo.find(id)).await;
            state.update(|s| {
                s.loading = false;
                match loaded {
                    Ok(row) => {
                        s.read_only = row.incident.state == IncidentState::Closed;
                        if s.read_only {
                            s.error = Some("closed incidents cannot be edited".into());
                        }
                        s.form = IncidentInput::from(&row.incident);
                        s.form.photo = row.photo_url;
                        s.revalidate();
                    }
                    Err(e) => s.error = Some(failure_text("load incident", &e)),
                }
            });
        });
        controller
    }

    fn with_mode(incidents: IncidentRepository, session: Session, mode: FormMode) -> Self {
        Self {
            incidents,
            session,
            state: StateHolder::new(IncidentFormState::new(mode)),
            events: EventChannel::new("incident form"),
            scope: TaskScope::new(),
        }
    }

    pub fn state(&self) -> &StateHolder<IncidentFormState> {
        &self.state
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<IncidentFormState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> &EventChannel<IncidentFormEvent> {
        &self.events
    }

    pub fn set_field(&self, field: IncidentField, value: &str) {
        self.state.update(|s| {
            let f = &mut s.form;
            let slot = match field {
                IncidentField::Title => &mut f.title,
                IncidentField::Detail => &mut f.detail,
                IncidentField::Latitude => &mut f.latitude,
                IncidentField::Longitude => &mut f.longitude,
                IncidentField::Comuna => &mut f.comuna,
                IncidentField::Region => &mut f.region,
                IncidentField::Address => &mut f.address,
            };
            *slot = value.to_string();
            s.revalidate();
        });
    }

    pub fn pick_photo(&self, picker: Arc<dyn ImagePicker>) {
        let state = self.state.clone();
        self.scope.spawn(async move {
            if let PickResult::Picked(path) = picker.pick().await {
                state.update(|s| s.form.photo = Some(path.to_string_lossy().into_owned()));
            }
        });
    }

    pub fn submit(&self) {
        self.state.update(|s| s.revalidate());
        let current = self.state.snapshot();
        if !current.can_submit || current.submitting {
            return;
        }
        self.state.update(|s| {
            s.submitting = true;
            s.error = None;
        });

        let incidents = self.incidents.clone();
        let reporter = self.session.user_id();
        let state = self.state.clone();
        let events = self.events.clone();
        self.scope.spawn(async move {
            let input = current.form;
            let result = blocking(move || match current.mode {
                FormMode::Create => incidents.insert_incident(&input, reporter),
                FormMode::Edit(id) => incidents.update_incident(id, &input),
            })
            .await;

            match result {
                Ok(incident) => {
                    let incident_id = incident.id.unwrap_or_default();
                    state.update(|s| {
                        s.submitting = false;
                        s.mode = FormMode::Edit(incident_id);
                        s.message = Some("incident saved".into());
                    });
                    events.emit(IncidentFormEvent::Saved { incident_id });
                }
                Err(e) => {
                    let text = failure_text("save incident", &e);
                    state.update(|s| {
                        s.submitting = false;
                        s.error = Some(text);
                    });
                }
            }
        });
    }

    pub fn clear_messages(&self) {
        self.state.update(|s| {
            s.error = None;
            s.message = None;
        });
    }
}
