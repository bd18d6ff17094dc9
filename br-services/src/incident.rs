//! Incident repository: validation, lifecycle transitions and live listings.
//!
//! Transitions are conditional UPDATEs evaluated inside an IMMEDIATE
//! transaction. Two users taking the same incident at once therefore see
//! exactly one `Taken` and one `AlreadyTaken`, never a double write.

use tracing::{debug, info};

use br_core::error::{BrError, BrResult};
use br_models::queries::{self, IncidentFilter, IncidentWithDetails};
use br_models::{now_millis, Database, Incident, IncidentDetails, IncidentState, LiveQuery, Table, User};

use crate::event_bus::{AppEvent, EventBus};
use crate::photo_store::{resolve_photo, PhotoRef, PhotoStore};
use crate::service::{impl_service, ServiceState};
use crate::validation::{self, require};

/// Tables an incident listing reads from.
const INCIDENT_TABLES: [Table; 3] = [Table::Incidents, Table::Users, Table::Photos];

/// Incident form as typed by the user. Optional fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentInput {
    pub title: String,
    pub detail: String,
    pub latitude: String,
    pub longitude: String,
    pub comuna: String,
    pub region: String,
    pub address: String,
    /// New photo to attach (picked file, `file://` URI or URL).
    pub photo: Option<String>,
}

impl IncidentInput {
    /// Validate every field, failing on the first invalid one.
    pub fn validate(&self) -> BrResult<()> {
        require("title", validation::incident_title(&self.title))?;
        require("detail", validation::incident_detail(&self.detail))?;
        require("comuna", validation::incident_comuna(&self.comuna))?;
        require("address", validation::incident_address(&self.address))?;
        require("latitude", validation::coordinate(&self.latitude))?;
        require("longitude", validation::coordinate(&self.longitude))?;
        Ok(())
    }

    fn details(&self, foto_id: Option<i64>) -> IncidentDetails {
        IncidentDetails {
            title: self.title.trim().to_string(),
            detail: self.detail.trim().to_string(),
            foto_id,
            latitude: validation::parse_coordinate(&self.latitude),
            longitude: validation::parse_coordinate(&self.longitude),
            comuna: non_empty(&self.comuna),
            region: non_empty(&self.region),
            address: non_empty(&self.address),
        }
    }
}

impl From<&Incident> for IncidentInput {
    fn from(incident: &Incident) -> Self {
        Self {
            title: incident.title.clone(),
            detail: incident.detail.clone(),
            latitude: incident.latitude.map(|v| v.to_string()).unwrap_or_default(),
            longitude: incident.longitude.map(|v| v.to_string()).unwrap_or_default(),
            comuna: incident.comuna.clone().unwrap_or_default(),
            region: incident.region.clone().unwrap_or_default(),
            address: incident.address.clone().unwrap_or_default(),
            photo: None,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Result of a take/assign request that reached the store.
#[derive(Debug, Clone, PartialEq)]
pub enum TakeOutcome {
    /// This request won; the incident is now assigned.
    Taken(Incident),
    /// Someone else got there first.
    AlreadyTaken { assigned_to: i64 },
}

impl TakeOutcome {
    /// Treat a lost race as an error, for callers that need the assignment to stick.
    pub fn into_result(self, incident_id: i64) -> BrResult<Incident> {
        match self {
            TakeOutcome::Taken(incident) => Ok(incident),
            TakeOutcome::AlreadyTaken { assigned_to } => Err(BrError::AlreadyTaken { incident_id, assigned_to }),
        }
    }
}

#[derive(Clone)]
pub struct IncidentRepository {
    state: ServiceState,
    database: Database,
    photos: PhotoStore,
    event_bus: EventBus,
}

impl IncidentRepository {
    pub fn new(database: Database, photos: PhotoStore, event_bus: EventBus) -> Self {
        Self {
            state: ServiceState::Created,
            database,
            photos,
            event_bus,
        }
    }

    fn import_photo(&self, input: &IncidentInput) -> BrResult<Option<PhotoRef>> {
        input
            .photo
            .as_deref()
            .filter(|source| !source.trim().is_empty())
            .map(|source| self.photos.import(source))
            .transpose()
    }

    /// Validate and store a new incident in the `CREATED` state.
    pub fn insert_incident(&self, input: &IncidentInput, reported_by: Option<i64>) -> BrResult<Incident> {
        input.validate()?;
        let photo = self.import_photo(input)?;

        let incident = self.database.write(|conn| {
            let foto_id = photo.as_ref().map(|p| resolve_photo(conn, p)).transpose()?;
            let mut incident = Incident::new(input.details(foto_id), reported_by, now_millis());
            incident.insert(conn)?;
            Ok(incident)
        })?;

        let incident_id = incident.id.unwrap_or_default();
        info!("incident {incident_id} created");
        self.event_bus.emit(AppEvent::IncidentCreated { incident_id });
        Ok(incident)
    }

    /// Replace the editable content of an incident. Closed incidents are read-only.
    ///
    /// Without a new photo the current one is kept.
    pub fn update_incident(&self, id: i64, input: &IncidentInput) -> BrResult<Incident> {
        input.validate()?;
        let photo = self.import_photo(input)?;

        let incident = self.database.write(|conn| {
            let current = Incident::find_by_id(conn, id)?.ok_or_else(|| BrError::not_found("incident", id))?;
            if current.state == IncidentState::Closed {
                return Err(BrError::IncidentClosed(id));
            }
            let foto_id = match &photo {
                Some(p) => Some(resolve_photo(conn, p)?),
                None => current.foto_id,
            };
            Incident::update_details(conn, id, &input.details(foto_id))?;
            Incident::find_by_id(conn, id)?.ok_or_else(|| BrError::not_found("incident", id))
        })?;

        info!("incident {id} updated");
        self.event_bus.emit(AppEvent::IncidentUpdated { incident_id: id });
        Ok(incident)
    }

    /// `CREATED -> ASSIGNED` for the calling user.
    pub fn take_incident(&self, id: i64, user_id: i64) -> BrResult<TakeOutcome> {
        let outcome = self.database.write(|conn| {
            if User::find_by_id(conn, user_id)?.is_none() {
                return Err(BrError::not_found("user", user_id));
            }
            if Incident::try_assign(conn, id, user_id)? == 1 {
                let incident = Incident::find_by_id(conn, id)?.ok_or_else(|| BrError::not_found("incident", id))?;
                return Ok(TakeOutcome::Taken(incident));
            }

            let current = Incident::find_by_id(conn, id)?.ok_or_else(|| BrError::not_found("incident", id))?;
            match (current.state, current.assigned_to) {
                (IncidentState::Assigned, Some(assigned_to)) => Ok(TakeOutcome::AlreadyTaken { assigned_to }),
                (state, _) => Err(BrError::InvalidTransition {
                    incident_id: id,
                    from: state.to_string(),
                    to: IncidentState::Assigned.to_string(),
                }),
            }
        })?;

        match &outcome {
            TakeOutcome::Taken(_) => {
                info!("incident {id} assigned to user {user_id}");
                self.event_bus.emit(AppEvent::IncidentAssigned { incident_id: id, user_id });
            }
            TakeOutcome::AlreadyTaken { assigned_to } => {
                debug!("incident {id} already taken by user {assigned_to}, request by {user_id} ignored");
            }
        }
        Ok(outcome)
    }

    /// Administrator assignment of an incident to another user. Same rules as a take.
    pub fn assign_incident(&self, id: i64, assignee: i64) -> BrResult<TakeOutcome> {
        self.take_incident(id, assignee)
    }

    /// `ASSIGNED -> CLOSED`.
    pub fn close_incident(&self, id: i64) -> BrResult<Incident> {
        let incident = self.database.write(|conn| {
            if Incident::try_close(conn, id)? == 1 {
                return Incident::find_by_id(conn, id)?.ok_or_else(|| BrError::not_found("incident", id));
            }
            let current = Incident::find_by_id(conn, id)?.ok_or_else(|| BrError::not_found("incident", id))?;
            Err(BrError::InvalidTransition {
                incident_id: id,
                from: current.state.to_string(),
                to: IncidentState::Closed.to_string(),
            })
        })?;

        info!("incident {id} closed");
        self.event_bus.emit(AppEvent::IncidentClosed { incident_id: id });
        Ok(incident)
    }

    pub fn find(&self, id: i64) -> BrResult<IncidentWithDetails> {
        self.database
            .read(|conn| queries::incident_with_details(conn, id))?
            .ok_or_else(|| BrError::not_found("incident", id))
    }

    pub fn list(&self, filter: &IncidentFilter) -> BrResult<Vec<IncidentWithDetails>> {
        self.database.read(|conn| queries::incidents_with_details(conn, filter))
    }

    pub fn count_by_state(&self) -> BrResult<Vec<(IncidentState, i64)>> {
        self.database.read(queries::incident_counts)
    }

    // ─── Live queries ────────────────────────────────────────────────────

    pub fn observe(&self, filter: IncidentFilter) -> LiveQuery<Vec<IncidentWithDetails>> {
        self.database
            .watch(&INCIDENT_TABLES, move |conn| queries::incidents_with_details(conn, &filter))
    }

    pub fn observe_all(&self) -> LiveQuery<Vec<IncidentWithDetails>> {
        self.observe(IncidentFilter::default())
    }

    pub fn observe_by_state(&self, state: IncidentState) -> LiveQuery<Vec<IncidentWithDetails>> {
        self.observe(IncidentFilter::by_state(state))
    }

    pub fn observe_assigned_to(&self, user_id: i64) -> LiveQuery<Vec<IncidentWithDetails>> {
        self.observe(IncidentFilter::assigned_to(user_id))
    }

    /// A single incident; `None` once it has been removed.
    pub fn observe_incident(&self, id: i64) -> LiveQuery<Option<IncidentWithDetails>> {
        self.database
            .watch(&INCIDENT_TABLES, move |conn| queries::incident_with_details(conn, id))
    }
}

impl_service!(IncidentRepository, "incident");
