//! Profile repository: the flattened user/role/photo view and its edits.

use tracing::info;

use br_core::error::{BrError, BrResult};
use br_models::queries::{self, UserProfile};
use br_models::{Database, LiveQuery, Table, User, UserUpdate};

use crate::event_bus::{AppEvent, EventBus};
use crate::photo_store::{resolve_photo, PhotoStore};
use crate::service::{impl_service, ServiceState};
use crate::session::{Session, SessionUser};
use crate::validation::{self, require};

/// Validate the editable profile fields, failing on the first invalid one.
pub fn validate_update(update: &UserUpdate) -> BrResult<()> {
    require("name", validation::name(&update.name))?;
    require("username", validation::username(&update.username))?;
    require("phone", validation::phone(&update.phone))?;
    require("run", validation::run(&update.run))?;
    require("dv", validation::check_digit(&update.run, &update.dv))?;
    Ok(())
}

#[derive(Clone)]
pub struct ProfileRepository {
    state: ServiceState,
    database: Database,
    session: Session,
    event_bus: EventBus,
}

impl ProfileRepository {
    pub fn new(database: Database, session: Session, event_bus: EventBus) -> Self {
        Self {
            state: ServiceState::Created,
            database,
            session,
            event_bus,
        }
    }

    pub fn profile(&self, user_id: i64) -> BrResult<UserProfile> {
        self.database
            .read(|conn| queries::user_profile(conn, user_id))?
            .ok_or_else(|| BrError::not_found("profile", user_id))
    }

    /// The profile, re-read whenever the user, role or photo tables change.
    pub fn observe_profile(&self, user_id: i64) -> LiveQuery<Option<UserProfile>> {
        self.database.watch(&[Table::Users, Table::Roles, Table::Photos], move |conn| {
            queries::user_profile(conn, user_id)
        })
    }

    /// Persist name, username, phone, run and dv. Email, role and photo are kept.
    pub fn update_user(&self, user_id: i64, update: &UserUpdate) -> BrResult<UserProfile> {
        validate_update(update)?;
        let update = UserUpdate {
            name: update.name.trim().to_string(),
            username: update.username.trim().to_string(),
            phone: update.phone.trim().to_string(),
            run: update.run.trim().to_string(),
            dv: update.dv.trim().to_uppercase(),
        };

        let user = self.database.write(|conn| {
            if !User::update_fields(conn, user_id, &update)? {
                return Err(BrError::not_found("profile", user_id));
            }
            User::find_by_id(conn, user_id)?.ok_or_else(|| BrError::not_found("profile", user_id))
        })?;

        self.session.refresh(SessionUser::try_from(&user)?);
        info!("profile of user {user_id} updated");
        self.event_bus.emit(AppEvent::ProfileUpdated { user_id });
        self.profile(user_id)
    }

    /// Point the user at a new photo, kept by the URL given. The previous
    /// photo row is left in place, since other users or incidents may share it.
    pub fn change_photo(&self, user_id: i64, source: &str) -> BrResult<UserProfile> {
        let photo = PhotoStore::reference(source)?;
        self.database.write(|conn| {
            let foto_id = resolve_photo(conn, &photo)?;
            if !User::update_photo(conn, user_id, foto_id)? {
                return Err(BrError::not_found("profile", user_id));
            }
            Ok(())
        })?;

        info!("photo of user {user_id} changed");
        self.event_bus.emit(AppEvent::ProfileUpdated { user_id });
        self.profile(user_id)
    }
}

impl_service!(ProfileRepository, "profile");
