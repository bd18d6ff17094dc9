//! Authentication repository: login, logout, registration and password changes.

use tracing::{info, warn};

use br_core::constants::roles;
use br_core::error::{BrError, BrResult};
use br_models::{Database, User};

use crate::event_bus::{AppEvent, EventBus};
use crate::password::{PasswordHasher, Verification};
use crate::photo_store::{resolve_photo, PhotoStore};
use crate::service::{impl_service, ServiceState};
use crate::session::{Session, SessionUser};
use crate::validation::{self, require};

/// Registration form as submitted.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub run: String,
    pub dv: String,
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    /// Picked local file, `file://` URI or remote URL.
    pub photo: String,
    /// Defaults to Citizen.
    pub rol_id: Option<i64>,
}

impl Registration {
    /// Validate every field, failing on the first invalid one.
    pub fn validate(&self) -> BrResult<()> {
        require("name", validation::name(&self.name))?;
        require("username", validation::username(&self.username))?;
        require("email", validation::email(&self.email))?;
        require("phone", validation::phone(&self.phone))?;
        require("password", validation::password(&self.password))?;
        require("run", validation::run(&self.run))?;
        require("dv", validation::check_digit(&self.run, &self.dv))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct AuthRepository {
    state: ServiceState,
    database: Database,
    session: Session,
    hasher: PasswordHasher,
    event_bus: EventBus,
    upgrade_legacy_passwords: bool,
}

impl AuthRepository {
    pub fn new(
        database: Database,
        session: Session,
        hasher: PasswordHasher,
        event_bus: EventBus,
        upgrade_legacy_passwords: bool,
    ) -> Self {
        Self {
            state: ServiceState::Created,
            database,
            session,
            hasher,
            event_bus,
            upgrade_legacy_passwords,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Authenticate by email or username and make the user the session user.
    ///
    /// Unknown identifiers and wrong passwords both yield `InvalidCredentials`.
    pub fn login(&self, identifier: &str, password: &str) -> BrResult<User> {
        let identifier = identifier.trim();
        let user = self
            .database
            .read(|conn| User::find_by_identifier(conn, identifier))?
            .ok_or(BrError::InvalidCredentials)?;
        let user_id = user.id.ok_or_else(|| BrError::Internal("stored user without id".into()))?;

        match self.hasher.verify(password, &user.password)? {
            Verification::Mismatch => {
                info!("failed login for user {user_id}");
                return Err(BrError::InvalidCredentials);
            }
            Verification::LegacyMatch if self.upgrade_legacy_passwords => {
                let hash = self.hasher.hash(password)?;
                self.database.write(|conn| User::update_password(conn, user_id, &hash))?;
                warn!("upgraded plaintext password of user {user_id} to argon2");
            }
            Verification::LegacyMatch | Verification::Match => {}
        }

        self.session.set(SessionUser::try_from(&user)?);
        info!("user {user_id} logged in");
        self.event_bus.emit(AppEvent::LoggedIn { user_id });
        Ok(user)
    }

    /// Clear the session. Returns the user that was logged in, if any.
    pub fn logout(&self) -> Option<SessionUser> {
        let previous = self.session.clear();
        if let Some(user) = &previous {
            info!("user {} logged out", user.user_id);
            self.event_bus.emit(AppEvent::LoggedOut { user_id: user.user_id });
        }
        previous
    }

    pub fn email_exists(&self, email: &str) -> BrResult<bool> {
        self.database.read(|conn| User::email_exists(conn, email))
    }

    /// Create an account.
    ///
    /// The photo is kept by the URL the user picked. The photo row and the
    /// user row are written together, and the photo row is shared with any
    /// earlier registration that used the same URL.
    pub fn register(&self, registration: &Registration) -> BrResult<User> {
        registration.validate()?;
        let email = registration.email.trim().to_string();
        if self.email_exists(&email)? {
            return Err(BrError::DuplicateEmail(email));
        }

        let photo = PhotoStore::reference(&registration.photo)?;
        let password = self.hasher.hash(&registration.password)?;

        let user = self.database.write(|conn| {
            // Re-checked under the write lock so two registrations cannot both pass.
            if User::email_exists(conn, &email)? {
                return Err(BrError::DuplicateEmail(email.clone()));
            }
            let foto_id = resolve_photo(conn, &photo)?;
            let mut user = User {
                id: None,
                run: registration.run.trim().to_string(),
                dv: registration.dv.trim().to_uppercase(),
                username: registration.username.trim().to_string(),
                name: registration.name.trim().to_string(),
                email: email.clone(),
                phone: registration.phone.trim().to_string(),
                password,
                foto_id,
                rol_id: registration.rol_id.unwrap_or(roles::CITIZEN),
            };
            user.insert(conn)?;
            Ok(user)
        })?;

        let user_id = user.id.unwrap_or_default();
        info!("registered user {user_id}");
        self.event_bus.emit(AppEvent::UserRegistered { user_id });
        Ok(user)
    }

    /// Replace a user's password after checking the current one.
    pub fn change_password(&self, user_id: i64, current: &str, new_password: &str) -> BrResult<()> {
        require("password", validation::password(new_password))?;
        let user = self
            .database
            .read(|conn| User::find_by_id(conn, user_id))?
            .ok_or_else(|| BrError::not_found("user", user_id))?;

        if !self.hasher.verify(current, &user.password)?.is_match() {
            return Err(BrError::InvalidCredentials);
        }

        let hash = self.hasher.hash(new_password)?;
        self.database.write(|conn| User::update_password(conn, user_id, &hash))?;
        info!("password changed for user {user_id}");
        Ok(())
    }
}

impl_service!(AuthRepository, "auth");
