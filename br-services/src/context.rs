//! Application context: owns the store and wires every repository to it.
//!
//! Replaces ambient globals. Controllers receive the pieces they need from
//! here at construction time.

use tracing::{info, warn};

use br_core::config::AppConfig;
use br_core::error::BrResult;
use br_models::Database;

use crate::alert::AlertRepository;
use crate::auth::AuthRepository;
use crate::chat::ChatRepository;
use crate::event_bus::EventBus;
use crate::incident::IncidentRepository;
use crate::password::PasswordHasher;
use crate::photo_store::PhotoStore;
use crate::profile::ProfileRepository;
use crate::seed;
use crate::service::Service;
use crate::session::Session;

pub struct AppContext {
    pub config: AppConfig,
    pub database: Database,
    pub session: Session,
    pub event_bus: EventBus,
    pub photos: PhotoStore,
    pub auth: AuthRepository,
    pub incidents: IncidentRepository,
    pub alerts: AlertRepository,
    pub chat: ChatRepository,
    pub profiles: ProfileRepository,
}

impl AppContext {
    /// Open the store, seed it on first run and bring up every repository.
    pub fn bootstrap(config: AppConfig) -> BrResult<Self> {
        let db_path = config.effective_db_path()?;
        let database = Database::init(&db_path, &config.database)?;
        let hasher = PasswordHasher::new(&config.auth)?;

        if config.seed.demo_data {
            seed::seed_demo_data(&database, &hasher)?;
        }

        let session = Session::new();
        let event_bus = EventBus::default();
        let photos = PhotoStore::new(config.effective_photo_dir()?);

        let mut context = Self {
            auth: AuthRepository::new(
                database.clone(),
                session.clone(),
                hasher,
                event_bus.clone(),
                config.auth.upgrade_legacy_passwords,
            ),
            incidents: IncidentRepository::new(database.clone(), photos.clone(), event_bus.clone()),
            alerts: AlertRepository::new(database.clone(), event_bus.clone()),
            chat: ChatRepository::new(database.clone(), event_bus.clone(), config.chat.clone()),
            profiles: ProfileRepository::new(database.clone(), session.clone(), event_bus.clone()),
            config,
            database,
            session,
            event_bus,
            photos,
        };

        for service in context.services_mut() {
            service.init()?;
        }
        info!("application context ready ({})", context.database.stats()?);
        Ok(context)
    }

    fn services_mut(&mut self) -> [&mut dyn Service; 5] {
        [
            &mut self.auth,
            &mut self.incidents,
            &mut self.alerts,
            &mut self.chat,
            &mut self.profiles,
        ]
    }

    /// Whether every repository reports healthy.
    pub fn is_healthy(&self) -> bool {
        let services: [&dyn Service; 5] = [&self.auth, &self.incidents, &self.alerts, &self.chat, &self.profiles];
        services.iter().all(|s| s.is_healthy())
    }

    /// Log out and stop every repository.
    pub fn shutdown(&mut self) {
        self.auth.logout();
        for service in self.services_mut() {
            if let Err(e) = service.shutdown() {
                warn!("failed to stop {}: {e}", service.name());
            }
        }
        info!("application context stopped");
    }
}
