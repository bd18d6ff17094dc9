//! Brigada Services - Repository layer.
//!
//! Business rules on top of the data access layer:
//! - Authentication with salted password hashes and an explicit session
//! - Registration with photo deduplication by URL
//! - Incident lifecycle with race-free take/assign/close transitions
//! - Alert broadcast as a snapshot fan-out to per-user copies
//! - Chat with a cancellable, delayed support reply
//! - Profile reads and edits
//! - Field validation shared with the state controllers
//! - First-run demo seeding

pub mod service;
pub mod event_bus;
pub mod session;
pub mod password;
pub mod validation;
pub mod photo_store;
pub mod auth;
pub mod incident;
pub mod alert;
pub mod chat;
pub mod profile;
pub mod seed;
pub mod context;

// Re-export key types
pub use service::{Service, ServiceState};
pub use event_bus::{AppEvent, EventBus};
pub use session::{Session, SessionUser};
pub use password::{PasswordHasher, Verification};
pub use photo_store::{PhotoRef, PhotoStore};
pub use auth::{AuthRepository, Registration};
pub use incident::{IncidentInput, IncidentRepository, TakeOutcome};
pub use alert::{AlertRepository, BroadcastReceipt};
pub use chat::ChatRepository;
pub use profile::ProfileRepository;
pub use context::AppContext;
