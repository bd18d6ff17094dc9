//! Brigada Models - Database schema, entities, migrations, queries and live queries.
//!
//! This crate owns all data persistence: SQLite initialization, entity
//! models, versioned migrations, joined query functions, and the change
//! notification that lets query results update themselves after every
//! committed write.

pub mod db;
pub mod live;
pub mod schema;
pub mod models;
pub mod queries;
pub mod migrations;

// Re-export key types
pub use db::{ChangeSet, Database, DatabaseStats, DbPool, Table};
pub use live::{LiveQuery, LiveResult, QueryError};
pub use models::conversation::{Conversation, ConversationKind, Participant};
pub use models::incident::{Incident, IncidentDetails, IncidentState};
pub use models::message::{Message, MessageKind};
pub use models::photo::Photo;
pub use models::recipient_copy::RecipientCopy;
pub use models::role::Role;
pub use models::user::{User, UserUpdate};
pub use models::now_millis;
