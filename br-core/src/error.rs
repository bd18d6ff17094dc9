//! Global error types for the Brigada application.
//!
//! All error categories across the application are unified into a single
//! `BrError` enum. Each variant belongs to exactly one [`ErrorKind`], which
//! is what state controllers use to decide how a failure is surfaced.

use thiserror::Error;

/// Convenience type alias for Results using BrError.
pub type BrResult<T> = Result<T, BrError>;

/// Coarse error taxonomy used when surfacing failures to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Field-level input problem. Recoverable, shown inline.
    Validation,
    /// A referenced record does not exist.
    NotFound,
    /// The request contradicts current state (duplicate email, already taken).
    Conflict,
    /// The local store failed. Logged, shown as a generic failure.
    Storage,
    /// Anything else (configuration, hashing, task join failures).
    Internal,
}

/// Unified error type covering all error categories in Brigada.
#[derive(Error, Debug)]
pub enum BrError {
    // -- Validation --
    /// A user-supplied field failed validation.
    #[error("{field}: {message}")]
    Validation {
        /// Field identifier (e.g. "title", "email").
        field: &'static str,
        /// Human-readable reason.
        message: String,
    },

    // -- Not found --
    /// A record could not be found.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity name (e.g. "incident", "profile").
        entity: &'static str,
        /// Lookup key that missed.
        key: String,
    },

    // -- Conflicts --
    /// Registration attempted with an email that already exists.
    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    /// Login identifier/password did not match any user.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Incident already assigned to another user.
    #[error("incident {incident_id} already taken by user {assigned_to}")]
    AlreadyTaken {
        incident_id: i64,
        assigned_to: i64,
    },

    /// Incident state machine violation.
    #[error("incident {incident_id} cannot move from {from} to {to}")]
    InvalidTransition {
        incident_id: i64,
        from: String,
        to: String,
    },

    /// Closed incidents are read-only.
    #[error("incident {0} is closed")]
    IncidentClosed(i64),

    // -- Storage --
    /// SQLite database error.
    #[error("database error: {0}")]
    Database(String),

    /// Database migration failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// Database connection pool error.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// Database integrity check failed.
    #[error("database integrity check failed: {0}")]
    IntegrityCheck(String),

    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // -- Internal --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Password hashing or verification failed for a reason other than mismatch.
    #[error("password hash error: {0}")]
    PasswordHash(String),

    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BrError {
    /// Shorthand for a validation error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        BrError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Shorthand for a not-found error.
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        BrError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrError::Validation { .. } => ErrorKind::Validation,
            BrError::NotFound { .. } => ErrorKind::NotFound,
            BrError::DuplicateEmail(_)
            | BrError::InvalidCredentials
            | BrError::AlreadyTaken { .. }
            | BrError::InvalidTransition { .. }
            | BrError::IncidentClosed(_) => ErrorKind::Conflict,
            BrError::Database(_)
            | BrError::Migration(_)
            | BrError::Pool(_)
            | BrError::IntegrityCheck(_)
            | BrError::Io(_) => ErrorKind::Storage,
            BrError::Config(_)
            | BrError::Serialization(_)
            | BrError::PasswordHash(_)
            | BrError::Internal(_)
            | BrError::Other(_) => ErrorKind::Internal,
        }
    }

    /// Message suitable for a user-visible error slot.
    ///
    /// Storage and internal failures collapse into a generic text; their
    /// details only go to the log.
    pub fn user_message(&self) -> String {
        match self {
            BrError::Validation { message, .. } => message.clone(),
            BrError::NotFound { entity, .. } => format!("{entity} not found"),
            BrError::DuplicateEmail(_) => "that email is already registered".to_string(),
            BrError::InvalidCredentials => "wrong email/username or password".to_string(),
            BrError::AlreadyTaken { .. } => "this incident was already taken".to_string(),
            BrError::InvalidTransition { to, .. } => format!("incident cannot be moved to {to}"),
            BrError::IncidentClosed(_) => "closed incidents cannot be edited".to_string(),
            _ => "the operation failed, please try again".to_string(),
        }
    }
}

impl From<serde_json::Error> for BrError {
    fn from(e: serde_json::Error) -> Self {
        BrError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for BrError {
    fn from(e: toml::de::Error) -> Self {
        BrError::Config(e.to_string())
    }
}
