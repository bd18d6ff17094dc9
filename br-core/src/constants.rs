//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "Brigada";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Database schema version.
pub const DB_SCHEMA_VERSION: i32 = 1;

/// Default delay before the simulated support reply, in milliseconds.
pub const DEFAULT_REPLY_DELAY_MS: u64 = 2_000;

/// Username of the seeded support account.
pub const SUPPORT_USERNAME: &str = "soporte";

/// Id the support account receives when seeded into an empty store.
pub const SUPPORT_FALLBACK_USER_ID: i64 = 2;

/// Capacity of the table-change broadcast channel.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Seeded role identifiers.
pub mod roles {
    pub const ADMINISTRATOR: i64 = 1;
    pub const FIREFIGHTER: i64 = 2;
    pub const CITIZEN: i64 = 3;
}

/// Inclusive character-count limits for incident fields.
pub mod incident_limits {
    pub const TITLE: (usize, usize) = (10, 30);
    pub const DETAIL: (usize, usize) = (10, 100);
    pub const COMUNA: (usize, usize) = (2, 20);
    pub const ADDRESS: (usize, usize) = (5, 30);
    pub const COORDINATE_MAX_CHARS: usize = 15;
}

/// Limits for account fields.
pub mod account_limits {
    pub const USERNAME_MIN: usize = 3;
    pub const PASSWORD_MIN: usize = 8;
    pub const PHONE: (usize, usize) = (8, 15);
}
