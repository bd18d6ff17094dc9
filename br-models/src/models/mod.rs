//! Entity model definitions.

pub mod role;
pub mod photo;
pub mod user;
pub mod incident;
pub mod message;
pub mod recipient_copy;
pub mod conversation;

/// Current time as epoch milliseconds, the timestamp unit of every table.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
