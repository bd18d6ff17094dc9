//! Explicit session context.
//!
//! Holds the logged-in user for the lifetime of a login. Controllers receive
//! a clone at construction and observe it; only the auth repository sets or
//! clears it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use br_core::constants::roles;
use br_core::error::{BrError, BrResult};
use br_models::User;

/// The authenticated user as seen by the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub rol_id: i64,
}

impl SessionUser {
    pub fn is_admin(&self) -> bool {
        self.rol_id == roles::ADMINISTRATOR
    }
}

impl TryFrom<&User> for SessionUser {
    type Error = BrError;

    fn try_from(user: &User) -> BrResult<Self> {
        let user_id = user
            .id
            .ok_or_else(|| BrError::Internal("session user without id".into()))?;
        Ok(Self {
            user_id,
            username: user.username.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            rol_id: user.rol_id,
        })
    }
}

/// Shared, observable "current user" slot.
#[derive(Clone)]
pub struct Session {
    sender: Arc<watch::Sender<Option<SessionUser>>>,
}

impl Session {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Snapshot of the current user.
    pub fn current(&self) -> Option<SessionUser> {
        self.sender.borrow().clone()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.sender.borrow().as_ref().map(|u| u.user_id)
    }

    /// The current user, or a `NotFound` error when nobody is logged in.
    pub fn require(&self) -> BrResult<SessionUser> {
        self.current()
            .ok_or_else(|| BrError::not_found("session", "no user logged in"))
    }

    /// Observe login/logout transitions.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionUser>> {
        self.sender.subscribe()
    }

    pub(crate) fn set(&self, user: SessionUser) {
        self.sender.send_replace(Some(user));
    }

    /// Refresh the cached identity after a profile edit, if it is the session user.
    pub(crate) fn refresh(&self, user: SessionUser) {
        self.sender.send_if_modified(|current| match current {
            Some(existing) if existing.user_id == user.user_id && *existing != user => {
                *existing = user;
                true
            }
            _ => false,
        });
    }

    pub(crate) fn clear(&self) -> Option<SessionUser> {
        self.sender.send_replace(None)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, rol_id: i64) -> SessionUser {
        SessionUser {
            user_id: id,
            username: "admin".into(),
            name: "Admin".into(),
            email: "a@a.cl".into(),
            rol_id,
        }
    }

    #[tokio::test]
    async fn test_set_and_clear_notify_subscribers() {
        let session = Session::new();
        let mut rx = session.subscribe();
        assert!(session.require().is_err());

        session.set(user(1, roles::ADMINISTRATOR));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().map(|u| u.user_id), Some(1));
        assert!(session.require().unwrap().is_admin());

        let previous = session.clear();
        assert_eq!(previous.map(|u| u.user_id), Some(1));
        assert_eq!(session.user_id(), None);
    }

    #[test]
    fn test_refresh_ignores_other_users() {
        let session = Session::new();
        session.set(user(1, roles::CITIZEN));
        let mut other = user(2, roles::CITIZEN);
        other.name = "Other".into();
        session.refresh(other);
        assert_eq!(session.current().unwrap().name, "Admin");

        let mut renamed = user(1, roles::CITIZEN);
        renamed.name = "Renamed".into();
        session.refresh(renamed);
        assert_eq!(session.current().unwrap().name, "Renamed");
    }
}
