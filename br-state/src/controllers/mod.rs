//! Per-feature state controllers.
//!
//! A controller owns one [`StateHolder`] snapshot and, where it drives
//! navigation, one [`EventChannel`](crate::events::EventChannel). Intent
//! methods return at once; the work runs in the controller's
//! [`TaskScope`] and lands in the snapshot. Dropping a controller cancels
//! whatever it still has in flight.

pub mod chat;
pub mod incident_form;
pub mod incident_list;
pub mod login;
pub mod notifications;
pub mod profile;
pub mod register;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, error, info};

use br_core::error::{BrError, BrResult, ErrorKind};
use br_models::{LiveQuery, LiveResult};
use br_services::{Session, SessionUser};

use crate::scope::TaskScope;
use crate::state::StateHolder;

/// Field name to error text. Only fields with a problem are present.
pub type FieldErrors = BTreeMap<&'static str, String>;

/// Run a synchronous repository call on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> BrResult<T>
where
    F: FnOnce() -> BrResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BrError::Internal(format!("repository task failed: {e}")))?
}

/// Text for a one-shot error slot. Storage and internal failures are logged.
pub(crate) fn failure_text(action: &str, err: &BrError) -> String {
    match err.kind() {
        ErrorKind::Storage | ErrorKind::Internal => error!("{action} failed: {err}"),
        _ => debug!("{action} rejected: {err}"),
    }
    err.user_message()
}

/// Feed every emission of `live` into `state` until the scope is dropped.
pub(crate) fn follow<T, S, F>(scope: &TaskScope, mut live: LiveQuery<T>, state: StateHolder<S>, apply: F)
where
    T: Clone + Send + Sync + 'static,
    S: Clone + PartialEq + Send + Sync + 'static,
    F: Fn(&mut S, LiveResult<T>) + Send + 'static,
{
    scope.spawn(async move {
        while let Some(result) = live.next().await {
            state.update(|s| apply(s, result));
        }
    });
}

/// Record `result` under `field`, replacing any previous error.
pub(crate) fn set_field_error(errors: &mut FieldErrors, field: &'static str, result: Result<(), String>) {
    match result {
        Ok(()) => {
            errors.remove(field);
        }
        Err(message) => {
            errors.insert(field, message);
        }
    }
}

/// Error slot text for intents made after the owning user logged out.
pub(crate) const SIGNED_OUT: &str = "you are no longer logged in";

/// Ties a controller to the user logged in when it was built.
#[derive(Clone)]
pub(crate) struct SessionBinding {
    session: Session,
    user_id: i64,
}

impl SessionBinding {
    /// Bind to the current session user. Fails when nobody is logged in.
    pub(crate) fn new(session: &Session) -> BrResult<Self> {
        let user = session.require()?;
        Ok(Self {
            session: session.clone(),
            user_id: user.user_id,
        })
    }

    pub(crate) fn user_id(&self) -> i64 {
        self.user_id
    }

    /// The bound user with their current role and name, or `None` once they
    /// logged out or another user logged in.
    pub(crate) fn active(&self) -> Option<SessionUser> {
        self.session.current().filter(|user| user.user_id == self.user_id)
    }

    /// When the session stops being the bound user's, abort every task in
    /// `scope` and apply `reset` to `state`.
    pub(crate) fn end_with_session<S, F>(&self, scope: &Arc<TaskScope>, state: StateHolder<S>, reset: F)
    where
        S: Clone + PartialEq + Send + Sync + 'static,
        F: FnOnce(&mut S) + Send + 'static,
    {
        let mut rx = self.session.subscribe();
        let user_id = self.user_id;
        let scope_ref = Arc::downgrade(scope);
        scope.spawn(async move {
            loop {
                let bound = rx.borrow_and_update().as_ref().map(|u| u.user_id) == Some(user_id);
                if !bound || rx.changed().await.is_err() {
                    break;
                }
            }
            info!("session of user {user_id} ended, closing controller");
            // Aborting this task too only takes effect at its next await.
            if let Some(scope) = scope_ref.upgrade() {
                scope.cancel_all();
            }
            state.update(reset);
        });
    }
}