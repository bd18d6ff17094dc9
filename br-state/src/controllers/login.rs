//! Login screen.

use br_services::{AuthRepository, SessionUser};

use super::{blocking, failure_text};
use crate::events::EventChannel;
use crate::scope::TaskScope;
use crate::state::StateHolder;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginState {
    pub identifier: String,
    pub password: String,
    pub identifier_error: Option<String>,
    pub password_error: Option<String>,
    pub can_submit: bool,
    pub submitting: bool,
    pub error: Option<String>,
}

impl LoginState {
    fn revalidate(&mut self) {
        self.identifier_error = self
            .identifier
            .trim()
            .is_empty()
            .then(|| "enter your email or username".to_string());
        self.password_error = self.password.is_empty().then(|| "enter your password".to_string());
        self.can_submit = self.identifier_error.is_none() && self.password_error.is_none();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoginEvent {
    /// Go to the home screen for this user.
    LoggedIn(SessionUser),
    /// Go back to the login screen.
    LoggedOut,
}

pub struct LoginController {
    auth: AuthRepository,
    state: StateHolder<LoginState>,
    events: EventChannel<LoginEvent>,
    scope: TaskScope,
}

impl LoginController {
    pub fn new(auth: AuthRepository) -> Self {
        Self {
            auth,
            state: StateHolder::new(LoginState::default()),
            events: EventChannel::new("login"),
            scope: TaskScope::new(),
        }
    }

    pub fn state(&self) -> &StateHolder<LoginState> {
        &self.state
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<LoginState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> &EventChannel<LoginEvent> {
        &self.events
    }

    pub fn set_identifier(&self, value: &str) {
        self.state.update(|s| {
            s.identifier = value.to_string();
            s.revalidate();
        });
    }

    pub fn set_password(&self, value: &str) {
        self.state.update(|s| {
            s.password = value.to_string();
            s.revalidate();
        });
    }

    pub fn submit(&self) {
        let current = self.state.snapshot();
        if !current.can_submit || current.submitting {
            return;
        }
        self.state.update(|s| {
            s.submitting = true;
            s.error = None;
        });

        let auth = self.auth.clone();
        let state = self.state.clone();
        let events = self.events.clone();
        self.scope.spawn(async move {
            let (identifier, password) = (current.identifier, current.password);
            let result = blocking(move || {
                auth.login(&identifier, &password)?;
                auth.session().require()
            })
            .await;

            match result {
                Ok(user) => {
                    state.update(|s| {
                        s.submitting = false;
                        s.password.clear();
                        s.revalidate();
                    });
                    events.emit(LoginEvent::LoggedIn(user));
                }
                Err(e) => {
                    let text = failure_text("login", &e);
                    state.update(|s| {
                        s.submitting = false;
                        s.error = Some(text);
                    });
                }
            }
        });
    }

    pub fn logout(&self) {
        let auth = self.auth.clone();
        let events = self.events.clone();
        self.scope.spawn(async move {
            if let Ok(Some(_)) = blocking(move || Ok(auth.logout())).await {
                events.emit(LoginEvent::LoggedOut);
            }
        });
    }

    pub fn clear_messages(&self) {
        self.state.update(|s| s.error = None);
    }
}
