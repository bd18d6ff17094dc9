//! Registration screen.

use std::collections::BTreeSet;
use std::sync::Arc;

use br_core::error::BrError;
use br_services::photo_store::file_uri;
use br_services::validation;
use br_services::{AuthRepository, Registration};

use super::{blocking, failure_text, set_field_error, FieldErrors};
use crate::events::EventChannel;
use crate::picker::{ImagePicker, PickResult};
use crate::scope::TaskScope;
use crate::state::StateHolder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RegisterField {
    Run,
    Dv,
    Username,
    Name,
    Email,
    Phone,
    Password,
    PasswordConfirmation,
}

impl RegisterField {
    pub const ALL: [RegisterField; 8] = [
        Self::Run,
        Self::Dv,
        Self::Username,
        Self::Name,
        Self::Email,
        Self::Phone,
        Self::Password,
        Self::PasswordConfirmation,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Dv => "dv",
            Self::Username => "username",
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Password => "password",
            Self::PasswordConfirmation => "password_confirmation",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterForm {
    pub run: String,
    pub dv: String,
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub password_confirmation: String,
    /// URL of the picked photo: `file://`, `content://` or http(s).
    pub photo: Option<String>,
}

impl RegisterForm {
    fn value_mut(&mut self, field: RegisterField) -> &mut String {
        match field {
            RegisterField::Run => &mut self.run,
            RegisterField::Dv => &mut self.dv,
            RegisterField::Username => &mut self.username,
            RegisterField::Name => &mut self.name,
            RegisterField::Email => &mut self.email,
            RegisterField::Phone => &mut self.phone,
            RegisterField::Password => &mut self.password,
            RegisterField::PasswordConfirmation => &mut self.password_confirmation,
        }
    }

    fn check(&self, field: RegisterField) -> Result<(), String> {
        match field {
            RegisterField::Run => validation::run(&self.run),
            RegisterField::Dv => validation::check_digit(&self.run, &self.dv),
            RegisterField::Username => validation::username(&self.username),
            RegisterField::Name => validation::name(&self.name),
            RegisterField::Email => validation::email(&self.email),
            RegisterField::Phone => validation::phone(&self.phone),
            RegisterField::Password => validation::password(&self.password),
            RegisterField::PasswordConfirmation => {
                validation::password_confirmation(&self.password, &self.password_confirmation)
            }
        }
    }

    fn check_photo(&self) -> Result<(), String> {
        match &self.photo {
            Some(url) => validation::url(url),
            None => Err("pick a profile photo".into()),
        }
    }

    fn to_registration(&self) -> Registration {
        Registration {
            run: self.run.clone(),
            dv: self.dv.clone(),
            username: self.username.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            password: self.password.clone(),
            photo: self.photo.clone().unwrap_or_default(),
            rol_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterState {
    pub form: RegisterForm,
    /// Errors of the fields the user has touched.
    pub errors: FieldErrors,
    pub touched: BTreeSet<RegisterField>,
    /// A photo was picked, typed or required by a submit attempt.
    pub photo_touched: bool,
    pub can_submit: bool,
    pub submitting: bool,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl RegisterState {
    fn revalidate(&mut self) {
        let mut all_valid = true;
        for field in RegisterField::ALL {
            let result = self.form.check(field);
            all_valid &= result.is_ok();
            if self.touched.contains(&field) {
                set_field_error(&mut self.errors, field.key(), result);
            } else {
                self.errors.remove(field.key());
            }
        }
        let photo = self.form.check_photo();
        all_valid &= photo.is_ok();
        if self.photo_touched {
            set_field_error(&mut self.errors, "photo", photo);
        } else {
            self.errors.remove("photo");
        }
        self.can_submit = all_valid;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegisterEvent {
    /// Account created; go to the login screen.
    Registered { user_id: i64 },
}

pub struct RegisterController {
    auth: AuthRepository,
    state: StateHolder<RegisterState>,
    events: EventChannel<RegisterEvent>,
    scope: TaskScope,
}

impl RegisterController {
    pub fn new(auth: AuthRepository) -> Self {
        Self {
            auth,
            state: StateHolder::new(RegisterState::default()),
            events: EventChannel::new("register"),
            scope: TaskScope::new(),
        }
    }

    pub fn state(&self) -> &StateHolder<RegisterState> {
        &self.state
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<RegisterState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> &EventChannel<RegisterEvent> {
        &self.events
    }

    pub fn set_field(&self, field: RegisterField, value: &str) {
        self.state.update(|s| {
            *s.form.value_mut(field) = value.to_string();
            s.touched.insert(field);
            s.revalidate();
        });
    }

    /// Ask the picker for a photo. A cancelled pick keeps the current one.
    pub fn pick_photo(&self, picker: Arc<dyn ImagePicker>) {
        let state = self.state.clone();
        self.scope.spawn(async move {
            if let PickResult::Picked(path) = picker.pick().await {
                state.update(|s| {
                    s.form.photo = Some(file_uri(&path));
                    s.photo_touched = true;
                    s.revalidate();
                });
            }
        });
    }

    pub fn set_photo_url(&self, url: &str) {
        self.state.update(|s| {
            s.form.photo = (!url.trim().is_empty()).then(|| url.trim().to_string());
            s.photo_touched = true;
            s.revalidate();
        });
    }

    pub fn submit(&self) {
        self.state.update(|s| {
            s.touched.extend(RegisterField::ALL);
            s.photo_touched = true;
            s.revalidate();
        });
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
            let registration = current.form.to_registration();
            match blocking(move || auth.register(&registration)).await {
                Ok(user) => {
                    state.update(|s| {
                        s.submitting = false;
                        s.message = Some("account created".into());
                    });
                    events.emit(RegisterEvent::Registered {
                        user_id: user.id.unwrap_or_default(),
                    });
                }
                Err(e) => {
                    let text = failure_text("registration", &e);
                    state.update(|s| {
                        s.submitting = false;
                        if let BrError::Validation { field, message } = &e {
                            s.errors.insert(*field, message.clone());
                        }
                        s.error = Some(text);
                    });
                }
            }
        });
    }

    pub fn clear_messages(&self) {
        self.state.update(|s| {
            s.error = None;
            s.message = None;
        });
    }
}
