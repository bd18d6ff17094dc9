//! Profile screen: view, edit and photo change.
//!
//! Logging out clears the loaded profile and any open edit.

use std::sync::Arc;

use br_core::error::BrResult;
use br_models::queries::UserProfile;
use br_models::UserUpdate;
use br_services::photo_store::file_uri;
use br_services::validation;
use br_services::{ProfileRepository, Session};

use super::{blocking, failure_text, follow, set_field_error, FieldErrors, SessionBinding, SIGNED_OUT};
use crate::events::EventChannel;
use crate::picker::{ImagePicker, PickResult};
use crate::scope::TaskScope;
use crate::state::StateHolder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Name,
    Username,
    Phone,
    Run,
    Dv,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileState {
    pub loading: bool,
    pub profile: Option<UserProfile>,
    /// Edit form, seeded from the profile on `start_editing`.
    pub editing: Option<UserUpdate>,
    pub errors: FieldErrors,
    pub can_save: bool,
    pub saving: bool,
    /// The owning user logged out.
    pub signed_out: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl Default for ProfileState {
    fn default() -> Self {
        Self {
            loading: true,
            profile: None,
            editing: None,
            errors: FieldErrors::new(),
            can_save: false,
            saving: false,
            signed_out: false,
            message: None,
            error: None,
        }
    }
}

impl ProfileState {
    fn close(&mut self) {
        *self = Self {
            loading: false,
            signed_out: true,
            ..Self::default()
        };
    }

    fn revalidate(&mut self) {
        let Some(form) = &self.editing else {
            self.errors.clear();
            self.can_save = false;
            return;
        };
        set_field_error(&mut self.errors, "name", validation::name(&form.name));
        set_field_error(&mut self.errors, "username", validation::username(&form.username));
        set_field_error(&mut self.errors, "phone", validation::phone(&form.phone));
        set_field_error(&mut self.errors, "run", validation::run(&form.run));
        set_field_error(&mut self.errors, "dv", validation::check_digit(&form.run, &form.dv));
        self.can_save = self.errors.is_empty();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileEvent {
    /// Edits saved; leave the edit screen.
    Saved,
}

pub struct ProfileController {
    binding: SessionBinding,
    profiles: ProfileRepository,
    state: StateHolder<ProfileState>,
    events: EventChannel<ProfileEvent>,
    scope: Arc<TaskScope>,
}

impl ProfileController {
    /// Controller for the logged-in user's profile. Fails without a session.
    pub fn new(profiles: ProfileRepository, session: &Session) -> BrResult<Self> {
        let binding = SessionBinding::new(session)?;
        let user_id = binding.user_id();
        let controller = Self {
            binding,
            state: StateHolder::new(ProfileState::default()),
            events: EventChannel::new("profile"),
            scope: Arc::new(TaskScope::new()),
            profiles,
        };

        follow(
            &controller.scope,
            controller.profiles.observe_profile(user_id),
            controller.state.clone(),
            |s, result| {
                s.loading = false;
                match result {
                    Ok(Some(profile)) => s.profile = Some(profile),
                    Ok(None) => s.error = Some("profile not found".into()),
                    Err(e) => s.error = Some(e.to_string()),
                }
            },
        );
        controller
            .binding
            .end_with_session(&controller.scope, controller.state.clone(), ProfileState::close);
        Ok(controller)
    }

    /// Id of the owning user while still logged in.
    fn active_user_id(&self) -> Option<i64> {
        let user_id = self.binding.active().map(|user| user.user_id);
        if user_id.is_none() {
            self.state.update(|s| s.error = Some(SIGNED_OUT.into()));
        }
        user_id
    }

    pub fn state(&self) -> &StateHolder<ProfileState> {
        &self.state
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<ProfileState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> &EventChannel<ProfileEvent> {
        &self.events
    }

    /// Open the edit form with the current values. No-op before the profile loaded.
    pub fn start_editing(&self) {
        self.state.update(|s| {
            if let Some(p) = &s.profile {
                s.editing = Some(UserUpdate {
                    name: p.name.clone(),
                    username: p.username.clone(),
                    phone: p.phone.clone(),
                    run: p.run.clone(),
                    dv: p.dv.clone(),
                });
                s.revalidate();
            }
        });
    }

    pub fn cancel_editing(&self) {
        self.state.update(|s| {
            s.editing = None;
            s.revalidate();
        });
    }

    pub fn set_field(&self, field: ProfileField, value: &str) {
        self.state.update(|s| {
            let Some(form) = s.editing.as_mut() else {
                return;
            };
            let slot = match field {
                ProfileField::Name => &mut form.name,
                ProfileField::Username => &mut form.username,
                ProfileField::Phone => &mut form.phone,
                ProfileField::Run => &mut form.run,
                ProfileField::Dv => &mut form.dv,
            };
            *slot = value.to_string();
            s.revalidate();
        });
    }

    pub fn save(&self) {
        let current = self.state.snapshot();
        let Some(update) = current.editing.filter(|_| current.can_save && !current.saving) else {
            return;
        };
        let Some(user_id) = self.active_user_id() else {
            return;
        };
        self.state.update(|s| {
            s.saving = true;
            s.error = None;
        });

        let profiles = self.profiles.clone();
        let state = self.state.clone();
        let events = self.events.clone();
        self.scope.spawn(async move {
            match blocking(move || profiles.update_user(user_id, &update)).await {
                Ok(profile) => {
                    state.update(|s| {
                        s.saving = false;
                        s.profile = Some(profile);
                        s.editing = None;
                        s.revalidate();
                        s.message = Some("profile updated".into());
                    });
                    events.emit(ProfileEvent::Saved);
                }
                Err(e) => {
                    let text = failure_text("profile update", &e);
                    state.update(|s| {
                        s.saving = false;
                        s.error = Some(text);
                    });
                }
            }
        });
    }

    /// Pick a new photo and store it right away.
    pub fn change_photo(&self, picker: Arc<dyn ImagePicker>) {
        let Some(user_id) = self.active_user_id() else {
            return;
        };
        let profiles = self.profiles.clone();
        let state = self.state.clone();
        self.scope.spawn(async move {
            let PickResult::Picked(path) = picker.pick().await else {
                return;
            };
            state.update(|s| s.saving = true);
            let source = file_uri(&path);
            match blocking(move || profiles.change_photo(user_id, &source)).await {
                Ok(profile) => state.update(|s| {
                    s.saving = false;
                    s.profile = Some(profile);
                    s.message = Some("photo updated".into());
                }),
                Err(e) => {
                    let text = failure_text("photo change", &e);
                    state.update(|s| {
                        s.saving = false;
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
