//! Brigada State - feature controllers.
//!
//! Turns repository streams into UI-state snapshots and user intents into
//! validated repository calls:
//! - `StateHolder` current-value snapshots
//! - `EventChannel` one-shot navigation commands
//! - `TaskScope` cancellation of in-flight work with the owning controller
//! - Controllers for login, registration, profile, incidents, chat and notifications

pub mod state;
pub mod events;
pub mod scope;
pub mod picker;
pub mod controllers;

pub use br_services::validation;

// Re-export key types
pub use state::StateHolder;
pub use events::EventChannel;
pub use scope::TaskScope;
pub use picker::{FixedPicker, ImagePicker, PickResult};
pub use controllers::FieldErrors;
pub use controllers::chat::{ChatController, ChatState};
pub use controllers::incident_form::{FormMode, IncidentField, IncidentFormController, IncidentFormEvent, IncidentFormState};
pub use controllers::incident_list::{IncidentListController, IncidentListState};
pub use controllers::login::{LoginController, LoginEvent, LoginState};
pub use controllers::notifications::{NotificationsController, NotificationsEvent, NotificationsState};
pub use controllers::profile::{ProfileController, ProfileEvent, ProfileField, ProfileState};
pub use controllers::register::{RegisterController, RegisterEvent, RegisterField, RegisterForm, RegisterState};
