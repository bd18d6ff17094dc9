//! Account commands: login check, registration and profile edits.

use clap::Subcommand;
use console::style;
use dialoguer::Password;

use br_core::config::ConfigHandle;
use br_core::error::{BrError, BrResult};
use br_models::queries::UserProfile;
use br_models::UserUpdate;
use br_services::Registration;

use crate::{Credentials, OutputFormat};

#[derive(Subcommand)]
pub enum AccountAction {
    /// Log in and show who you are.
    Whoami,
    /// Create a citizen account.
    Register {
        /// RUN without check digit.
        #[arg(long)]
        run: String,
        /// Check digit (0-9 or K).
        #[arg(long)]
        dv: String,
        #[arg(long)]
        username: String,
        /// Full name.
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        /// Profile photo: image file path, file:// URI or http(s) URL.
        #[arg(long)]
        photo: String,
        /// Account password (prompted when omitted).
        #[arg(long = "new-password")]
        new_password: Option<String>,
    },
    /// Show your profile.
    Profile,
    /// Edit profile fields. Omitted fields keep their value.
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        run: Option<String>,
        #[arg(long)]
        dv: Option<String>,
    },
    /// Replace your profile photo.
    Photo {
        /// Image file path, file:// URI or http(s) URL.
        source: String,
    },
    /// Change your password.
    Password {
        /// New password (prompted when omitted).
        #[arg(long = "new-password")]
        new_password: Option<String>,
    },
}

pub async fn run(
    config: ConfigHandle,
    credentials: Credentials,
    action: AccountAction,
    format: OutputFormat,
) -> BrResult<()> {
    let (ctx, events) = super::open_context(&config).await?;
    let result = dispatch(&ctx, &credentials, action, format);
    super::close_context(ctx, events).await;
    result
}

fn dispatch(
    ctx: &br_services::AppContext,
    credentials: &Credentials,
    action: AccountAction,
    format: OutputFormat,
) -> BrResult<()> {
    match action {
        AccountAction::Whoami => {
            let user = super::authenticate(ctx, credentials)?;
            let profile = ctx.profiles.profile(user.user_id)?;
            print_profile(&profile, format);
        }
        AccountAction::Register {
            run,
            dv,
            username,
            name,
            email,
            phone,
            photo,
            new_password,
        } => {
            let password = match new_password {
                Some(password) => password,
                None => Password::new()
                    .with_prompt("Choose a password")
                    .with_confirmation("Repeat password", "Passwords do not match")
                    .interact()
                    .map_err(|e| BrError::Internal(format!("password prompt failed: {e}")))?,
            };
            let registration = Registration {
                run,
                dv,
                username,
                name,
                email,
                phone,
                password,
                photo,
                rol_id: None,
            };
            let user = ctx.auth.register(&registration)?;
            let user_id = user.id.unwrap_or_default();
            match format {
                OutputFormat::Json => super::print_json(&serde_json::json!({ "user_id": user_id })),
                OutputFormat::Text => super::success(&format!("registered {} as user {user_id}", user.email)),
            }
        }
        AccountAction::Profile => {
            let user = super::authenticate(ctx, credentials)?;
            let profile = ctx.profiles.profile(user.user_id)?;
            print_profile(&profile, format);
        }
        AccountAction::Update {
            name,
            username,
            phone,
            run,
            dv,
        } => {
            let user = super::authenticate(ctx, credentials)?;
            let current = ctx.profiles.profile(user.user_id)?;
            let update = UserUpdate {
                name: name.unwrap_or(current.name),
                username: username.unwrap_or(current.username),
                phone: phone.unwrap_or(current.phone),
                run: run.unwrap_or(current.run),
                dv: dv.unwrap_or(current.dv),
            };
            let profile = ctx.profiles.update_user(user.user_id, &update)?;
            if let OutputFormat::Text = format {
                super::success("profile updated");
            }
            print_profile(&profile, format);
        }
        AccountAction::Photo { source } => {
            let user = super::authenticate(ctx, credentials)?;
            let profile = ctx.profiles.change_photo(user.user_id, &source)?;
            match format {
                OutputFormat::Json => print_profile(&profile, format),
                OutputFormat::Text => super::success(&format!("photo set to {}", profile.photo_url)),
            }
        }
        AccountAction::Password { new_password } => {
            let (identifier, current) = super::resolve_credentials(credentials)?;
            let resolved = Credentials {
                user: Some(identifier),
                password: Some(current.clone()),
            };
            let user = super::authenticate(ctx, &resolved)?;
            let new_password = match new_password {
                Some(password) => password,
                None => super::prompt_password("New password")?,
            };
            ctx.auth.change_password(user.user_id, &current, &new_password)?;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::json!({ "changed": true })),
                OutputFormat::Text => super::success("password changed"),
            }
        }
    }
    Ok(())
}

fn print_profile(profile: &UserProfile, format: OutputFormat) {
    match format {
        OutputFormat::Json => super::print_json(&serde_json::to_value(profile).unwrap_or_default()),
        OutputFormat::Text => {
            println!("{}", style(&profile.name).bold().underlined());
            println!("  User:   {} (#{})", profile.username, profile.user_id);
            println!("  Email:  {}", profile.email);
            println!("  Phone:  {}", profile.phone);
            println!("  RUN:    {}-{}", profile.run, profile.dv);
            println!("  Role:   {}", style(&profile.role_name).cyan());
            println!("  Photo:  {}", style(&profile.photo_url).dim());
        }
    }
}
