//! CLI command implementations.

pub mod init;
pub mod account;
pub mod incidents;
pub mod alerts;
pub mod chat;
pub mod db;
pub mod config;

use std::time::Duration;

use chrono::{Local, TimeZone};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;
use dialoguer::Password;
use tokio::task::JoinHandle;
use tracing::debug;

use br_core::config::ConfigHandle;
use br_core::error::{BrError, BrResult};
use br_services::{AppContext, SessionUser};

use crate::Credentials;

/// How long `close_context` waits for the event log to catch up.
const EVENT_LOG_DRAIN: Duration = Duration::from_millis(500);

/// Open the store, bring up the repositories from config and start
/// logging their events.
pub async fn open_context(config: &ConfigHandle) -> BrResult<(AppContext, JoinHandle<()>)> {
    let config = config.read().await.clone();
    let ctx = AppContext::bootstrap(config)?;
    let events = ctx.event_bus.spawn_logger();
    Ok((ctx, events))
}

/// Stop the repositories, then let the event log write what is left.
pub async fn close_context(mut ctx: AppContext, events: JoinHandle<()>) {
    ctx.shutdown();
    drop(ctx);
    if tokio::time::timeout(EVENT_LOG_DRAIN, events).await.is_err() {
        debug!("event log still draining at exit");
    }
}

/// The `--user` flag plus its password, prompting when `--password` was not given.
pub fn resolve_credentials(credentials: &Credentials) -> BrResult<(String, String)> {
    let user = credentials
        .user
        .clone()
        .ok_or_else(|| BrError::validation("user", "pass --user <email or username>"))?;
    let password = match &credentials.password {
        Some(password) => password.clone(),
        None => prompt_password(&format!("Password for {user}"))?,
    };
    Ok((user, password))
}

pub fn prompt_password(prompt: &str) -> BrResult<String> {
    Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| BrError::Internal(format!("password prompt failed: {e}")))
}

/// Log in as the `--user` account and return the session user.
pub fn authenticate(ctx: &AppContext, credentials: &Credentials) -> BrResult<SessionUser> {
    let (user, password) = resolve_credentials(credentials)?;
    ctx.auth.login(&user, &password)?;
    ctx.session.require()
}

/// Table with the standard CLI look.
pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

pub fn success(message: &str) {
    println!("{} {message}", style("✓").green().bold());
}

pub fn report_error(err: &BrError) {
    eprintln!("{} {}", style("error:").red().bold(), err.user_message());
}

/// Local date and time of a millisecond timestamp.
pub fn format_millis(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Truncate to `max_len` characters, appending an ellipsis if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    } else {
        s.chars().take(max_len).collect()
    }
}
