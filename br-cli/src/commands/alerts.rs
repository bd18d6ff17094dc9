//! Alert broadcast and notification inbox commands.

use clap::Subcommand;
use console::style;

use br_core::config::ConfigHandle;
use br_core::error::{BrError, BrResult};
use br_services::AppContext;

use crate::{Credentials, OutputFormat};

#[derive(Subcommand)]
pub enum AlertsAction {
    /// Send an alert to every registered user.
    Broadcast {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
    },
    /// Withdraw a broadcast from every inbox.
    Withdraw {
        /// Alert template id.
        id: i64,
    },
    /// List sent alerts with their read counts.
    List,
}

#[derive(Subcommand)]
pub enum NotificationsAction {
    /// Show your inbox.
    List,
    /// Mark one notification read.
    Read {
        id: i64,
    },
    /// Mark every notification read.
    ReadAll,
    /// Delete one notification.
    Delete {
        id: i64,
    },
    /// Delete every notification.
    DeleteAll,
}

pub async fn run_alerts(
    config: ConfigHandle,
    credentials: Credentials,
    action: AlertsAction,
    format: OutputFormat,
) -> BrResult<()> {
    let (ctx, events) = super::open_context(&config).await?;
    let result = dispatch_alerts(&ctx, &credentials, action, format);
    super::close_context(ctx, events).await;
    result
}

fn dispatch_alerts(ctx: &AppContext, credentials: &Credentials, action: AlertsAction, format: OutputFormat) -> BrResult<()> {
    let user = super::authenticate(ctx, credentials)?;
    if !user.is_admin() {
        return Err(BrError::validation("role", "only administrators can manage alerts"));
    }

    match action {
        AlertsAction::Broadcast { title, body } => {
            let receipt = ctx.alerts.broadcast_alert(user.user_id, &title, &body)?;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::json!({
                    "template_id": receipt.template_id,
                    "recipients": receipt.recipients,
                })),
                OutputFormat::Text => super::success(&format!(
                    "alert {} sent to {} user(s)",
                    receipt.template_id, receipt.recipients
                )),
            }
        }
        AlertsAction::Withdraw { id } => {
            let copies = ctx.alerts.withdraw_alert(id)?;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::json!({ "withdrawn": copies })),
                OutputFormat::Text => super::success(&format!("alert {id} withdrawn from {copies} inbox(es)")),
            }
        }
        AlertsAction::List => {
            let templates = ctx.alerts.templates()?;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::to_value(&templates)?),
                OutputFormat::Text => {
                    if templates.is_empty() {
                        println!("No alerts sent.");
                        return Ok(());
                    }
                    let mut table = super::new_table(vec!["ID", "Title", "Sent", "Read", "Status"]);
                    for summary in &templates {
                        let template = &summary.template;
                        let status = if template.withdrawn {
                            style("withdrawn").dim().to_string()
                        } else {
                            style("active").green().to_string()
                        };
                        table.add_row(vec![
                            template.id.unwrap_or_default().to_string(),
                            super::truncate(&template.title, 40),
                            super::format_millis(template.created_at),
                            format!("{}/{}", summary.read_count, summary.recipients),
                            status,
                        ]);
                    }
                    println!("{table}");
                }
            }
        }
    }
    Ok(())
}

pub async fn run_notifications(
    config: ConfigHandle,
    credentials: Credentials,
    action: NotificationsAction,
    format: OutputFormat,
) -> BrResult<()> {
    let (ctx, events) = super::open_context(&config).await?;
    let result = dispatch_notifications(&ctx, &credentials, action, format);
    super::close_context(ctx, events).await;
    result
}

fn dispatch_notifications(
    ctx: &AppContext,
    credentials: &Credentials,
    action: NotificationsAction,
    format: OutputFormat,
) -> BrResult<()> {
    let user = super::authenticate(ctx, credentials)?;

    let changed = match action {
        NotificationsAction::List => {
            let inbox = ctx.alerts.notifications(user.user_id)?;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::to_value(&inbox)?),
                OutputFormat::Text => {
                    if inbox.is_empty() {
                        println!("Inbox is empty.");
                        return Ok(());
                    }
                    let mut table = super::new_table(vec!["ID", "", "Title", "Message", "Received"]);
                    for copy in &inbox {
                        let marker = if copy.read { " ".to_string() } else { style("●").blue().to_string() };
                        table.add_row(vec![
                            copy.id.unwrap_or_default().to_string(),
                            marker,
                            super::truncate(&copy.title, 30),
                            super::truncate(&copy.body, 50),
                            super::format_millis(copy.created_at),
                        ]);
                    }
                    println!("{table}");
                    let unread = inbox.iter().filter(|c| !c.read).count();
                    println!("{unread} unread of {}", inbox.len());
                }
            }
            return Ok(());
        }
        NotificationsAction::Read { id } => {
            ctx.alerts.mark_read(user.user_id, id)?;
            1
        }
        NotificationsAction::Delete { id } => {
            ctx.alerts.mark_deleted(user.user_id, id)?;
            1
        }
        NotificationsAction::ReadAll => ctx.alerts.mark_all_read(user.user_id)?,
        NotificationsAction::DeleteAll => ctx.alerts.mark_all_deleted(user.user_id)?,
    };

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({ "changed": changed })),
        OutputFormat::Text => super::success(&format!("{changed} notification(s) updated")),
    }
    Ok(())
}
