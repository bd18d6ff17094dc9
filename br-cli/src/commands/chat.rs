//! Support chat commands.

use clap::Subcommand;
use console::style;

use br_core::config::ConfigHandle;
use br_core::error::BrResult;
use br_models::queries::ChatMessage;

use crate::{Credentials, OutputFormat};

#[derive(Subcommand)]
pub enum ChatAction {
    /// Send a message to support and wait for the reply.
    Send {
        /// Message text.
        body: String,
    },
    /// Show the support conversation.
    History {
        /// Only the last N messages.
        #[arg(short = 'n', long, default_value = "30")]
        limit: usize,
    },
    /// List your conversations.
    Conversations,
}

pub async fn run(
    config: ConfigHandle,
    credentials: Credentials,
    action: ChatAction,
    format: OutputFormat,
) -> BrResult<()> {
    let (ctx, events) = super::open_context(&config).await?;
    let result: BrResult<()> = async {
        let user = super::authenticate(&ctx, &credentials)?;
        match action {
            ChatAction::Send { body } => {
                let conversation = ctx.chat.support_conversation_for(user.user_id)?;
                let conversation_id = conversation.id.unwrap_or_default();
                if let OutputFormat::Text = format {
                    println!("  {} waiting for support...", style("...").dim());
                }
                let (sent, reply) = ctx
                    .chat
                    .send_with_simulated_reply(conversation_id, user.user_id, body)
                    .await?;
                match format {
                    OutputFormat::Json => super::print_json(&serde_json::json!({
                        "conversation_id": conversation_id,
                        "sent": sent,
                        "reply": reply,
                    })),
                    OutputFormat::Text => {
                        println!("{} {}", style("you:").bold(), sent.body);
                        println!("{} {}", style("support:").cyan().bold(), reply.body);
                    }
                }
            }
            ChatAction::History { limit } => {
                let conversation = ctx.chat.support_conversation_for(user.user_id)?;
                let conversation_id = conversation.id.unwrap_or_default();
                let messages = ctx.chat.messages(conversation_id)?;
                ctx.chat.mark_conversation_read(conversation_id, user.user_id)?;
                let skip = messages.len().saturating_sub(limit);
                print_messages(&messages[skip..], user.user_id, format);
            }
            ChatAction::Conversations => {
                let conversations = ctx.chat.conversations(user.user_id)?;
                match format {
                    OutputFormat::Json => super::print_json(&serde_json::to_value(&conversations)?),
                    OutputFormat::Text => {
                        let mut table = super::new_table(vec!["ID", "Name", "Members", "Last message", "Unread"]);
                        for summary in &conversations {
                            table.add_row(vec![
                                summary.conversation.id.unwrap_or_default().to_string(),
                                summary.conversation.name.clone(),
                                summary.participant_count.to_string(),
                                super::truncate(summary.last_message.as_deref().unwrap_or("-"), 40),
                                summary.unread_count.to_string(),
                            ]);
                        }
                        println!("{table}");
                    }
                }
            }
        }
        Ok(())
    }
    .await;
    super::close_context(ctx, events).await;
    result
}

fn print_messages(messages: &[ChatMessage], me: i64, format: OutputFormat) {
    match format {
        OutputFormat::Json => super::print_json(&serde_json::to_value(messages).unwrap_or_default()),
        OutputFormat::Text => {
            if messages.is_empty() {
                println!("No messages yet.");
                return;
            }
            for entry in messages {
                let time = super::format_millis(entry.message.created_at);
                let who = if entry.message.sender_id == me {
                    style("you".to_string()).bold()
                } else {
                    style(entry.sender_username.clone()).cyan().bold()
                };
                println!("{} {who}: {}", style(time).dim(), entry.message.body);
            }
        }
    }
}
