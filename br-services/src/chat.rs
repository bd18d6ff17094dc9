//! Chat repository: conversations, messages and the simulated support reply.
//!
//! There is no messaging backend. A message sent with
//! [`ChatRepository::send_with_simulated_reply`] is stored at once and, after
//! a fixed delay, answered by the support account. Dropping that future
//! before the delay elapses cancels the reply; nothing is stored for it.

use std::time::Duration;

use tracing::{debug, info, warn};

use br_core::config::ChatConfig;
use br_core::error::{BrError, BrResult};
use br_models::queries::{self, ChatMessage, ConversationSummary};
use br_models::{
    now_millis, Conversation, ConversationKind, Database, LiveQuery, Message, Participant, Table, User,
};
use rusqlite::Connection;

use crate::event_bus::{AppEvent, EventBus};
use crate::service::{impl_service, ServiceState};

#[derive(Clone)]
pub struct ChatRepository {
    state: ServiceState,
    database: Database,
    event_bus: EventBus,
    config: ChatConfig,
}

impl ChatRepository {
    pub fn new(database: Database, event_bus: EventBus, config: ChatConfig) -> Self {
        Self {
            state: ServiceState::Created,
            database,
            event_bus,
            config,
        }
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.config.reply_delay_ms)
    }

    /// Create a conversation with the given participants.
    pub fn create_conversation(
        &self,
        name: &str,
        kind: ConversationKind,
        participants: &[i64],
    ) -> BrResult<Conversation> {
        if kind == ConversationKind::Individual && participants.len() != 2 {
            return Err(BrError::validation(
                "participants",
                "an individual conversation has exactly two participants",
            ));
        }
        let conversation = self.database.write(|conn| {
            let now = now_millis();
            let mut conversation = Conversation::new(name.trim(), kind, now);
            let id = conversation.insert(conn)?;
            for user_id in participants {
                Participant::upsert(conn, id, *user_id, now)?;
            }
            Ok(conversation)
        })?;
        info!("conversation {:?} created with {} participant(s)", conversation.id, participants.len());
        Ok(conversation)
    }

    /// Add (or re-add) a participant.
    pub fn add_participant(&self, conversation_id: i64, user_id: i64) -> BrResult<()> {
        self.database.write(|conn| {
            if Conversation::find_by_id(conn, conversation_id)?.is_none() {
                return Err(BrError::not_found("conversation", conversation_id));
            }
            Participant::upsert(conn, conversation_id, user_id, now_millis())
        })
    }

    pub fn remove_participant(&self, conversation_id: i64, user_id: i64) -> BrResult<bool> {
        self.database
            .write(|conn| Participant::remove(conn, conversation_id, user_id))
    }

    /// Id of the support account: looked up by username, falling back to the
    /// configured id when no such user exists.
    fn support_user_id(&self, conn: &Connection) -> BrResult<i64> {
        match User::find_by_username(conn, &self.config.support_username)? {
            Some(user) => user
                .id
                .ok_or_else(|| BrError::Internal("stored user without id".into())),
            None => {
                warn!(
                    "support user {:?} not found, replying as user {}",
                    self.config.support_username, self.config.support_fallback_user_id
                );
                Ok(self.config.support_fallback_user_id)
            }
        }
    }

    /// The individual conversation between `user_id` and support, created on first use.
    pub fn support_conversation_for(&self, user_id: i64) -> BrResult<Conversation> {
        self.database.write(|conn| {
            let support_id = self.support_user_id(conn)?;
            if support_id == user_id {
                return Err(BrError::validation("user", "the support account cannot open a support chat"));
            }
            if let Some(existing) = Conversation::find_individual_between(conn, user_id, support_id)? {
                return Ok(existing);
            }

            let now = now_millis();
            let mut conversation = Conversation::new("Soporte", ConversationKind::Individual, now);
            let id = conversation.insert(conn)?;
            Participant::upsert(conn, id, user_id, now)?;
            Participant::upsert(conn, id, support_id, now)?;
            info!("opened support conversation {id} for user {user_id}");
            Ok(conversation)
        })
    }

    /// Store an outgoing message. Outgoing messages are read by definition.
    pub fn send_message(&self, conversation_id: i64, sender_id: i64, body: &str) -> BrResult<Message> {
        let body = body.trim();
        if body.is_empty() {
            return Err(BrError::validation("body", "message is empty"));
        }

        let message = self.database.write(|conn| {
            if !Participant::is_member(conn, conversation_id, sender_id)? {
                return Err(BrError::not_found("participant", format!("{sender_id} in {conversation_id}")));
            }
            let mut message = Message::chat(conversation_id, sender_id, body, true, now_millis());
            message.insert(conn)?;
            Ok(message)
        })?;

        let message_id = message.id.unwrap_or_default();
        debug!("message {message_id} stored in conversation {conversation_id}");
        self.event_bus.emit(AppEvent::ChatMessageSent { conversation_id, message_id });
        Ok(message)
    }

    /// Store the support account's reply in a conversation.
    pub fn insert_support_reply(&self, conversation_id: i64) -> BrResult<Message> {
        let reply = self.database.write(|conn| {
            let support_id = self.support_user_id(conn)?;
            let now = now_millis();
            if !Participant::is_member(conn, conversation_id, support_id)? {
                Participant::upsert(conn, conversation_id, support_id, now)?;
            }
            let mut reply = Message::chat(conversation_id, support_id, self.config.reply_text.as_str(), false, now);
            reply.insert(conn)?;
            Ok(reply)
        })?;

        let message_id = reply.id.unwrap_or_default();
        info!("support replied in conversation {conversation_id}");
        self.event_bus.emit(AppEvent::SupportReplyDelivered { conversation_id, message_id });
        Ok(reply)
    }

    /// Send a message, wait `reply_delay_ms`, then store the support reply.
    ///
    /// Store access runs on the blocking pool. Dropping the returned future
    /// during the delay cancels the reply.
    pub async fn send_with_simulated_reply(
        &self,
        conversation_id: i64,
        sender_id: i64,
        body: String,
    ) -> BrResult<(Message, Message)> {
        let repo = self.clone();
        let sent = tokio::task::spawn_blocking(move || repo.send_message(conversation_id, sender_id, &body))
            .await
            .map_err(|e| BrError::Internal(format!("send task failed: {e}")))??;

        tokio::time::sleep(self.reply_delay()).await;

        let repo = self.clone();
        let reply = tokio::task::spawn_blocking(move || repo.insert_support_reply(conversation_id))
            .await
            .map_err(|e| BrError::Internal(format!("reply task failed: {e}")))??;

        Ok((sent, reply))
    }

    /// Mark every message in a conversation not sent by `reader` as read.
    pub fn mark_conversation_read(&self, conversation_id: i64, reader: i64) -> BrResult<usize> {
        self.database
            .write(|conn| Message::mark_conversation_read(conn, conversation_id, reader))
    }

    pub fn messages(&self, conversation_id: i64) -> BrResult<Vec<ChatMessage>> {
        self.database
            .read(|conn| queries::messages_for_conversation(conn, conversation_id))
    }

    pub fn conversations(&self, user_id: i64) -> BrResult<Vec<ConversationSummary>> {
        self.database.read(|conn| queries::conversations_for_user(conn, user_id))
    }

    // ─── Live queries ────────────────────────────────────────────────────

    /// Messages in delivery order (`created_at`, then id).
    pub fn observe_messages(&self, conversation_id: i64) -> LiveQuery<Vec<ChatMessage>> {
        self.database.watch(&[Table::Messages, Table::Users], move |conn| {
            queries::messages_for_conversation(conn, conversation_id)
        })
    }

    pub fn observe_conversations(&self, user_id: i64) -> LiveQuery<Vec<ConversationSummary>> {
        self.database.watch(
            &[Table::Conversations, Table::ConversationParticipants, Table::Messages],
            move |conn| queries::conversations_for_user(conn, user_id),
        )
    }
}

impl_service!(ChatRepository, "chat");
