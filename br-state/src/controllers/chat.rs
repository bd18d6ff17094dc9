//! Support chat screen.
//!
//! Sending starts the simulated support reply inside the controller's scope,
//! so closing the screen during the delay means the reply is never stored.
//! Logging out does the same and empties the conversation.

use std::sync::Arc;

use br_core::error::BrResult;
use br_models::queries::ChatMessage;
use br_services::{ChatRepository, Session};

use super::{blocking, failure_text, follow, SessionBinding, SIGNED_OUT};
use crate::scope::TaskScope;
use crate::state::StateHolder;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatState {
    pub conversation_id: Option<i64>,
    pub loading: bool,
    pub messages: Vec<ChatMessage>,
    pub draft: String,
    pub can_send: bool,
    /// A message went out and the support reply has not arrived yet.
    pub awaiting_reply: bool,
    /// The owning user logged out.
    pub signed_out: bool,
    pub error: Option<String>,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            conversation_id: None,
            loading: true,
            messages: Vec::new(),
            draft: String::new(),
            can_send: false,
            awaiting_reply: false,
            signed_out: false,
            error: None,
        }
    }
}

impl ChatState {
    fn close(&mut self) {
        *self = Self {
            loading: false,
            signed_out: true,
            ..Self::default()
        };
    }

    fn revalidate(&mut self) {
        self.can_send = self.conversation_id.is_some() && !self.draft.trim().is_empty();
    }
}

pub struct ChatController {
    binding: SessionBinding,
    chat: ChatRepository,
    state: StateHolder<ChatState>,
    scope: Arc<TaskScope>,
}

impl ChatController {
    /// Open (or create) the logged-in user's conversation with support.
    pub fn support(chat: ChatRepository, session: &Session) -> BrResult<Self> {
        let controller = Self::bare(chat, SessionBinding::new(session)?);
        let user_id = controller.binding.user_id();

        let repo = controller.chat.clone();
        let state = controller.state.clone();
        let scope_chat = controller.chat.clone();
        let live_state = controller.state.clone();
        // The live listing can only start once the conversation id is known.
        controller.scope.spawn(async move {
            match blocking(move || repo.support_conversation_for(user_id)).await {
                Ok(conversation) => {
                    let id = conversation.id.unwrap_or_default();
                    state.update(|s| {
                        s.conversation_id = Some(id);
                        s.revalidate();
                    });
                    stream_messages(scope_chat, id, live_state).await;
                }
                Err(e) => {
                    let text = failure_text("open support chat", &e);
                    state.update(|s| {
                        s.loading = false;
                        s.error = Some(text);
                    });
                }
            }
        });
        controller.close_on_logout();
        Ok(controller)
    }

    /// Open an existing conversation.
    pub fn conversation(chat: ChatRepository, session: &Session, conversation_id: i64) -> BrResult<Self> {
        let controller = Self::bare(chat, SessionBinding::new(session)?);
        controller.state.update(|s| {
            s.conversation_id = Some(conversation_id);
            s.revalidate();
        });
        follow(
            &controller.scope,
            controller.chat.observe_messages(conversation_id),
            controller.state.clone(),
            apply_messages,
        );
        controller.close_on_logout();
        Ok(controller)
    }

    fn bare(chat: ChatRepository, binding: SessionBinding) -> Self {
        Self {
            binding,
            chat,
            state: StateHolder::new(ChatState::default()),
            scope: Arc::new(TaskScope::new()),
        }
    }

    fn close_on_logout(&self) {
        self.binding
            .end_with_session(&self.scope, self.state.clone(), ChatState::close);
    }

    /// Id of the owning user while still logged in.
    fn active_user_id(&self) -> Option<i64> {
        let user_id = self.binding.active().map(|user| user.user_id);
        if user_id.is_none() {
            self.state.update(|s| s.error = Some(SIGNED_OUT.into()));
        }
        user_id
    }

    pub fn state(&self) -> &StateHolder<ChatState> {
        &self.state
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    pub fn set_draft(&self, value: &str) {
        self.state.update(|s| {
            s.draft = value.to_string();
            s.revalidate();
        });
    }

    /// Send the draft and schedule the support reply.
    pub fn send(&self) {
        let current = self.state.snapshot();
        let Some(conversation_id) = current.conversation_id.filter(|_| current.can_send) else {
            return;
        };
        let Some(sender) = self.active_user_id() else {
            return;
        };
        let body = current.draft.trim().to_string();
        self.state.update(|s| {
            s.draft.clear();
            s.awaiting_reply = true;
            s.error = None;
            s.revalidate();
        });

        let chat = self.chat.clone();
        let state = self.state.clone();
        self.scope.spawn(async move {
            let result = chat.send_with_simulated_reply(conversation_id, sender, body).await;
            state.update(|s| {
                s.awaiting_reply = false;
                if let Err(e) = &result {
                    s.error = Some(failure_text("send message", e));
                }
            });
        });
    }

    /// Mark everything the other side sent as read.
    pub fn mark_read(&self) {
        let Some(conversation_id) = self.state.snapshot().conversation_id else {
            return;
        };
        let Some(reader) = self.active_user_id() else {
            return;
        };
        let chat = self.chat.clone();
        let state = self.state.clone();
        self.scope.spawn(async move {
            if let Err(e) = blocking(move || chat.mark_conversation_read(conversation_id, reader)).await {
                let text = failure_text("mark chat read", &e);
                state.update(|s| s.error = Some(text));
            }
        });
    }

    pub fn clear_messages(&self) {
        self.state.update(|s| s.error = None);
    }
}

fn apply_messages(s: &mut ChatState, result: br_models::LiveResult<Vec<ChatMessage>>) {
    s.loading = false;
    match result {
        Ok(messages) => s.messages = messages,
        Err(e) => s.error = Some(e.to_string()),
    }
}

async fn stream_messages(chat: ChatRepository, conversation_id: i64, state: StateHolder<ChatState>) {
    let mut live = chat.observe_messages(conversation_id);
    while let Some(result) = live.next().await {
        state.update(|s| apply_messages(s, result));
    }
}
