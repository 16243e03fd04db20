//! Free-form chat with the mentor persona.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::{Button, ButtonMenu, InboundEvent};
use crate::fsm::{Stage, StageHandler};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::prompts;
use crate::store::ProfileStore;
use crate::subscription::SubscriptionGate;
use crate::transport::Transport;

/// How many history messages ride along with each completion.
const HISTORY_LIMIT: usize = 10;

pub struct ChatHandler {
    store: Arc<dyn ProfileStore>,
    transport: Arc<dyn Transport>,
    llm: Arc<dyn LlmProvider>,
    gate: Arc<dyn SubscriptionGate>,
}

impl ChatHandler {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        transport: Arc<dyn Transport>,
        llm: Arc<dyn LlmProvider>,
        gate: Arc<dyn SubscriptionGate>,
    ) -> Self {
        Self {
            store,
            transport,
            llm,
            gate,
        }
    }
}

#[async_trait]
impl StageHandler for ChatHandler {
    async fn handle(&self, event: &InboundEvent, _stage: Stage) -> Result<()> {
        let Some(user_message) = event.message_text() else {
            return Ok(());
        };

        if !self.gate.has_active_subscription(&event.user_id).await {
            self.transport
                .send_menu(
                    &event.user_id,
                    "Для общения с AI-наставником необходима активная \
                     подписка. Пожалуйста, выбери подходящий план подписки.",
                    &ButtonMenu::single(Button::callback(
                        "Выбрать план подписки",
                        "subscribe",
                    )),
                )
                .await?;
            return Ok(());
        }

        let history = self
            .store
            .recent_history(&event.user_id, HISTORY_LIMIT)
            .await?;

        let mut messages = vec![ChatMessage::system(prompts::MENTOR_SYSTEM_PROMPT)];
        for entry in history {
            messages.push(if entry.role == "user" {
                ChatMessage::user(entry.content)
            } else {
                ChatMessage::assistant(entry.content)
            });
        }
        messages.push(ChatMessage::user(user_message));

        let request = CompletionRequest::new(messages)
            .with_max_tokens(2000)
            .with_temperature(0.7);
        let response = self.llm.complete(request).await?;

        self.store
            .append_history(&event.user_id, "user", user_message)
            .await?;
        self.store
            .append_history(&event.user_id, "assistant", &response.content)
            .await?;

        self.transport
            .send_text(&event.user_id, &response.content)
            .await?;
        Ok(())
    }
}
