use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::{Button, ButtonMenu, InboundEvent};
use crate::fsm::{Stage, StageHandler, transition};
use crate::store::ProfileStore;
use crate::transport::Transport;

/// First contact: greets the user and offers to start profiling.
pub struct InitialHandler {
    store: Arc<dyn ProfileStore>,
    transport: Arc<dyn Transport>,
}

impl InitialHandler {
    pub fn new(store: Arc<dyn ProfileStore>, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport }
    }
}

#[async_trait]
impl StageHandler for InitialHandler {
    async fn handle(&self, event: &InboundEvent, stage: Stage) -> Result<()> {
        let name = event.user_name.as_deref().unwrap_or("");
        let greeting = if name.is_empty() {
            "Привет! 👋".to_string()
        } else {
            format!("Привет, {name}! 👋")
        };

        let text = format!(
            "{greeting}\n\n\
             Я Mentora — твой личный AI-наставник для психологического роста и \
             самопознания.\n\n\
             Я могу помочь тебе лучше понять себя через профайлинг личности. \
             Это позволит раскрыть твои сильные стороны и потенциал развития.\n\n\
             Готова начать путь самопознания?"
        );

        self.transport
            .send_menu(
                &event.user_id,
                &text,
                &ButtonMenu::single(Button::callback("✨ Начать профайлинг", "start_profiling")),
            )
            .await?;

        transition(self.store.as_ref(), &event.user_id, stage, Stage::AwaitingInput).await?;
        Ok(())
    }
}
