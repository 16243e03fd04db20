use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::{Button, ButtonMenu, InboundEvent};
use crate::fsm::{Stage, StageHandler};
use crate::transport::Transport;

/// Holding stage between the greeting and the profiling start button.
/// Never transitions; the way forward is the start-profiling callback.
pub struct AwaitingInputHandler {
    transport: Arc<dyn Transport>,
}

impl AwaitingInputHandler {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    fn start_menu() -> ButtonMenu {
        ButtonMenu::single(Button::callback("✨ Начать профайлинг", "start_profiling"))
    }
}

#[async_trait]
impl StageHandler for AwaitingInputHandler {
    async fn handle(&self, event: &InboundEvent, _stage: Stage) -> Result<()> {
        let asks_about_profiling = event
            .message_text()
            .map(|t| {
                let lower = t.to_lowercase();
                lower.contains("профайлинг") || lower.contains("профилирование")
            })
            .unwrap_or(false);

        let text = if asks_about_profiling {
            "Профайлинг — это процесс раскрытия твоей личности через серию \
             вопросов и анализ твоих ответов.\n\n\
             Первый этап — сбор базовой информации о тебе, включая натальные \
             данные (дата, время и место рождения).\n\n\
             Хочешь начать?"
        } else {
            "Спасибо за твое сообщение!\n\n\
             В данный момент я работаю в режиме ограниченной функциональности \
             и предлагаю тебе пройти профайлинг личности. Это поможет мне \
             лучше понять тебя и настроить наше взаимодействие."
        };

        self.transport
            .send_menu(&event.user_id, text, &Self::start_menu())
            .await?;
        Ok(())
    }
}
