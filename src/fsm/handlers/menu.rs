use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::{Button, ButtonMenu, InboundEvent};
use crate::fsm::{Stage, StageHandler};
use crate::transport::Transport;

/// Main menu, shown once profiling is complete. Never transitions; the menu
/// buttons are navigation callbacks handled by the dispatcher.
pub struct MenuHandler {
    transport: Arc<dyn Transport>,
}

impl MenuHandler {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl StageHandler for MenuHandler {
    async fn handle(&self, event: &InboundEvent, _stage: Stage) -> Result<()> {
        let menu = ButtonMenu::column(vec![
            Button::callback("💬 Чат с наставником", "open_chat"),
            Button::callback("🌱 Рекомендации и практики", "open_recommendations"),
            Button::callback("⭐ Подписка", "subscribe"),
        ]);

        self.transport
            .send_menu(
                &event.user_id,
                "Твой профиль готов! Чем займемся дальше?",
                &menu,
            )
            .await?;
        Ok(())
    }
}
