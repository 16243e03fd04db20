//! Recommendations and practices stage: `/recommendation`, `/practice`,
//! practice-type buttons, and meditation audio.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::{Button, ButtonMenu, InboundEvent};
use crate::fsm::{Stage, StageHandler};
use crate::recommend::{PracticeType, RecommendationService};
use crate::subscription::SubscriptionGate;
use crate::transport::Transport;

const PROFILE_REQUIRED: &str =
    "Для получения рекомендаций необходимо сначала пройти профайлинг.";

pub struct RecommendationHandler {
    transport: Arc<dyn Transport>,
    recommend: Arc<RecommendationService>,
    gate: Arc<dyn SubscriptionGate>,
}

impl RecommendationHandler {
    pub fn new(
        transport: Arc<dyn Transport>,
        recommend: Arc<RecommendationService>,
        gate: Arc<dyn SubscriptionGate>,
    ) -> Self {
        Self {
            transport,
            recommend,
            gate,
        }
    }

    async fn send_daily(&self, user_id: &str) -> Result<()> {
        self.transport
            .send_text(user_id, "Генерирую персонализированную рекомендацию... 🤔")
            .await?;

        match self.recommend.daily_recommendation(user_id).await? {
            Some(text) => self.transport.send_text(user_id, &text).await?,
            None => self.transport.send_text(user_id, PROFILE_REQUIRED).await?,
        }
        Ok(())
    }

    async fn send_practice_menu(&self, user_id: &str) -> Result<()> {
        let buttons = |types: &[PracticeType]| {
            types
                .iter()
                .map(|t| Button::callback(t.label(), format!("practice_{}", t.as_str())))
                .collect::<Vec<_>>()
        };
        let menu = ButtonMenu::rows(vec![
            buttons(&[PracticeType::Mindfulness, PracticeType::Stress]),
            buttons(&[PracticeType::Sleep, PracticeType::Energy]),
        ]);

        self.transport
            .send_menu(user_id, "Выбери тип практики:", &menu)
            .await?;
        Ok(())
    }

    async fn send_practice(&self, user_id: &str, practice: PracticeType) -> Result<()> {
        self.transport
            .send_text(user_id, "Генерирую персонализированную практику... 🤔")
            .await?;

        match self.recommend.generate_practice(user_id, practice).await? {
            Some(text) if self.recommend.audio_enabled() => {
                self.transport
                    .send_menu(
                        user_id,
                        &text,
                        &ButtonMenu::single(Button::callback(
                            "🎧 Аудио-версия",
                            format!("meditation_{}", practice.as_str()),
                        )),
                    )
                    .await?;
            }
            Some(text) => self.transport.send_text(user_id, &text).await?,
            None => self.transport.send_text(user_id, PROFILE_REQUIRED).await?,
        }
        Ok(())
    }

    async fn send_meditation(&self, user_id: &str, practice: PracticeType) -> Result<()> {
        if !self.recommend.audio_enabled() {
            self.transport
                .send_text(user_id, "Аудио-версия сейчас недоступна.")
                .await?;
            return Ok(());
        }
        self.transport
            .send_text(user_id, "Готовлю аудио-медитацию... 🎧")
            .await?;

        match self.recommend.meditation_audio(user_id, practice).await? {
            Some(audio) => {
                self.transport
                    .send_voice(user_id, audio, practice.label())
                    .await?;
            }
            None => self.transport.send_text(user_id, PROFILE_REQUIRED).await?,
        }
        Ok(())
    }

    async fn send_usage_hint(&self, user_id: &str) -> Result<()> {
        self.transport
            .send_text(
                user_id,
                "Здесь я делюсь персональными рекомендациями и практиками.\n\n\
                 /recommendation — рекомендация на сегодня\n\
                 /practice — выбрать практику",
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StageHandler for RecommendationHandler {
    async fn handle(&self, event: &InboundEvent, _stage: Stage) -> Result<()> {
        if !self.gate.has_active_subscription(&event.user_id).await {
            self.transport
                .send_menu(
                    &event.user_id,
                    "Для получения персонализированных рекомендаций и практик \
                     необходима активная подписка. Пожалуйста, выбери \
                     подходящий план.",
                    &ButtonMenu::single(Button::callback(
                        "Выбрать план подписки",
                        "subscribe",
                    )),
                )
                .await?;
            return Ok(());
        }

        if let Some(data) = event.button_data() {
            if let Some(practice) = data
                .strip_prefix("practice_")
                .and_then(PracticeType::parse)
            {
                return self.send_practice(&event.user_id, practice).await;
            }
            if let Some(practice) = data
                .strip_prefix("meditation_")
                .and_then(PracticeType::parse)
            {
                return self.send_meditation(&event.user_id, practice).await;
            }
            tracing::warn!(user_id = %event.user_id, data, "unknown recommendation callback");
            return Ok(());
        }

        match event.message_text().map(str::trim) {
            Some("/recommendation") => self.send_daily(&event.user_id).await,
            Some("/practice") => self.send_practice_menu(&event.user_id).await,
            _ => self.send_usage_hint(&event.user_id).await,
        }
    }
}
