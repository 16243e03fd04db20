//! Transport-integration layer: the outermost error boundary and the
//! navigation callbacks that jump between stages.
//!
//! Stage handlers only ever advance along the profiling flow; jumps between
//! the steady-state stages (chat, recommendations, subscription) happen
//! here, by overwriting the stage and re-routing the event.

use std::sync::Arc;

use crate::error::Result;
use crate::event::{EventKind, InboundEvent};
use crate::fsm::{DialogueRouter, Stage};
use crate::store::ProfileStore;
use crate::transport::Transport;

const GENERIC_APOLOGY: &str =
    "Произошла ошибка при обработке сообщения. Пожалуйста, попробуй позже.";

pub struct Bot {
    store: Arc<dyn ProfileStore>,
    transport: Arc<dyn Transport>,
    router: Arc<DialogueRouter>,
}

impl Bot {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        transport: Arc<dyn Transport>,
        router: Arc<DialogueRouter>,
    ) -> Self {
        Self {
            store,
            transport,
            router,
        }
    }

    /// Process one event. Never returns an error: anything a handler fails
    /// on is logged and answered with a generic apology, so one bad event
    /// cannot take the poll loop down.
    pub async fn dispatch(&self, event: InboundEvent) {
        if let Err(e) = self.process(&event).await {
            tracing::error!(user_id = %event.user_id, error = %e, "event processing failed");
            if let Err(send_err) = self
                .transport
                .send_text(&event.user_id, GENERIC_APOLOGY)
                .await
            {
                tracing::error!(user_id = %event.user_id, error = %send_err,
                    "failed to deliver apology");
            }
        }
    }

    async fn process(&self, event: &InboundEvent) -> Result<()> {
        if let EventKind::Voice(_) = event.kind {
            // No speech-to-text yet.
            self.transport
                .send_text(
                    &event.user_id,
                    "Получено голосовое сообщение. Функция преобразования \
                     голоса в текст будет добавлена позже.",
                )
                .await?;
            return Ok(());
        }

        if let Some(data) = event.button_data() {
            match data {
                "start_profiling" => {
                    self.jump(&event.user_id, Stage::RegistrationStart).await?;
                    // Re-route so the registration handler prompts right away.
                    return self.router.route(&synthetic(event)).await;
                }
                "continue_profiling" => {
                    self.transport
                        .send_text(
                            &event.user_id,
                            "Отлично! Теперь переходим ко второму этапу \
                             профайлинга — психологическому опроснику. Этот \
                             этап поможет мне лучше понять твои \
                             психологические особенности, ценности и \
                             предпочтения.",
                        )
                        .await?;
                    self.jump(&event.user_id, Stage::ProfilingPsychology).await?;
                    return self.router.route(&synthetic(event)).await;
                }
                "subscribe" => {
                    // The subscription handler shows the plans for this
                    // same event.
                    self.jump(&event.user_id, Stage::Subscription).await?;
                    return self.router.route(event).await;
                }
                "open_chat" => {
                    self.jump(&event.user_id, Stage::Chat).await?;
                    self.transport
                        .send_text(
                            &event.user_id,
                            "Я слушаю! Напиши мне, что у тебя на душе. 💬",
                        )
                        .await?;
                    return Ok(());
                }
                "open_recommendations" => {
                    self.jump(&event.user_id, Stage::Recommendation).await?;
                    self.transport
                        .send_text(
                            &event.user_id,
                            "Здесь я делюсь персональными рекомендациями и \
                             практиками.\n\n\
                             /recommendation — рекомендация на сегодня\n\
                             /practice — выбрать практику",
                        )
                        .await?;
                    return Ok(());
                }
                _ => {}
            }
        }

        self.router.route(event).await
    }

    async fn jump(&self, user_id: &str, target: Stage) -> Result<()> {
        self.store.set_user_stage(user_id, target).await?;
        tracing::info!(user_id, stage = %target, "navigation jump");
        Ok(())
    }
}

/// A synthetic text event re-routed after a navigation jump.
fn synthetic(event: &InboundEvent) -> InboundEvent {
    let mut synthetic = InboundEvent::text(event.user_id.clone(), "");
    synthetic.user_name = event.user_name.clone();
    synthetic
}
