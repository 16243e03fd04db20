//! Psychology questionnaire stage.
//!
//! Progress is the persisted `psychology_progress` integer; each answer is
//! persisted into `psychology_answers` as it arrives, so a restart resumes
//! at the unanswered question. After the final answer the generative
//! provider is called once and the result is stored as
//! `psychology_profile`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::{Button, ButtonMenu, InboundEvent};
use crate::fsm::{Stage, StageHandler, transition};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::prompts;
use crate::questionnaire;
use crate::store::ProfileStore;
use crate::transport::Transport;

pub struct PsychologyHandler {
    store: Arc<dyn ProfileStore>,
    transport: Arc<dyn Transport>,
    llm: Arc<dyn LlmProvider>,
}

impl PsychologyHandler {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        transport: Arc<dyn Transport>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            store,
            transport,
            llm,
        }
    }

    async fn progress(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .store
            .get_profile_field(user_id, "psychology_progress")
            .await?
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(0))
    }

    async fn ask_question(&self, user_id: &str, index: usize) -> Result<()> {
        let Some(question) = questionnaire::question(index) else {
            return Ok(());
        };

        let buttons = question
            .options
            .iter()
            .map(|option| {
                Button::callback(option.text, questionnaire::encode_answer(index, option.id))
            })
            .collect();

        let text = format!(
            "Вопрос {}/{}: {}",
            index + 1,
            questionnaire::total(),
            question.text
        );
        self.transport
            .send_menu(user_id, &text, &ButtonMenu::column(buttons))
            .await?;
        Ok(())
    }

    async fn process_answer(&self, event: &InboundEvent, stage: Stage, payload: &str) -> Result<()> {
        let Some((index, option_id)) = questionnaire::decode_answer(payload) else {
            tracing::warn!(user_id = %event.user_id, payload, "dropping malformed answer payload");
            return Ok(());
        };
        let (Some(question), Some(option)) = (
            questionnaire::question(index),
            questionnaire::option(index, option_id),
        ) else {
            tracing::warn!(user_id = %event.user_id, index, option_id,
                "dropping answer for unknown question or option");
            return Ok(());
        };

        // Persist the answer under its question index.
        let mut answers = self
            .store
            .get_profile_field(&event.user_id, "psychology_answers")
            .await?
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        answers.insert(
            index.to_string(),
            serde_json::json!({
                "question_id": question.id,
                "question_text": question.text,
                "option_id": option.id,
                "option_text": option.text,
            }),
        );

        let next = index + 1;
        let mut fields = crate::store::ProfileFields::new();
        fields.insert("psychology_answers".into(), answers.into());
        fields.insert(
            "psychology_progress".into(),
            next.min(questionnaire::total()).into(),
        );
        self.store
            .set_profile_fields(&event.user_id, fields)
            .await?;

        if next < questionnaire::total() {
            self.ask_question(&event.user_id, next).await
        } else {
            self.transport
                .send_text(
                    &event.user_id,
                    "Отлично! Ты ответила на все вопросы психологического \
                     опросника. Сейчас я анализирую твои ответы и формирую \
                     твой психологический профиль...",
                )
                .await?;
            self.generate_profile(event, stage).await
        }
    }

    /// One generative call over all answers plus natal data.
    async fn generate_profile(&self, event: &InboundEvent, stage: Stage) -> Result<()> {
        let fields = self
            .store
            .get_profile(&event.user_id)
            .await?
            .unwrap_or_default();

        let answered = fields
            .get("psychology_answers")
            .and_then(|v| v.as_object())
            .map(|m| m.len())
            .unwrap_or(0);
        if answered < questionnaire::total() {
            self.transport
                .send_text(
                    &event.user_id,
                    "Для генерации психологического профиля нужно ответить на \
                     все вопросы.",
                )
                .await?;
            return Ok(());
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(prompts::PROFILE_SYSTEM_PROMPT),
            ChatMessage::user(prompts::profile_prompt(&fields)),
        ])
        .with_max_tokens(2000)
        .with_temperature(0.7);

        let response = self.llm.complete(request).await?;
        tracing::info!(user_id = %event.user_id, model = self.llm.model_name(),
            "psychological profile generated");

        let mut update = crate::store::ProfileFields::new();
        update.insert(
            "psychology_profile".into(),
            serde_json::json!({ "generated_text": response.content }),
        );
        self.store.set_profile_fields(&event.user_id, update).await?;

        transition(
            self.store.as_ref(),
            &event.user_id,
            stage,
            Stage::ProfileReady,
        )
        .await?;

        self.transport
            .send_menu(
                &event.user_id,
                &format!(
                    "🧠 Твой психологический профиль готов!\n\n{}",
                    response.content
                ),
                &ButtonMenu::single(Button::callback(
                    "Перейти к следующему этапу",
                    "next_stage",
                )),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StageHandler for PsychologyHandler {
    async fn handle(&self, event: &InboundEvent, stage: Stage) -> Result<()> {
        if let Some(payload) = event.button_data() {
            return self.process_answer(event, stage, payload).await;
        }

        let progress = self.progress(&event.user_id).await?;
        if progress < questionnaire::total() {
            self.ask_question(&event.user_id, progress).await
        } else {
            // All answered but no profile yet (e.g. crash before the
            // generative call finished): retry generation.
            self.generate_profile(event, stage).await
        }
    }
}
