//! Personalized recommendations, guided practices, and meditation audio.

use std::sync::Arc;

use crate::error::Error;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::prompts;
use crate::store::ProfileStore;
use crate::tts::{TtsProvider, VoiceParams};

/// Supported practice kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticeType {
    Mindfulness,
    Stress,
    Sleep,
    Energy,
}

impl PracticeType {
    pub const ALL: [PracticeType; 4] = [
        PracticeType::Mindfulness,
        PracticeType::Stress,
        PracticeType::Sleep,
        PracticeType::Energy,
    ];

    /// Stable tag used in callback payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            PracticeType::Mindfulness => "mindfulness",
            PracticeType::Stress => "stress",
            PracticeType::Sleep => "sleep",
            PracticeType::Energy => "energy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().find(|t| t.as_str() == s).copied()
    }

    /// Button label.
    pub fn label(&self) -> &'static str {
        match self {
            PracticeType::Mindfulness => "🧘 Осознанность",
            PracticeType::Stress => "🌊 Антистресс",
            PracticeType::Sleep => "🌙 Для сна",
            PracticeType::Energy => "⚡ Энергия",
        }
    }

    /// Description inserted into the generation prompt, with duration.
    pub fn prompt_description(&self) -> &'static str {
        match self {
            PracticeType::Mindfulness => "короткую практику осознанности (3-5 минут)",
            PracticeType::Stress => "практику для снижения стресса (5-7 минут)",
            PracticeType::Sleep => "практику для улучшения сна (5-10 минут)",
            PracticeType::Energy => "практику для повышения энергии (2-3 минуты)",
        }
    }
}

/// Generates recommendation and practice content from the stored
/// psychological profile.
pub struct RecommendationService {
    store: Arc<dyn ProfileStore>,
    llm: Arc<dyn LlmProvider>,
    /// Absent when no speech key is configured; practices then stay
    /// text-only.
    tts: Option<Arc<dyn TtsProvider>>,
    voice: VoiceParams,
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        llm: Arc<dyn LlmProvider>,
        tts: Option<Arc<dyn TtsProvider>>,
        voice: VoiceParams,
    ) -> Self {
        Self {
            store,
            llm,
            tts,
            voice,
        }
    }

    /// Whether meditation audio can be synthesized.
    pub fn audio_enabled(&self) -> bool {
        self.tts.is_some()
    }

    /// The stored generated profile text, if profiling has completed.
    async fn profile_text(&self, user_id: &str) -> Result<Option<String>, Error> {
        let value = self
            .store
            .get_profile_field(user_id, "psychology_profile")
            .await?;
        Ok(value.and_then(|v| {
            v.get("generated_text")
                .and_then(|t| t.as_str())
                .map(str::to_string)
        }))
    }

    /// One concrete recommendation for today. `None` when the user has no
    /// generated profile yet.
    pub async fn daily_recommendation(&self, user_id: &str) -> Result<Option<String>, Error> {
        let Some(profile) = self.profile_text(user_id).await? else {
            return Ok(None);
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(prompts::RECOMMENDATION_SYSTEM_PROMPT),
            ChatMessage::user(prompts::recommendation_prompt(&profile)),
        ])
        .with_max_tokens(500)
        .with_temperature(0.7);

        let response = self.llm.complete(request).await?;
        tracing::info!(user_id, "daily recommendation generated");
        Ok(Some(response.content))
    }

    /// A step-by-step practice of the given kind. `None` when the user has
    /// no generated profile yet.
    pub async fn generate_practice(
        &self,
        user_id: &str,
        practice: PracticeType,
    ) -> Result<Option<String>, Error> {
        let Some(profile) = self.profile_text(user_id).await? else {
            return Ok(None);
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(prompts::PRACTICE_SYSTEM_PROMPT),
            ChatMessage::user(prompts::practice_prompt(&profile, practice.prompt_description())),
        ])
        .with_max_tokens(1000)
        .with_temperature(0.7);

        let response = self.llm.complete(request).await?;
        tracing::info!(user_id, practice = practice.as_str(), "practice generated");
        Ok(Some(response.content))
    }

    /// A guided meditation: generated practice text synthesized to audio.
    /// `None` when the user has no generated profile yet.
    pub async fn meditation_audio(
        &self,
        user_id: &str,
        practice: PracticeType,
    ) -> Result<Option<Vec<u8>>, Error> {
        let Some(tts) = &self.tts else {
            return Err(crate::error::TtsError::RequestFailed(
                "speech synthesis is not configured".to_string(),
            )
            .into());
        };
        let Some(text) = self.generate_practice(user_id, practice).await? else {
            return Ok(None);
        };

        let audio = tts.synthesize(&text, &self.voice).await?;
        tracing::info!(
            user_id,
            practice = practice.as_str(),
            bytes = audio.len(),
            "meditation audio synthesized"
        );
        Ok(Some(audio))
    }
}
