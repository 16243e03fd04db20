//! Text-to-speech provider abstraction.

pub mod elevenlabs;

pub use elevenlabs::ElevenLabsProvider;

use async_trait::async_trait;

use crate::error::TtsError;

/// Voice synthesis parameters.
#[derive(Debug, Clone)]
pub struct VoiceParams {
    pub voice_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
}

impl VoiceParams {
    /// Calm narration settings used for guided practices.
    pub fn narration(voice_id: impl Into<String>) -> Self {
        Self {
            voice_id: voice_id.into(),
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

/// Text in, audio bytes out.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<Vec<u8>, TtsError>;
}
