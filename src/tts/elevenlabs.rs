//! ElevenLabs text-to-speech client.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::TtsError;
use crate::tts::{TtsProvider, VoiceParams};

const BASE_URL: &str = "https://api.elevenlabs.io/v1";
const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";

/// HTTP client for the ElevenLabs API.
pub struct ElevenLabsProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model_id: String,
    base_url: String,
}

impl ElevenLabsProvider {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model_id: DEFAULT_MODEL_ID.to_string(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TtsProvider for ElevenLabsProvider {
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<Vec<u8>, TtsError> {
        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": {
                "stability": params.stability,
                "similarity_boost": params.similarity_boost,
            }
        });

        let resp = self
            .client
            .post(format!(
                "{}/text-to-speech/{}",
                self.base_url, params.voice_id
            ))
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(|e| TtsError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(TtsError::BadStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TtsError::RequestFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
