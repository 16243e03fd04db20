//! Configuration — read once from the environment at startup.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token.
    pub telegram_token: SecretString,
    /// API key for the generative-text provider.
    pub llm_api_key: SecretString,
    /// Model name for the generative-text provider.
    pub llm_model: String,
    /// ElevenLabs API key. Voice practices are disabled when absent.
    pub tts_api_key: Option<SecretString>,
    /// ElevenLabs voice id.
    pub tts_voice_id: String,
    /// Payment provider shop id.
    pub payment_shop_id: String,
    /// Payment provider secret key.
    pub payment_api_key: SecretString,
    /// URL the payment provider redirects to after checkout.
    pub payment_return_url: String,
    /// Path to the local database file.
    pub db_path: String,
}

impl BotConfig {
    /// Build a configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            telegram_token: SecretString::from(require("MENTORA_TELEGRAM_TOKEN")?),
            llm_api_key: SecretString::from(require("MENTORA_LLM_API_KEY")?),
            llm_model: std::env::var("MENTORA_LLM_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            tts_api_key: std::env::var("MENTORA_TTS_API_KEY")
                .ok()
                .map(SecretString::from),
            tts_voice_id: std::env::var("MENTORA_TTS_VOICE_ID")
                .unwrap_or_else(|_| "21m00Tcm4TlvDq8ikWAM".to_string()),
            payment_shop_id: require("MENTORA_PAYMENT_SHOP_ID")?,
            payment_api_key: SecretString::from(require("MENTORA_PAYMENT_API_KEY")?),
            payment_return_url: std::env::var("MENTORA_PAYMENT_RETURN_URL")
                .unwrap_or_else(|_| "https://t.me".to_string()),
            db_path: std::env::var("MENTORA_DB_PATH")
                .unwrap_or_else(|_| "./data/mentora.db".to_string()),
        })
    }
}

fn require(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}
