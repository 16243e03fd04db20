//! Error types for Mentora.

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("TTS error: {0}")]
    Tts(#[from] TtsError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} for user {user_id}")]
    NotFound { entity: String, user_id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Messaging transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to send to {user_id}: {reason}")]
    SendFailed { user_id: String, reason: String },

    #[error("Polling failed: {0}")]
    PollFailed(String),

    #[error("Invalid update payload: {0}")]
    InvalidUpdate(String),
}

/// Generative-text provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Text-to-speech provider errors.
#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    #[error("Synthesis request failed: {0}")]
    RequestFailed(String),

    #[error("Provider returned status {status}: {body}")]
    BadStatus { status: u16, body: String },
}

/// Payment provider errors.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment creation failed: {0}")]
    CreateFailed(String),

    #[error("Payment status check failed for {payment_id}: {reason}")]
    CheckFailed { payment_id: String, reason: String },

    #[error("Unknown plan: {0}")]
    UnknownPlan(String),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
