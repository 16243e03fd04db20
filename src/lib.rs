//! Mentora — conversational mentor-bot core.

pub mod bot;
pub mod config;
pub mod error;
pub mod event;
pub mod fsm;
pub mod llm;
pub mod payments;
pub mod prompts;
pub mod questionnaire;
pub mod recommend;
pub mod store;
pub mod subscription;
pub mod transport;
pub mod tts;
