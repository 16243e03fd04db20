//! Outbound message delivery and the inbound event stream.

pub mod telegram;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::TransportError;
use crate::event::{ButtonMenu, InboundEvent};

pub use telegram::TelegramTransport;

/// Messaging surface the handlers talk through.
///
/// Implementations own the platform specifics (formatting fallback, message
/// splitting, keyboards); handlers only decide what to say.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a plain text message.
    async fn send_text(&self, user_id: &str, text: &str) -> Result<(), TransportError>;

    /// Send a message with an inline button menu attached.
    async fn send_menu(
        &self,
        user_id: &str,
        text: &str,
        menu: &ButtonMenu,
    ) -> Result<(), TransportError>;

    /// Send a voice message with an optional caption.
    async fn send_voice(
        &self,
        user_id: &str,
        audio: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError>;
}

/// Inbound side: a transport that can produce the event stream.
pub trait EventSource {
    /// Start receiving and return the stream of inbound events.
    fn start(&self) -> BoxStream<'static, InboundEvent>;
}
