//! Outbound message-sending capability.
//!
//! Handlers and the dispatcher never touch a chat client directly; they get
//! this narrow capability injected, which keeps them testable with doubles.

use anyhow::Result;
use async_trait::async_trait;

use crate::Keyboard;

#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub keyboard: Option<Keyboard>,
    /// Platform message id to reply to
    pub reply_to: Option<String>,
}

impl SendOptions {
    pub fn with_keyboard(keyboard: Keyboard) -> Self {
        Self {
            keyboard: Some(keyboard),
            reply_to: None,
        }
    }
}

#[async_trait]
pub trait OutboundSender: Send + Sync {
    async fn send(&self, recipient_id: &str, text: &str, options: SendOptions) -> Result<()>;

    async fn send_sticker(
        &self,
        recipient_id: &str,
        media_ref: &str,
        options: SendOptions,
    ) -> Result<()>;
}
