//! Shared doubles for handler and router tests.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use wrenhive_schema::{
    CallbackPress, ChatMessage, InboundEvent, Keyboard, OutboundSender, SendOptions, UserRef,
};
use wrenhive_store::SqliteStore;

use crate::router::HandlerContext;

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipient: String,
    pub text: String,
    pub keyboard: Option<Keyboard>,
    pub sticker: Option<String>,
}

/// Captures outbound traffic instead of talking to a chat platform.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<SentMessage>>,
}

impl RecordingSender {
    pub fn last(&self) -> SentMessage {
        self.sent.lock().unwrap().last().cloned().expect("nothing was sent")
    }
}

#[async_trait]
impl OutboundSender for RecordingSender {
    async fn send(&self, recipient_id: &str, text: &str, options: SendOptions) -> Result<()> {
        self.sent.lock().unwrap().push(SentMessage {
            recipient: recipient_id.to_string(),
            text: text.to_string(),
            keyboard: options.keyboard,
            sticker: None,
        });
        Ok(())
    }

    async fn send_sticker(
        &self,
        recipient_id: &str,
        media_ref: &str,
        _options: SendOptions,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(SentMessage {
            recipient: recipient_id.to_string(),
            text: String::new(),
            keyboard: None,
            sticker: Some(media_ref.to_string()),
        });
        Ok(())
    }
}

pub struct TestEnv {
    pub sender: Arc<RecordingSender>,
    pub store: Arc<SqliteStore>,
    pub ctx: HandlerContext,
}

pub async fn env() -> TestEnv {
    let sender = Arc::new(RecordingSender::default());
    let store = Arc::new(SqliteStore::open_in_memory().expect("in-memory store"));
    let ctx = HandlerContext {
        sender: sender.clone(),
        reminders: store.clone(),
        parents: store.clone(),
        leads: store.clone(),
        admins: store.clone(),
        tz: chrono_tz::Asia::Kolkata,
        bootstrap_code: "wren-2041".to_string(),
        max_attempts: 3,
        confirmation_sticker: None,
    };
    TestEnv { sender, store, ctx }
}

pub async fn memory_context() -> HandlerContext {
    env().await.ctx
}

pub fn user(id: i64) -> UserRef {
    UserRef {
        id,
        username: Some(format!("user{id}")),
        display_name: Some(format!("User {id}")),
    }
}

pub fn message_event(from: i64, chat: i64, text: &str) -> InboundEvent {
    InboundEvent::Message(ChatMessage {
        chat_id: chat,
        from: user(from),
        text: text.to_string(),
        at: Utc::now(),
        message_id: Some("1".to_string()),
    })
}

pub fn callback_event(from: i64, chat: i64, token: &str) -> InboundEvent {
    InboundEvent::Callback(CallbackPress {
        callback_id: "cb-1".to_string(),
        from: user(from),
        chat_id: Some(chat),
        message_id: Some("1".to_string()),
        token: token.to_string(),
        at: Utc::now(),
    })
}
