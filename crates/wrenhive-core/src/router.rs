//! First-match-wins event routing over an ordered handler registry.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use wrenhive_schema::{InboundEvent, Keyboard, OutboundSender, SendOptions};
use wrenhive_store::{AdminStore, LeadStore, ParentStore, ReminderStore};

/// One stateless unit matching and processing a class of inbound events.
///
/// Registration order in the router is a total order: the first handler
/// whose `can_handle` returns true is the only one consulted for an event.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, event: &InboundEvent) -> bool;

    /// Whether the caller must already carry an authorized admin identity.
    fn auth_required(&self, _event: &InboundEvent) -> bool {
        true
    }

    async fn handle(&self, event: &InboundEvent, ctx: &HandlerContext) -> Result<()>;
}

/// Capabilities injected into handlers. Handlers never reach a chat client
/// or a database connection directly.
pub struct HandlerContext {
    pub sender: Arc<dyn OutboundSender>,
    pub reminders: Arc<dyn ReminderStore>,
    pub parents: Arc<dyn ParentStore>,
    pub leads: Arc<dyn LeadStore>,
    pub admins: Arc<dyn AdminStore>,
    pub tz: Tz,
    pub bootstrap_code: String,
    pub max_attempts: u32,
    pub confirmation_sticker: Option<String>,
}

impl HandlerContext {
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    /// Reply into the chat the event came from; events without a reachable
    /// chat are a no-op.
    pub async fn reply(&self, event: &InboundEvent, text: &str) -> Result<()> {
        self.reply_opts(event, text, SendOptions::default()).await
    }

    pub async fn reply_with_keyboard(
        &self,
        event: &InboundEvent,
        text: &str,
        keyboard: Keyboard,
    ) -> Result<()> {
        self.reply_opts(event, text, SendOptions::with_keyboard(keyboard))
            .await
    }

    async fn reply_opts(
        &self,
        event: &InboundEvent,
        text: &str,
        options: SendOptions,
    ) -> Result<()> {
        let Some(chat_id) = event.chat_id() else {
            tracing::debug!("event has no reachable chat, dropping reply");
            return Ok(());
        };
        self.sender.send(&chat_id.to_string(), text, options).await
    }
}

/// What the router did with an event. Only for logging and tests; routing
/// itself has no caller-visible output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Handled(&'static str),
    Failed(&'static str),
    Unauthorized(&'static str),
    NoMatch,
}

pub struct Router {
    handlers: Vec<Arc<dyn Handler>>,
    ctx: HandlerContext,
}

impl Router {
    pub fn new(handlers: Vec<Arc<dyn Handler>>, ctx: HandlerContext) -> Self {
        Self { handlers, ctx }
    }

    /// Route one event to the first matching handler.
    ///
    /// A handler error is caught here: it is logged and does not fall
    /// through to the next handler, since only one handler is ever tried.
    pub async fn route(&self, event: InboundEvent) -> RouteOutcome {
        let Some(handler) = self.handlers.iter().find(|h| h.can_handle(&event)) else {
            tracing::debug!("no handler matched, dropping event");
            return RouteOutcome::NoMatch;
        };

        if handler.auth_required(&event) && !self.is_authorized(&event).await {
            tracing::warn!(
                handler = handler.name(),
                sender = ?event.sender_id(),
                "rejected unauthorized event"
            );
            return RouteOutcome::Unauthorized(handler.name());
        }

        match handler.handle(&event, &self.ctx).await {
            Ok(()) => RouteOutcome::Handled(handler.name()),
            Err(err) => {
                tracing::error!(handler = handler.name(), "handler failed: {err:#}");
                RouteOutcome::Failed(handler.name())
            }
        }
    }

    async fn is_authorized(&self, event: &InboundEvent) -> bool {
        let Some(sender_id) = event.sender_id() else {
            return false;
        };
        self.ctx
            .admins
            .is_admin(&sender_id.to_string())
            .await
            .unwrap_or(false)
    }
}
