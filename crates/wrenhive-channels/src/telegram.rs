//! Telegram boundary: update recognition, keyboard rendering, outbound
//! sending, and the long-polling loop feeding the router.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, InputFile, UpdateKind, Voter,
};

use wrenhive_core::Router;
use wrenhive_schema::{
    CallbackPress, ChatMessage, ChosenInlineResult, Control, ControlAction, InboundEvent,
    InlineQuery, Keyboard, OutboundSender, PollAnswer, PollUpdate, PreCheckoutQuery, SendOptions,
    ShippingQuery, UserRef,
};

/// Payload placeholder for controls that must exist but do nothing. The
/// platform refuses empty buttons, so blank labels/tokens only become this
/// here; no handler matches it, so presses are dropped by the router.
const NOOP_PAYLOAD: &str = "noop";

fn user_ref(user: &teloxide::types::User) -> UserRef {
    UserRef {
        id: user.id.0 as i64,
        username: user.username.clone(),
        display_name: Some(user.full_name()),
    }
}

/// Recognize one update as an inbound event. Anything outside the known
/// payload kinds is rejected here and never reaches the router.
pub fn to_event(update: &Update) -> Option<InboundEvent> {
    match &update.kind {
        UpdateKind::Message(msg) => {
            let text = msg.text()?;
            let from = msg.from.as_ref().map(user_ref)?;
            Some(InboundEvent::Message(ChatMessage {
                chat_id: msg.chat.id.0,
                from,
                text: text.to_string(),
                at: msg.date,
                message_id: Some(msg.id.0.to_string()),
            }))
        }
        UpdateKind::CallbackQuery(q) => Some(InboundEvent::Callback(CallbackPress {
            callback_id: q.id.clone(),
            from: user_ref(&q.from),
            chat_id: q.message.as_ref().map(|m| m.chat().id.0),
            message_id: q.message.as_ref().map(|m| m.id().0.to_string()),
            token: q.data.clone().unwrap_or_default(),
            at: chrono::Utc::now(),
        })),
        UpdateKind::InlineQuery(q) => Some(InboundEvent::InlineQuery(InlineQuery {
            query_id: q.id.clone(),
            from: user_ref(&q.from),
            query: q.query.clone(),
        })),
        UpdateKind::ChosenInlineResult(r) => {
            Some(InboundEvent::ChosenInlineResult(ChosenInlineResult {
                result_id: r.result_id.clone(),
                from: user_ref(&r.from),
                query: r.query.clone(),
            }))
        }
        UpdateKind::ShippingQuery(q) => Some(InboundEvent::ShippingQuery(ShippingQuery {
            query_id: q.id.clone(),
            from: user_ref(&q.from),
            invoice_payload: q.invoice_payload.clone(),
        })),
        UpdateKind::PreCheckoutQuery(q) => {
            Some(InboundEvent::PreCheckoutQuery(PreCheckoutQuery {
                query_id: q.id.clone(),
                from: user_ref(&q.from),
                invoice_payload: q.invoice_payload.clone(),
                total_amount: i64::from(q.total_amount),
            }))
        }
        UpdateKind::Poll(poll) => Some(InboundEvent::Poll(PollUpdate {
            poll_id: poll.id.clone(),
            question: poll.question.clone(),
            is_closed: poll.is_closed,
        })),
        UpdateKind::PollAnswer(answer) => {
            let Voter::User(user) = &answer.voter else {
                return None;
            };
            Some(InboundEvent::PollAnswer(PollAnswer {
                poll_id: answer.poll_id.clone(),
                from: user_ref(user),
                option_ids: answer.option_ids.iter().map(|&i| i32::from(i)).collect(),
            }))
        }
        _ => None,
    }
}

/// Render a keyboard into inline-keyboard markup.
pub fn to_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        keyboard
            .rows
            .iter()
            .map(|row| row.iter().map(to_button).collect::<Vec<_>>()),
    )
}

fn to_button(control: &Control) -> InlineKeyboardButton {
    let label = if control.label.is_empty() {
        " ".to_string()
    } else {
        control.label.clone()
    };
    match &control.action {
        ControlAction::Token { token } if !token.is_empty() => {
            InlineKeyboardButton::callback(label, token.clone())
        }
        ControlAction::Url { url } => match url::Url::parse(url) {
            Ok(parsed) => InlineKeyboardButton::url(label, parsed),
            Err(_) => InlineKeyboardButton::callback(label, NOOP_PAYLOAD.to_string()),
        },
        _ => InlineKeyboardButton::callback(label, NOOP_PAYLOAD.to_string()),
    }
}

fn parse_recipient(recipient_id: &str) -> Result<ChatId> {
    recipient_id
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| anyhow!("recipient id is not a chat id: {recipient_id}"))
}

/// The outbound capability over the bot API.
pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl OutboundSender for TelegramSender {
    async fn send(&self, recipient_id: &str, text: &str, options: SendOptions) -> Result<()> {
        let chat = parse_recipient(recipient_id)?;
        let mut request = self.bot.send_message(chat, text);
        if let Some(keyboard) = &options.keyboard {
            request = request.reply_markup(to_markup(keyboard));
        }
        request.await?;
        Ok(())
    }

    async fn send_sticker(
        &self,
        recipient_id: &str,
        media_ref: &str,
        _options: SendOptions,
    ) -> Result<()> {
        let chat = parse_recipient(recipient_id)?;
        self.bot
            .send_sticker(chat, InputFile::file_id(media_ref.to_string()))
            .await?;
        Ok(())
    }
}

/// Long-polling loop: every recognized update goes through the router; the
/// router decides which handler (if any) owns it.
pub struct TelegramBot {
    token: String,
    router: Arc<Router>,
}

impl TelegramBot {
    pub fn new(token: String, router: Arc<Router>) -> Self {
        Self { token, router }
    }

    pub fn bot(&self) -> Bot {
        Bot::new(&self.token)
    }

    pub async fn run(self) -> Result<()> {
        let bot = self.bot();
        let router = self.router;

        let handler = dptree::endpoint(move |bot: Bot, update: Update| {
            let router = router.clone();
            async move {
                match to_event(&update) {
                    Some(event) => {
                        // Stop the client-side spinner before doing any work.
                        if let UpdateKind::CallbackQuery(q) = &update.kind {
                            if let Err(err) = bot.answer_callback_query(q.id.clone()).await {
                                tracing::debug!("answer_callback_query failed: {err}");
                            }
                        }
                        router.route(event).await;
                    }
                    None => {
                        tracing::debug!(update = ?update.id, "unrecognized update, dropped");
                    }
                }
                Ok::<(), teloxide::RequestError>(())
            }
        });

        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}
