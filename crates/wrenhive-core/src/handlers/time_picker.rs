use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, TimeZone};
use uuid::Uuid;

use wrenhive_schema::{InboundEvent, ScheduleRequest, SendOptions};
use wrenhive_token::Token;

use crate::calendar;
use crate::router::{Handler, HandlerContext};
use crate::timepicker::{self, TimePickerOutcome};

/// Period menus, the back control, and the terminal time selection
/// (`pt_...` and `t_...` tokens).
pub struct TimePickerHandler;

#[async_trait]
impl Handler for TimePickerHandler {
    fn name(&self) -> &'static str {
        "time_picker"
    }

    fn can_handle(&self, event: &InboundEvent) -> bool {
        event
            .token()
            .map(|raw| {
                let prefix = Token::decode(raw).prefix().to_string();
                prefix == timepicker::PERIOD_PREFIX || prefix == timepicker::TIME_PREFIX
            })
            .unwrap_or(false)
    }

    async fn handle(&self, event: &InboundEvent, ctx: &HandlerContext) -> Result<()> {
        let Some(raw) = event.token() else {
            return Ok(());
        };
        let token = Token::decode(raw);
        let now = ctx.now().naive_local();

        match timepicker::advance(&token, now) {
            TimePickerOutcome::Menu(keyboard) => {
                ctx.reply_with_keyboard(event, "Pick a time:", keyboard).await
            }
            TimePickerOutcome::BackToCalendar { date } => {
                let keyboard =
                    calendar::month_keyboard(date.year(), date.month(), now.date(), token.context());
                ctx.reply_with_keyboard(event, "Pick a date:", keyboard).await
            }
            TimePickerOutcome::Selected { date, time } => {
                self.schedule(event, ctx, date, time, token.context()).await
            }
        }
    }
}

impl TimePickerHandler {
    async fn schedule(
        &self,
        event: &InboundEvent,
        ctx: &HandlerContext,
        date: chrono::NaiveDate,
        time: chrono::NaiveTime,
        context: Option<&str>,
    ) -> Result<()> {
        let InboundEvent::Callback(press) = event else {
            return Ok(());
        };

        let Some(scheduled_at) = ctx.tz.from_local_datetime(&date.and_time(time)).earliest()
        else {
            return ctx.reply(event, "That time cannot be scheduled.").await;
        };

        let message = match self.context_parent(ctx, context).await {
            Some((name, phone)) => format!("Call back {name} ({phone})"),
            None => "Scheduled follow-up call".to_string(),
        };

        let request = ScheduleRequest {
            user_id: press.from.id.to_string(),
            message,
            date_time: scheduled_at.to_rfc3339(),
        };
        let mut new = match request.validate() {
            Ok(new) => new,
            Err(err) => {
                return ctx
                    .reply(event, &format!("Could not schedule that: {err}"))
                    .await;
            }
        };
        new.max_attempts = ctx.max_attempts;

        let reminder = ctx.reminders.create(new).await?;
        tracing::info!(reminder = %reminder.id, at = %reminder.scheduled_at, "reminder scheduled");

        ctx.reply(
            event,
            &format!(
                "Reminder set for {} at {}.",
                date.format("%d %b %Y"),
                time.format("%H:%M")
            ),
        )
        .await?;

        if let Some(sticker) = &ctx.confirmation_sticker {
            if let Some(chat_id) = event.chat_id() {
                if let Err(err) = ctx
                    .sender
                    .send_sticker(&chat_id.to_string(), sticker, SendOptions::default())
                    .await
                {
                    tracing::debug!("confirmation sticker failed: {err:#}");
                }
            }
        }
        Ok(())
    }

    async fn context_parent(
        &self,
        ctx: &HandlerContext,
        context: Option<&str>,
    ) -> Option<(String, String)> {
        let id = Uuid::parse_str(context?).ok()?;
        let parent = ctx.parents.get(id).await.ok().flatten()?;
        Some((parent.name, parent.phone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Utc};

    use crate::testing::{callback_event, env};

    #[tokio::test]
    async fn period_token_shows_a_menu() {
        let env = env().await;
        let event = callback_event(1, 1, "pt_evening_2099-06-15");

        TimePickerHandler.handle(&event, &env.ctx).await.unwrap();

        let sent = env.sender.last();
        assert_eq!(sent.text, "Pick a time:");
        assert!(sent.keyboard.is_some());
    }

    #[tokio::test]
    async fn back_token_returns_to_the_calendar() {
        let env = env().await;
        let event = callback_event(1, 1, "t_2099-06-15_back::p-9");

        TimePickerHandler.handle(&event, &env.ctx).await.unwrap();
        assert_eq!(env.sender.last().text, "Pick a date:");
    }

    #[tokio::test]
    async fn selection_creates_a_reminder_for_the_presser() {
        let env = env().await;
        let event = callback_event(77, 10, "t_10:00_2099-06-15");

        TimePickerHandler.handle(&event, &env.ctx).await.unwrap();

        let horizon = Utc::now() + chrono::Duration::days(40000);
        let due = env.ctx.reminders.due(horizon).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].recipient_id, "77");
        assert_eq!(due[0].message, "Scheduled follow-up call");
        assert_eq!(due[0].max_attempts, 3);

        assert!(env.sender.last().text.starts_with("Reminder set for"));
    }

    #[tokio::test]
    async fn selection_with_parent_context_names_the_parent() {
        let env = env().await;
        let parent = env.ctx.parents.create("Asha Rao", "9876543210").await.unwrap();

        let event = callback_event(77, 10, &format!("t_10:00_2099-06-15::{}", parent.id));
        TimePickerHandler.handle(&event, &env.ctx).await.unwrap();

        let horizon = Utc::now() + chrono::Duration::days(40000);
        let due = env.ctx.reminders.due(horizon).await.unwrap();
        assert_eq!(due[0].message, "Call back Asha Rao (9876543210)");
    }

    #[tokio::test]
    async fn scheduled_instant_is_in_the_operating_timezone() {
        let env = env().await;
        let event = callback_event(1, 10, "t_10:00_2099-06-15");

        TimePickerHandler.handle(&event, &env.ctx).await.unwrap();

        let horizon = Utc::now() + chrono::Duration::days(40000);
        let due = env.ctx.reminders.due(horizon).await.unwrap();
        // 10:00 IST is 04:30 UTC.
        let utc = due[0].scheduled_at;
        assert_eq!(utc.date_naive().year(), 2099);
        assert_eq!(utc.format("%H:%M").to_string(), "04:30");
    }

    #[test]
    fn matches_both_of_its_prefixes() {
        let handler = TimePickerHandler;
        assert!(handler.can_handle(&callback_event(1, 1, "pt_morning_2025-03-15")));
        assert!(handler.can_handle(&callback_event(1, 1, "t_10:00_2025-03-15")));
        assert!(!handler.can_handle(&callback_event(1, 1, "n_2025-03_++")));
        assert!(!handler.can_handle(&callback_event(1, 1, "pick_date_time")));
    }
}
