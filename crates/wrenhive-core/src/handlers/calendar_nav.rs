use anyhow::Result;
use async_trait::async_trait;

use wrenhive_schema::InboundEvent;
use wrenhive_token::Token;

use crate::calendar::{self, CalendarOutcome};
use crate::router::{Handler, HandlerContext};
use crate::timepicker;

/// Month navigation and date selection (`n_...` tokens).
pub struct CalendarHandler;

#[async_trait]
impl Handler for CalendarHandler {
    fn name(&self) -> &'static str {
        "calendar"
    }

    fn can_handle(&self, event: &InboundEvent) -> bool {
        event
            .token()
            .map(|raw| Token::decode(raw).prefix() == calendar::PREFIX)
            .unwrap_or(false)
    }

    async fn handle(&self, event: &InboundEvent, ctx: &HandlerContext) -> Result<()> {
        let Some(raw) = event.token() else {
            return Ok(());
        };
        let token = Token::decode(raw);
        let now = ctx.now().naive_local();

        match calendar::advance(&token, now.date()) {
            CalendarOutcome::Month(keyboard) => {
                ctx.reply_with_keyboard(event, "Pick a date:", keyboard).await
            }
            CalendarOutcome::Selected(date) => {
                let keyboard = timepicker::open(date, now, token.context());
                ctx.reply_with_keyboard(event, "Pick a time:", keyboard).await
            }
        }
    }
}
