use anyhow::Result;
use async_trait::async_trait;

use wrenhive_schema::InboundEvent;

use super::callback_primary;
use crate::calendar;
use crate::router::{Handler, HandlerContext};

/// Entry payloads that open the scheduling flow
pub const PICK_DATE_TIME: &str = "pick_date_time";
pub const QUICK_SCHEDULER: &str = "quick_scheduler";

/// Opens the calendar. The contextual reference on the entry token (usually
/// a parent id) rides along onto every control from here on.
pub struct ScheduleEntryHandler;

#[async_trait]
impl Handler for ScheduleEntryHandler {
    fn name(&self) -> &'static str {
        "schedule_entry"
    }

    fn can_handle(&self, event: &InboundEvent) -> bool {
        callback_primary(event)
            .map(|(primary, _)| primary == PICK_DATE_TIME || primary == QUICK_SCHEDULER)
            .unwrap_or(false)
    }

    async fn handle(&self, event: &InboundEvent, ctx: &HandlerContext) -> Result<()> {
        let context = callback_primary(event).and_then(|(_, context)| context);
        let today = ctx.now().date_naive();
        let keyboard = calendar::open(today, context);
        ctx.reply_with_keyboard(event, "Pick a date:", keyboard).await
    }
}
