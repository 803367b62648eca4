//! The concrete handlers, in registration order.
//!
//! Order is a contract: the router tries `can_handle` top to bottom and the
//! first hit owns the event. Keep new handlers at the position their match
//! rule requires, not at the end by habit.

use std::sync::Arc;

use wrenhive_schema::InboundEvent;
use wrenhive_token::split_context;

use crate::router::Handler;

mod add_admin;
mod attach_code;
mod calendar_nav;
mod intake;
mod lead_status;
mod report;
mod schedule_entry;
mod search;
mod time_picker;

pub use add_admin::AddAdminHandler;
pub use attach_code::AttachCodeHandler;
pub use calendar_nav::CalendarHandler;
pub use intake::ParentIntakeHandler;
pub use lead_status::LeadStatusHandler;
pub use report::ReportHandler;
pub use schedule_entry::ScheduleEntryHandler;
pub use search::SearchHandler;
pub use time_picker::TimePickerHandler;

/// The registry in its declared total order.
pub fn default_registry() -> Vec<Arc<dyn Handler>> {
    vec![
        Arc::new(AddAdminHandler),
        Arc::new(AttachCodeHandler),
        Arc::new(ParentIntakeHandler),
        Arc::new(LeadStatusHandler),
        Arc::new(ScheduleEntryHandler),
        Arc::new(CalendarHandler),
        Arc::new(TimePickerHandler),
        Arc::new(SearchHandler),
        Arc::new(ReportHandler),
    ]
}

/// Primary payload and contextual reference of a callback token, if the
/// event is a callback at all.
pub(crate) fn callback_primary(event: &InboundEvent) -> Option<(&str, Option<&str>)> {
    event.token().map(split_context)
}

/// True when the message text starts with the given slash command.
pub(crate) fn is_command(event: &InboundEvent, command: &str) -> bool {
    event
        .text()
        .map(|t| t.trim_start().starts_with(command))
        .unwrap_or(false)
}

/// Text after the command, trimmed.
pub(crate) fn command_args<'a>(event: &'a InboundEvent, command: &str) -> &'a str {
    event
        .text()
        .and_then(|t| t.trim_start().strip_prefix(command))
        .unwrap_or("")
        .trim()
}
