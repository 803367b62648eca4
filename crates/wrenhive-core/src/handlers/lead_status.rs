use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use wrenhive_schema::{InboundEvent, LeadStatus};
use wrenhive_token::strip_payload;

use super::callback_primary;
use crate::router::{Handler, HandlerContext};

/// Payload prefix of a mark-requested callback
pub const REQUESTED_PREFIX: &str = "requested";

/// Advances a lead to `requested` from a parent-card control.
pub struct LeadStatusHandler;

#[async_trait]
impl Handler for LeadStatusHandler {
    fn name(&self) -> &'static str {
        "lead_status"
    }

    fn can_handle(&self, event: &InboundEvent) -> bool {
        callback_primary(event)
            .map(|(primary, _)| strip_payload(primary, REQUESTED_PREFIX).is_some())
            .unwrap_or(false)
    }

    async fn handle(&self, event: &InboundEvent, ctx: &HandlerContext) -> Result<()> {
        let lead_id = callback_primary(event)
            .and_then(|(primary, _)| strip_payload(primary, REQUESTED_PREFIX))
            .and_then(|raw| Uuid::parse_str(raw).ok());
        let Some(lead_id) = lead_id else {
            return ctx.reply(event, "That control references no lead.").await;
        };

        if ctx.leads.update_status(lead_id, LeadStatus::Requested).await? {
            tracing::info!(lead = %lead_id, "lead marked requested");
            ctx.reply(event, "Lead marked as requested.").await
        } else {
            ctx.reply(event, "Lead not found.").await
        }
    }
}
