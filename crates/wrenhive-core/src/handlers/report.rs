use anyhow::Result;
use async_trait::async_trait;

use wrenhive_schema::{InboundEvent, LeadStatus};

use super::is_command;
use crate::router::{Handler, HandlerContext};

const COMMAND: &str = "/report";

/// `/report`: lead counts by status.
pub struct ReportHandler;

#[async_trait]
impl Handler for ReportHandler {
    fn name(&self) -> &'static str {
        "report"
    }

    fn can_handle(&self, event: &InboundEvent) -> bool {
        is_command(event, COMMAND)
    }

    async fn handle(&self, event: &InboundEvent, ctx: &HandlerContext) -> Result<()> {
        let counts = ctx.leads.status_counts().await?;
        let count_of = |status: LeadStatus| {
            counts
                .iter()
                .find(|(s, _)| *s == status)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };

        let mut lines = vec!["Leads by status:".to_string()];
        let mut total = 0;
        for status in LeadStatus::ALL {
            let n = count_of(status);
            total += n;
            lines.push(format!("  {}: {n}", status.as_str()));
        }
        lines.push(format!("total: {total}"));

        ctx.reply(event, &lines.join("\n")).await
    }
}
