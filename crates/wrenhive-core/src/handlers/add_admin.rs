use anyhow::Result;
use async_trait::async_trait;

use wrenhive_schema::InboundEvent;

use super::{command_args, is_command};
use crate::router::{Handler, HandlerContext};

const COMMAND: &str = "/addadmin";

/// Bootstrap registration against the shared code from the config. The one
/// handler that must run before any authorization check: without it there
/// would be no first admin.
pub struct AddAdminHandler;

#[async_trait]
impl Handler for AddAdminHandler {
    fn name(&self) -> &'static str {
        "add_admin"
    }

    fn can_handle(&self, event: &InboundEvent) -> bool {
        is_command(event, COMMAND)
    }

    fn auth_required(&self, _event: &InboundEvent) -> bool {
        false
    }

    async fn handle(&self, event: &InboundEvent, ctx: &HandlerContext) -> Result<()> {
        let InboundEvent::Message(message) = event else {
            return Ok(());
        };

        let code = command_args(event, COMMAND);
        if code.is_empty() {
            return ctx.reply(event, "Usage: /addadmin <bootstrap code>").await;
        }
        if code != ctx.bootstrap_code {
            tracing::warn!(user = message.from.id, "add-admin attempt with wrong code");
            return ctx.reply(event, "That code is not valid.").await;
        }

        let display = message
            .from
            .display_name
            .clone()
            .or_else(|| message.from.username.clone())
            .unwrap_or_else(|| message.from.id.to_string());
        ctx.admins
            .add_admin(&message.from.id.to_string(), &display)
            .await?;

        tracing::info!(user = message.from.id, "registered new admin");
        ctx.reply(event, "You are registered as an admin.").await
    }
}
