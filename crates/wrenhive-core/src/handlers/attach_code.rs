use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use wrenhive_schema::InboundEvent;

use super::{command_args, is_command};
use crate::router::{Handler, HandlerContext};

const COMMAND: &str = "/attach";

/// Attach an enrollment code to an existing parent record.
pub struct AttachCodeHandler;

#[async_trait]
impl Handler for AttachCodeHandler {
    fn name(&self) -> &'static str {
        "attach_code"
    }

    fn can_handle(&self, event: &InboundEvent) -> bool {
        is_command(event, COMMAND)
    }

    async fn handle(&self, event: &InboundEvent, ctx: &HandlerContext) -> Result<()> {
        let args = command_args(event, COMMAND);
        let mut parts = args.split_whitespace();
        let (Some(id), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
            return ctx
                .reply(event, "Usage: /attach <parent-id> <code>")
                .await;
        };

        let Ok(id) = Uuid::parse_str(id) else {
            return ctx
                .reply(event, "That does not look like a parent id.")
                .await;
        };

        if ctx.parents.attach_code(id, code).await? {
            ctx.reply(event, &format!("Code {code} attached.")).await
        } else {
            ctx.reply(event, "No parent with that id.").await
        }
    }
}
