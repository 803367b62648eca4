use anyhow::Result;
use async_trait::async_trait;

use wrenhive_schema::{Control, InboundEvent, Keyboard};

use super::{command_args, is_command, intake::PARENT_PREFIX};
use crate::router::{Handler, HandlerContext};

const COMMAND: &str = "/search";
const MAX_RESULTS: usize = 10;

/// `/search <query>` over parent records; each result is a control that
/// re-opens the parent card.
pub struct SearchHandler;

#[async_trait]
impl Handler for SearchHandler {
    fn name(&self) -> &'static str {
        "search"
    }

    fn can_handle(&self, event: &InboundEvent) -> bool {
        is_command(event, COMMAND)
    }

    async fn handle(&self, event: &InboundEvent, ctx: &HandlerContext) -> Result<()> {
        let query = command_args(event, COMMAND);
        if query.is_empty() {
            return ctx.reply(event, "Usage: /search <name or phone>").await;
        }

        let parents = ctx.parents.search(query, MAX_RESULTS).await?;
        if parents.is_empty() {
            return ctx
                .reply(event, &format!("No parents matched \"{query}\"."))
                .await;
        }

        let mut keyboard = Keyboard::new();
        for parent in &parents {
            keyboard.rows.push(vec![Control::token(
                format!("{} · {}", parent.name, parent.phone),
                format!("{PARENT_PREFIX}_{}", parent.id),
            )]);
        }
        ctx.reply_with_keyboard(event, "Select a parent:", keyboard)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{env, message_event};

    #[tokio::test]
    async fn results_carry_parent_card_tokens() {
        let env = env().await;
        let parent = env.ctx.parents.create("Asha Rao", "9876543210").await.unwrap();
        env.ctx.parents.create("Vikram Shah", "9123456780").await.unwrap();

        let event = message_event(1, 1, "/search asha");
        SearchHandler.handle(&event, &env.ctx).await.unwrap();

        let sent = env.sender.last();
        assert_eq!(sent.text, "Select a parent:");
        let keyboard = sent.keyboard.expect("result keyboard");
        assert_eq!(keyboard.rows.len(), 1);
        assert_eq!(
            keyboard.rows[0][0].token_value(),
            format!("parent_id_{}", parent.id)
        );
    }

    #[tokio::test]
    async fn empty_result_is_a_plain_message() {
        let env = env().await;
        let event = message_event(1, 1, "/search nobody");

        SearchHandler.handle(&event, &env.ctx).await.unwrap();
        assert_eq!(env.sender.last().text, "No parents matched \"nobody\".");
    }

    #[tokio::test]
    async fn missing_query_prints_usage() {
        let env = env().await;
        let event = message_event(1, 1, "/search");

        SearchHandler.handle(&event, &env.ctx).await.unwrap();
        assert!(env.sender.last().text.starts_with("Usage:"));
    }
}
