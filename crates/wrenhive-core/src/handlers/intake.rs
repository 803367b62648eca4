use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use wrenhive_schema::{Control, InboundEvent, Keyboard, Lead, Parent};
use wrenhive_token::{join_context, strip_payload};

use super::{callback_primary, command_args, is_command};
use crate::router::{Handler, HandlerContext};

const COMMAND: &str = "/intake";

/// Payload prefix of a parent-selection callback
pub const PARENT_PREFIX: &str = "parent_id";

/// Free-text parent intake plus parent-card callbacks.
///
/// `/intake <name>, <phone>` creates a parent record and its lead; pressing
/// a `parent_id_<id>` control re-opens the card with follow-up actions.
pub struct ParentIntakeHandler;

#[async_trait]
impl Handler for ParentIntakeHandler {
    fn name(&self) -> &'static str {
        "parent_intake"
    }

    fn can_handle(&self, event: &InboundEvent) -> bool {
        if is_command(event, COMMAND) {
            return true;
        }
        callback_primary(event)
            .map(|(primary, _)| strip_payload(primary, PARENT_PREFIX).is_some())
            .unwrap_or(false)
    }

    async fn handle(&self, event: &InboundEvent, ctx: &HandlerContext) -> Result<()> {
        if event.text().is_some() {
            return self.intake(event, ctx).await;
        }
        self.show_card(event, ctx).await
    }
}

impl ParentIntakeHandler {
    async fn intake(&self, event: &InboundEvent, ctx: &HandlerContext) -> Result<()> {
        let args = command_args(event, COMMAND);
        let Some((name, phone)) = args.split_once(',') else {
            return ctx.reply(event, "Usage: /intake <name>, <phone>").await;
        };
        let (name, phone) = (name.trim(), phone.trim());
        if name.is_empty() || phone.is_empty() {
            return ctx.reply(event, "Usage: /intake <name>, <phone>").await;
        }
        if !plausible_phone(phone) {
            return ctx
                .reply(event, "That phone number does not look right.")
                .await;
        }

        let parent = ctx.parents.create(name, phone).await?;
        let lead = ctx.leads.create(parent.id).await?;
        tracing::info!(parent = %parent.id, "parent intake created");

        ctx.reply_with_keyboard(event, &card(&parent, &lead), follow_ups(&parent, &lead))
            .await
    }

    async fn show_card(&self, event: &InboundEvent, ctx: &HandlerContext) -> Result<()> {
        let parent_id = callback_primary(event)
            .and_then(|(primary, _)| strip_payload(primary, PARENT_PREFIX))
            .and_then(|raw| Uuid::parse_str(raw).ok());
        let Some(parent_id) = parent_id else {
            return ctx.reply(event, "That control references no parent.").await;
        };

        let Some(parent) = ctx.parents.get(parent_id).await? else {
            return ctx.reply(event, "Parent not found.").await;
        };
        let lead = match ctx.leads.find_by_parent(parent.id).await? {
            Some(lead) => lead,
            None => ctx.leads.create(parent.id).await?,
        };

        ctx.reply_with_keyboard(event, &card(&parent, &lead), follow_ups(&parent, &lead))
            .await
    }
}

fn plausible_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    digits >= 6
        && phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
}

fn card(parent: &Parent, lead: &Lead) -> String {
    let code = parent.code.as_deref().unwrap_or("—");
    format!(
        "{}\n{}\ncode: {code}\nlead: {}",
        parent.name,
        parent.phone,
        lead.status.as_str()
    )
}

fn follow_ups(parent: &Parent, lead: &Lead) -> Keyboard {
    Keyboard::new()
        .row(vec![Control::token(
            "Schedule follow-up",
            join_context("pick_date_time", Some(&parent.id.to_string())),
        )])
        .row(vec![Control::token(
            "Mark requested",
            format!("requested_{}", lead.id),
        )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use wrenhive_schema::ControlAction;

    use crate::testing::{callback_event, env, message_event};

    #[tokio::test]
    async fn intake_creates_parent_and_lead() {
        let env = env().await;
        let event = message_event(1, 1, "/intake Asha Rao, 98765 43210");

        ParentIntakeHandler.handle(&event, &env.ctx).await.unwrap();

        let found = env.ctx.parents.search("Asha", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        let lead = env.ctx.leads.find_by_parent(found[0].id).await.unwrap();
        assert!(lead.is_some());

        let sent = env.sender.last();
        assert!(sent.text.contains("Asha Rao"));
        let keyboard = sent.keyboard.expect("card keyboard");
        let tokens: Vec<&str> = keyboard
            .controls()
            .filter_map(|c| match &c.action {
                ControlAction::Token { token } => Some(token.as_str()),
                _ => None,
            })
            .collect();
        assert!(tokens[0].starts_with("pick_date_time::"));
        assert!(tokens[1].starts_with("requested_"));
    }

    #[tokio::test]
    async fn intake_without_comma_prints_usage() {
        let env = env().await;
        let event = message_event(1, 1, "/intake Asha Rao 9876543210");

        ParentIntakeHandler.handle(&event, &env.ctx).await.unwrap();
        assert!(env.sender.last().text.starts_with("Usage:"));
    }

    #[tokio::test]
    async fn intake_rejects_implausible_phone() {
        let env = env().await;
        let event = message_event(1, 1, "/intake Asha Rao, call me maybe");

        ParentIntakeHandler.handle(&event, &env.ctx).await.unwrap();
        assert_eq!(
            env.sender.last().text,
            "That phone number does not look right."
        );
    }

    #[tokio::test]
    async fn card_callback_round_trips() {
        let env = env().await;
        let parent = env.ctx.parents.create("Asha Rao", "9876543210").await.unwrap();
        env.ctx.leads.create(parent.id).await.unwrap();

        let event = callback_event(1, 1, &format!("parent_id_{}", parent.id));
        ParentIntakeHandler.handle(&event, &env.ctx).await.unwrap();

        let sent = env.sender.last();
        assert!(sent.text.contains("Asha Rao"));
        assert!(sent.keyboard.is_some());
    }

    #[tokio::test]
    async fn unknown_parent_is_a_chat_message() {
        let env = env().await;
        let event = callback_event(1, 1, &format!("parent_id_{}", Uuid::new_v4()));

        ParentIntakeHandler.handle(&event, &env.ctx).await.unwrap();
        assert_eq!(env.sender.last().text, "Parent not found.");
    }

    #[test]
    fn matches_command_and_parent_callbacks() {
        let handler = ParentIntakeHandler;
        assert!(handler.can_handle(&message_event(1, 1, "/intake a, 1")));
        assert!(handler.can_handle(&callback_event(1, 1, "parent_id_x")));
        assert!(!handler.can_handle(&callback_event(1, 1, "parent_idx")));
        assert!(!handler.can_handle(&callback_event(1, 1, "requested_x")));
    }
}
