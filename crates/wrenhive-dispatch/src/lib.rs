//! Batched delivery of due reminders with bounded retry.
//!
//! One cycle: load the due set, group it by recipient in scan order, then
//! send batch by batch: batches strictly sequential with a cooldown between
//! them, recipients inside a batch concurrent. Attempt bookkeeping is
//! persisted before the send, so an attempt counts whether or not the send
//! reaches the wire. Nothing guards two overlapping cycles; the periodic
//! runner awaits each cycle before sleeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;

use wrenhive_schema::{OutboundSender, Reminder, SendOptions};
use wrenhive_store::ReminderStore;

pub const DEFAULT_LOOKAHEAD_MINUTES: i64 = 5;
pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Due horizon: now + this many minutes
    pub lookahead_minutes: i64,
    /// Recipients per batch
    pub batch_size: usize,
    /// Pause between consecutive batches
    pub cooldown: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            lookahead_minutes: DEFAULT_LOOKAHEAD_MINUTES,
            batch_size: DEFAULT_BATCH_SIZE,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

/// Outcome tallies of one dispatch cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub due: usize,
    pub recipients: usize,
    pub batches: usize,
    /// Recipients whose combined message went out and was recorded
    pub sent: usize,
    /// Recipients whose send failed; their reminders stay retryable
    pub failed: usize,
    /// Recipients abandoned before sending because bookkeeping failed
    pub skipped: usize,
}

enum DeliveryOutcome {
    Sent,
    Failed,
    Skipped,
}

pub struct ReminderDispatcher {
    store: Arc<dyn ReminderStore>,
    sender: Arc<dyn OutboundSender>,
    config: DispatchConfig,
}

impl ReminderDispatcher {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        sender: Arc<dyn OutboundSender>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            sender,
            config,
        }
    }

    /// One load→batch→send→record pass over the currently-due set.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let horizon = Utc::now() + chrono::Duration::minutes(self.config.lookahead_minutes);
        let due = self.store.due(horizon).await?;

        let mut report = CycleReport {
            due: due.len(),
            ..CycleReport::default()
        };
        if due.is_empty() {
            return Ok(report);
        }

        // Group by recipient, preserving due-set scan order.
        let mut groups: Vec<(String, Vec<Reminder>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for reminder in due {
            match index.get(&reminder.recipient_id) {
                Some(&i) => groups[i].1.push(reminder),
                None => {
                    index.insert(reminder.recipient_id.clone(), groups.len());
                    groups.push((reminder.recipient_id.clone(), vec![reminder]));
                }
            }
        }
        report.recipients = groups.len();

        for (batch_no, batch) in groups.chunks(self.config.batch_size).enumerate() {
            if batch_no > 0 {
                tokio::time::sleep(self.config.cooldown).await;
            }
            report.batches += 1;

            let outcomes = join_all(
                batch
                    .iter()
                    .map(|(recipient, reminders)| self.deliver(recipient, reminders)),
            )
            .await;

            for outcome in outcomes {
                match outcome {
                    DeliveryOutcome::Sent => report.sent += 1,
                    DeliveryOutcome::Failed => report.failed += 1,
                    DeliveryOutcome::Skipped => report.skipped += 1,
                }
            }
        }

        tracing::info!(
            due = report.due,
            recipients = report.recipients,
            batches = report.batches,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            "dispatch cycle finished"
        );
        Ok(report)
    }

    /// Deliver one recipient's combined message. Failures stay inside this
    /// call so the rest of the batch settles regardless.
    async fn deliver(&self, recipient: &str, reminders: &[Reminder]) -> DeliveryOutcome {
        let now = Utc::now();

        // Durability first: the attempt is on the books before any send.
        for reminder in reminders {
            if let Err(err) = self.store.record_attempt(reminder.id, now).await {
                tracing::warn!(
                    recipient,
                    reminder = %reminder.id,
                    "attempt bookkeeping failed, abandoning recipient this cycle: {err:#}"
                );
                return DeliveryOutcome::Skipped;
            }
        }

        let text = compose_message(reminders);
        if let Err(err) = self
            .sender
            .send(recipient, &text, SendOptions::default())
            .await
        {
            tracing::warn!(recipient, "delivery failed, will retry within budget: {err:#}");
            return DeliveryOutcome::Failed;
        }

        for reminder in reminders {
            if let Err(err) = self.store.mark_attended(reminder.id).await {
                tracing::warn!(
                    recipient,
                    reminder = %reminder.id,
                    "delivered but could not mark attended: {err:#}"
                );
            }
        }
        DeliveryOutcome::Sent
    }

    /// Trigger a cycle on a fixed interval, forever. Cycle errors are logged
    /// and never stop the loop.
    pub async fn run(&self, interval: Duration) {
        loop {
            if let Err(err) = self.run_cycle().await {
                tracing::error!("dispatch cycle failed: {err:#}");
            }
            tokio::time::sleep(interval).await;
        }
    }
}

/// One recipient, one message: multiple due reminders are combined.
fn compose_message(reminders: &[Reminder]) -> String {
    match reminders {
        [single] => format!("Reminder: {}", single.message),
        many => {
            let mut text = format!("You have {} reminders:", many.len());
            for reminder in many {
                text.push_str("\n• ");
                text.push_str(&reminder.message);
            }
            text
        }
    }
}
