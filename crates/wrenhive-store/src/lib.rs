//! Repository traits for the records the bot operates on, plus the SQLite
//! implementation used in production.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use wrenhive_schema::{Lead, LeadStatus, NewReminder, Parent, Reminder};

pub mod sqlite;

pub use sqlite::SqliteStore;

/// Durable record of scheduled reminders. Reminders are never deleted: they
/// age out of the due set once attended or out of attempts.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn create(&self, new: NewReminder) -> Result<Reminder>;

    async fn get(&self, id: Uuid) -> Result<Option<Reminder>>;

    /// The due set: `scheduled_at <= horizon AND is_active AND NOT
    /// is_attended AND attempt_count <= max_attempts`, in scan order
    /// (scheduled_at, then creation).
    async fn due(&self, horizon: DateTime<Utc>) -> Result<Vec<Reminder>>;

    /// Increment `attempt_count` and stamp `last_attempt_at`. Persisted
    /// before any send so the attempt is recorded even if delivery dies.
    async fn record_attempt(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Only ever set after a confirmed successful send.
    async fn mark_attended(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ParentStore: Send + Sync {
    async fn create(&self, name: &str, phone: &str) -> Result<Parent>;

    async fn get(&self, id: Uuid) -> Result<Option<Parent>>;

    /// Returns false when no parent with this id exists.
    async fn attach_code(&self, id: Uuid, code: &str) -> Result<bool>;

    /// Substring match over name and phone, newest first, capped.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Parent>>;
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn create(&self, parent_id: Uuid) -> Result<Lead>;

    async fn get(&self, id: Uuid) -> Result<Option<Lead>>;

    async fn find_by_parent(&self, parent_id: Uuid) -> Result<Option<Lead>>;

    /// Returns false when no lead with this id exists.
    async fn update_status(&self, id: Uuid, status: LeadStatus) -> Result<bool>;

    async fn status_counts(&self) -> Result<Vec<(LeadStatus, u64)>>;
}

#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn is_admin(&self, user_id: &str) -> Result<bool>;

    /// Idempotent: registering an existing admin is a no-op.
    async fn add_admin(&self, user_id: &str, display_name: &str) -> Result<()>;
}
