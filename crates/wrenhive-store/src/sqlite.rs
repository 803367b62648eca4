//! SQLite-backed store for reminders, parents, leads, and admins

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use uuid::Uuid;

use wrenhive_schema::{Lead, LeadStatus, NewReminder, Parent, Reminder};

use crate::{AdminStore, LeadStore, ParentStore, ReminderStore};

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at the given path
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        // Run migrations synchronously before wrapping in the async mutex
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_reminder(row: &rusqlite::Row) -> Reminder {
        Reminder {
            id: parse_uuid(&row.get::<_, String>(0).unwrap()),
            recipient_id: row.get(1).unwrap(),
            message: row.get(2).unwrap(),
            scheduled_at: parse_ts(&row.get::<_, String>(3).unwrap()),
            is_active: row.get(4).unwrap(),
            is_attended: row.get(5).unwrap(),
            attempt_count: row.get::<_, i64>(6).unwrap() as u32,
            max_attempts: row.get::<_, i64>(7).unwrap() as u32,
            last_attempt_at: row
                .get::<_, Option<String>>(8)
                .unwrap()
                .map(|s| parse_ts(&s)),
            created_at: parse_ts(&row.get::<_, String>(9).unwrap()),
        }
    }

    fn row_to_parent(row: &rusqlite::Row) -> Parent {
        Parent {
            id: parse_uuid(&row.get::<_, String>(0).unwrap()),
            name: row.get(1).unwrap(),
            phone: row.get(2).unwrap(),
            code: row.get(3).unwrap(),
            created_at: parse_ts(&row.get::<_, String>(4).unwrap()),
        }
    }

    fn row_to_lead(row: &rusqlite::Row) -> Lead {
        Lead {
            id: parse_uuid(&row.get::<_, String>(0).unwrap()),
            parent_id: parse_uuid(&row.get::<_, String>(1).unwrap()),
            status: LeadStatus::parse(&row.get::<_, String>(2).unwrap())
                .unwrap_or(LeadStatus::New),
            created_at: parse_ts(&row.get::<_, String>(3).unwrap()),
            updated_at: parse_ts(&row.get::<_, String>(4).unwrap()),
        }
    }
}

const REMINDER_COLUMNS: &str = "id, recipient_id, message, scheduled_at, is_active, is_attended,
     attempt_count, max_attempts, last_attempt_at, created_at";

#[async_trait]
impl ReminderStore for SqliteStore {
    async fn create(&self, new: NewReminder) -> Result<Reminder> {
        let reminder = Reminder {
            id: Uuid::new_v4(),
            recipient_id: new.recipient_id,
            message: new.message,
            scheduled_at: new.scheduled_at,
            is_active: true,
            is_attended: false,
            attempt_count: 0,
            max_attempts: new.max_attempts,
            last_attempt_at: None,
            created_at: Utc::now(),
        };

        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO reminders
               (id, recipient_id, message, scheduled_at, is_active, is_attended,
                attempt_count, max_attempts, last_attempt_at, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                reminder.id.to_string(),
                reminder.recipient_id,
                reminder.message,
                reminder.scheduled_at.to_rfc3339(),
                reminder.is_active,
                reminder.is_attended,
                reminder.attempt_count as i64,
                reminder.max_attempts as i64,
                Option::<String>::None,
                reminder.created_at.to_rfc3339(),
            ],
        )?;
        Ok(reminder)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reminder>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"
        ))?;
        let reminder = stmt
            .query_row([id.to_string()], |row| Ok(Self::row_to_reminder(row)))
            .optional()?;
        Ok(reminder)
    }

    async fn due(&self, horizon: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {REMINDER_COLUMNS} FROM reminders
               WHERE scheduled_at <= ?1
                 AND is_active
                 AND NOT is_attended
                 AND attempt_count <= max_attempts
               ORDER BY scheduled_at, created_at"#
        ))?;

        let rows = stmt.query_map([horizon.to_rfc3339()], |row| {
            Ok(Self::row_to_reminder(row))
        })?;
        let mut reminders = Vec::new();
        for row in rows {
            reminders.push(row?);
        }
        Ok(reminders)
    }

    async fn record_attempt(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"UPDATE reminders
               SET attempt_count = attempt_count + 1, last_attempt_at = ?2
               WHERE id = ?1"#,
            params![id.to_string(), at.to_rfc3339()],
        )?;
        Ok(())
    }

    async fn mark_attended(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE reminders SET is_attended = 1 WHERE id = ?1",
            [id.to_string()],
        )?;
        Ok(())
    }
}

#[async_trait]
impl ParentStore for SqliteStore {
    async fn create(&self, name: &str, phone: &str) -> Result<Parent> {
        let parent = Parent {
            id: Uuid::new_v4(),
            name: name.to_string(),
            phone: phone.to_string(),
            code: None,
            created_at: Utc::now(),
        };

        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO parents (id, name, phone, code, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                parent.id.to_string(),
                parent.name,
                parent.phone,
                parent.code,
                parent.created_at.to_rfc3339(),
            ],
        )?;
        Ok(parent)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Parent>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, phone, code, created_at FROM parents WHERE id = ?1",
        )?;
        let parent = stmt
            .query_row([id.to_string()], |row| Ok(Self::row_to_parent(row)))
            .optional()?;
        Ok(parent)
    }

    async fn attach_code(&self, id: Uuid, code: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE parents SET code = ?2 WHERE id = ?1",
            params![id.to_string(), code],
        )?;
        Ok(changed > 0)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Parent>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"SELECT id, name, phone, code, created_at FROM parents
               WHERE name LIKE ?1 OR phone LIKE ?1
               ORDER BY created_at DESC
               LIMIT ?2"#,
        )?;
        let pattern = format!("%{query}%");
        let rows = stmt.query_map(params![pattern, limit as i64], |row| {
            Ok(Self::row_to_parent(row))
        })?;
        let mut parents = Vec::new();
        for row in rows {
            parents.push(row?);
        }
        Ok(parents)
    }
}

#[async_trait]
impl LeadStore for SqliteStore {
    async fn create(&self, parent_id: Uuid) -> Result<Lead> {
        let now = Utc::now();
        let lead = Lead {
            id: Uuid::new_v4(),
            parent_id,
            status: LeadStatus::New,
            created_at: now,
            updated_at: now,
        };

        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO leads (id, parent_id, status, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                lead.id.to_string(),
                lead.parent_id.to_string(),
                lead.status.as_str(),
                lead.created_at.to_rfc3339(),
                lead.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(lead)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Lead>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, parent_id, status, created_at, updated_at FROM leads WHERE id = ?1",
        )?;
        let lead = stmt
            .query_row([id.to_string()], |row| Ok(Self::row_to_lead(row)))
            .optional()?;
        Ok(lead)
    }

    async fn find_by_parent(&self, parent_id: Uuid) -> Result<Option<Lead>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"SELECT id, parent_id, status, created_at, updated_at FROM leads
               WHERE parent_id = ?1
               ORDER BY created_at DESC
               LIMIT 1"#,
        )?;
        let lead = stmt
            .query_row([parent_id.to_string()], |row| Ok(Self::row_to_lead(row)))
            .optional()?;
        Ok(lead)
    }

    async fn update_status(&self, id: Uuid, status: LeadStatus) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE leads SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), status.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    async fn status_counts(&self) -> Result<Vec<(LeadStatus, u64)>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM leads GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = LeadStatus::parse(&status) {
                counts.push((status, count as u64));
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl AdminStore for SqliteStore {
    async fn is_admin(&self, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT 1 FROM admins WHERE user_id = ?1")?;
        let found = stmt
            .query_row([user_id], |_| Ok(()))
            .optional()?
            .is_some();
        Ok(found)
    }

    async fn add_admin(&self, user_id: &str, display_name: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT OR IGNORE INTO admins (user_id, display_name, added_at)
               VALUES (?1, ?2, ?3)"#,
            params![user_id, display_name, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Migrations
// ─────────────────────────────────────────────────────────────────────────────

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"CREATE TABLE IF NOT EXISTS __schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );"#,
    )?;

    let applied: std::collections::HashSet<i64> = {
        let mut stmt = conn.prepare("SELECT version FROM __schema_version")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        rows.filter_map(|r| r.ok()).collect()
    };

    let migrations: Vec<(i64, &str)> = vec![
        (
            1,
            r#"
            CREATE TABLE IF NOT EXISTS reminders (
                id TEXT PRIMARY KEY,
                recipient_id TEXT NOT NULL,
                message TEXT NOT NULL,
                scheduled_at TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_attended INTEGER NOT NULL DEFAULT 0,
                attempt_count INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL,
                last_attempt_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_reminders_due
                ON reminders(is_attended, is_active, scheduled_at);
            "#,
        ),
        (
            2,
            r#"
            CREATE TABLE IF NOT EXISTS parents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                phone TEXT NOT NULL,
                code TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS leads (
                id TEXT PRIMARY KEY,
                parent_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'new',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_leads_parent ON leads(parent_id);
            "#,
        ),
        (
            3,
            r#"
            CREATE TABLE IF NOT EXISTS admins (
                user_id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                added_at TEXT NOT NULL
            );
            "#,
        ),
    ];

    for (version, sql) in migrations {
        if applied.contains(&version) {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO __schema_version(version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_default()
}
