use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Shared code accepted by the add-admin bootstrap handler
    pub bootstrap_code: String,
    /// Chat user ids registered as admins at startup
    #[serde(default)]
    pub seed_admins: Vec<String>,
}

fn default_interval_minutes() -> u64 {
    60
}

fn default_lookahead_minutes() -> i64 {
    5
}

fn default_batch_size() -> usize {
    20
}

fn default_cooldown_secs() -> u64 {
    2
}

fn default_max_attempts() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_lookahead_minutes")]
    pub lookahead_minutes: i64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            lookahead_minutes: default_lookahead_minutes(),
            batch_size: default_batch_size(),
            cooldown_secs: default_cooldown_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    /// IANA timezone the calendar and time picker operate in
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub admin: AdminConfig,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    /// Sticker sent alongside the scheduling confirmation, if set
    #[serde(default)]
    pub confirmation_sticker: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.token.trim().is_empty() {
            return Err(anyhow!("telegram.token must not be empty"));
        }
        if self.admin.bootstrap_code.trim().is_empty() {
            return Err(anyhow!("admin.bootstrap_code must not be empty"));
        }
        if self.dispatch.batch_size == 0 {
            return Err(anyhow!("dispatch.batch_size must be at least 1"));
        }
        if self.dispatch.max_attempts == 0 {
            return Err(anyhow!("dispatch.max_attempts must be at least 1"));
        }
        self.tz()?;
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| anyhow!("unknown timezone: {}", self.timezone))
    }
}
