/// Config schema types (catalog credentials, database, sync policy, schedule).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Largest page the remote catalog will serve in one request.
pub const MAX_PAGE_SIZE: u32 = 250;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfsyncConfig {
    pub catalog: CatalogConfig,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub schedule: ScheduleConfig,
}

/// Remote catalog (commerce API) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Store handle, e.g. `my-shop` for `my-shop.myshopify.com`.
    pub store_name: String,
    /// Admin API access token.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_token: Option<Secret<String>>,
    pub api_version: String,
    /// Overrides the URL derived from `store_name` and `api_version`.
    pub base_url: Option<String>,
    pub page_size: u32,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// How many times a rate-limited (HTTP 429) request is retried.
    pub max_retries: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            store_name: String::new(),
            access_token: None,
            api_version: "2024-01".into(),
            base_url: None,
            page_size: MAX_PAGE_SIZE,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl CatalogConfig {
    /// Both the store name and a non-empty token are present.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.store_name.trim().is_empty()
            && self
                .access_token
                .as_ref()
                .is_some_and(|t| !t.expose_secret().trim().is_empty())
    }

    /// The API root all catalog requests are made against.
    #[must_use]
    pub fn resolved_base_url(&self) -> String {
        match self.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!(
                "https://{}.myshopify.com/admin/api/{}",
                self.store_name.trim(),
                self.api_version
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://shelfsync.db?mode=rwc".into(),
        }
    }
}

/// Sync run policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Products at or below this quantity are reported as low stock.
    pub low_stock_threshold: i64,
    /// Age after which ledger and notification rows are deleted.
    pub retention_days: u32,
    /// Refuse to start a run while another one is still pending.
    pub exclusive_runs: bool,
    /// Send a run report after every run.
    pub notifications: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: 10,
            retention_days: 30,
            exclusive_runs: false,
            notifications: true,
        }
    }
}

/// When the standing jobs fire. All times are UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Full sync cadence, aligned to midnight UTC.
    pub sync_every_hours: u32,
    /// `HH:MM` for the daily low-stock report.
    pub low_stock_time: String,
    /// Day of the weekly retention cleanup (`sun`, `monday`, ...).
    pub cleanup_weekday: String,
    /// `HH:MM` for the weekly retention cleanup.
    pub cleanup_time: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sync_every_hours: 6,
            low_stock_time: "09:00".into(),
            cleanup_weekday: "sun".into(),
            cleanup_time: "02:00".into(),
        }
    }
}

impl ScheduleConfig {
    pub fn low_stock_at(&self) -> anyhow::Result<TimeOfDay> {
        TimeOfDay::parse(&self.low_stock_time)
    }

    pub fn cleanup_at(&self) -> anyhow::Result<TimeOfDay> {
        TimeOfDay::parse(&self.cleanup_time)
    }

    pub fn cleanup_day(&self) -> anyhow::Result<chrono::Weekday> {
        self.cleanup_weekday
            .trim()
            .parse::<chrono::Weekday>()
            .map_err(|_| anyhow::anyhow!("unknown weekday: {}", self.cleanup_weekday))
    }
}

/// A wall-clock time parsed from `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let (h, m) = raw
            .trim()
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("expected HH:MM, got '{raw}'"))?;
        let hour: u32 = h
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid hour in '{raw}'"))?;
        let minute: u32 = m
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid minute in '{raw}'"))?;
        if hour > 23 || minute > 59 {
            anyhow::bail!("time out of range: '{raw}'");
        }
        Ok(Self { hour, minute })
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
