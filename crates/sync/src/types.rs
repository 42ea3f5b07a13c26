//! Core data types for the run ledger and the local product mirror.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, reconcile::SyncTally};

/// What started a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Manual,
    Scheduled,
}

impl SyncOperation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SyncOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "scheduled" => Ok(Self::Scheduled),
            other => Err(Error::message(format!("unknown sync operation: {other}"))),
        }
    }
}

/// Lifecycle state of a run. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Completed,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::message(format!("unknown run status: {other}"))),
        }
    }
}

/// One row of the run ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncRun {
    pub id: String,
    pub operation: SyncOperation,
    pub status: RunStatus,
    /// Records successfully processed (`synced + updated`).
    pub item_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SyncTally>,
    pub created_at_ms: u64,
}

impl SyncRun {
    /// A fresh ledger entry with a new id.
    #[must_use]
    pub fn pending(operation: SyncOperation, created_at_ms: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation,
            status: RunStatus::Pending,
            item_count: 0,
            duration_ms: None,
            error_message: None,
            metadata: None,
            created_at_ms,
        }
    }

    /// Apply a terminal transition. Fails if the run already finished.
    pub fn close(&mut self, close: &RunClose) -> crate::Result<()> {
        if self.status.is_terminal() {
            return Err(Error::RunNotPending {
                run_id: self.id.clone(),
            });
        }
        match close {
            RunClose::Completed { tally, duration_ms } => {
                self.status = RunStatus::Completed;
                self.item_count = tally.item_count();
                self.metadata = Some(*tally);
                self.duration_ms = Some(*duration_ms);
            },
            RunClose::Failed { error, duration_ms } => {
                self.status = RunStatus::Failed;
                self.error_message = Some(error.clone());
                self.duration_ms = Some(*duration_ms);
            },
        }
        Ok(())
    }
}

/// The terminal update written when a run ends.
#[derive(Debug, Clone, PartialEq)]
pub enum RunClose {
    Completed { tally: SyncTally, duration_ms: u64 },
    Failed { error: String, duration_ms: u64 },
}

/// A product as mirrored locally, keyed by the catalog's id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalProduct {
    pub external_id: String,
    pub sku: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub weight: Option<f64>,
    pub quantity: i64,
    pub price: Option<f64>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub image_url: Option<String>,
    pub tags: Option<String>,
    pub status: String,
    pub last_synced_at_ms: u64,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SyncReport,
    LowStock,
}

impl NotificationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SyncReport => "sync_report",
            Self::LowStock => "low_stock",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync_report" => Ok(Self::SyncReport),
            "low_stock" => Ok(Self::LowStock),
            other => Err(Error::message(format!("unknown notification kind: {other}"))),
        }
    }
}

/// Record of one notification attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationLogEntry {
    pub id: String,
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at_ms: u64,
}

/// Dashboard summary of the mirror and the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_products: u64,
    pub low_stock_count: u64,
    pub last_run: Option<SyncRun>,
}
