//! Configuration validation.
//!
//! Checks a loaded [`ShelfsyncConfig`] for values that would make the engine
//! misbehave at runtime (bad schedule times, oversized pages, missing
//! credentials) and reports them as diagnostics instead of failing at the
//! first problem.

use std::path::PathBuf;

use crate::schema::{MAX_PAGE_SIZE, ShelfsyncConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "schedule.low_stock_time"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Validate an already-loaded config.
#[must_use]
pub fn validate(config: &ShelfsyncConfig, config_path: Option<PathBuf>) -> ValidationResult {
    let mut result = ValidationResult {
        diagnostics: Vec::new(),
        config_path,
    };

    let catalog = &config.catalog;
    if !catalog.has_credentials() {
        result.push(
            Severity::Warning,
            "catalog",
            "store_name and access_token are not both set; every sync run will fail",
        );
    }
    if catalog.page_size == 0 || catalog.page_size > MAX_PAGE_SIZE {
        result.push(
            Severity::Error,
            "catalog.page_size",
            format!("must be between 1 and {MAX_PAGE_SIZE}"),
        );
    }
    if catalog.timeout_secs == 0 {
        result.push(Severity::Error, "catalog.timeout_secs", "must be > 0");
    }

    if config.database.url.trim().is_empty() {
        result.push(Severity::Error, "database.url", "must not be empty");
    }

    if config.sync.low_stock_threshold < 0 {
        result.push(
            Severity::Warning,
            "sync.low_stock_threshold",
            "negative threshold never matches any product",
        );
    }
    if config.sync.retention_days == 0 {
        result.push(
            Severity::Warning,
            "sync.retention_days",
            "0 deletes every run on each cleanup",
        );
    }

    let schedule = &config.schedule;
    if !(1..=24).contains(&schedule.sync_every_hours) {
        result.push(
            Severity::Error,
            "schedule.sync_every_hours",
            "must be between 1 and 24",
        );
    }
    if let Err(e) = schedule.low_stock_at() {
        result.push(Severity::Error, "schedule.low_stock_time", e.to_string());
    }
    if let Err(e) = schedule.cleanup_at() {
        result.push(Severity::Error, "schedule.cleanup_time", e.to_string());
    }
    if let Err(e) = schedule.cleanup_day() {
        result.push(Severity::Error, "schedule.cleanup_weekday", e.to_string());
    }

    result
}
