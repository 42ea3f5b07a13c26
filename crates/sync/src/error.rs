use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] shelfsync_catalog::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("sync run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("sync run {run_id} already finished")]
    RunNotPending { run_id: String },

    #[error("product already exists: {external_id}")]
    ProductExists { external_id: String },

    #[error("product not found: {external_id}")]
    ProductNotFound { external_id: String },

    #[error("another sync run is already in progress")]
    AlreadyRunning,

    #[error("ledger {action} failed: {source}")]
    Ledger {
        action: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("notification failed: {message}")]
    Notify { message: String },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn run_not_found(run_id: impl Into<String>) -> Self {
        Self::RunNotFound {
            run_id: run_id.into(),
        }
    }

    #[must_use]
    pub fn ledger(action: &'static str, source: Error) -> Self {
        Self::Ledger {
            action,
            source: Box::new(source),
        }
    }
}

impl shelfsync_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

shelfsync_common::impl_context!();

/// A sync run that did not complete, with the root cause.
///
/// `run_id` is `None` when the run was refused before a ledger row existed.
#[derive(Debug)]
pub struct SyncError {
    pub run_id: Option<String>,
    pub source: Error,
}

impl SyncError {
    /// The underlying error message, without the run prefix.
    #[must_use]
    pub fn root_cause(&self) -> String {
        self.source.to_string()
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.run_id {
            Some(id) => write!(f, "sync run {id} failed: {}", self.source),
            None => write!(f, "sync run not started: {}", self.source),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
