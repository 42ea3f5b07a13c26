use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("catalog credentials not configured")]
    MissingCredentials,

    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("catalog returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to decode catalog page {page}: {source}")]
    Decode {
        page: u32,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    #[must_use]
    pub fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }

    /// Network, timeout, or credential failure, as opposed to the remote
    /// answering with something we can't use.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::MissingCredentials | Self::Transport { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
