use crate::http::HttpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyVaultError {
    /// Required settings are absent; all missing items are reported at once.
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: HttpError,
    },

    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        #[source]
        source: HttpError,
    },

    #[error("{0}")]
    InvalidResponse(String),

    #[error("Cloud \"{cloud}\" not found in instance metadata: {metadata}")]
    CloudNotFound { cloud: String, metadata: String },

    #[error("Failed to read federated token from file \"{path}\": {source}")]
    FederatedTokenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KeyVaultError {
    pub(crate) fn transport(context: &str, source: HttpError) -> Self {
        Self::Transport {
            message: format!("{}: {}", context, source),
            source,
        }
    }

    /// HTTP status of the failed call, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
