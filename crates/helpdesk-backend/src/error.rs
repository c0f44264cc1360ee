use thiserror::Error;

/// Failures surfaced by a backend adapter. The policy layer folds these
/// into its own taxonomy; anything it cannot classify stays wrapped as-is.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account already exists")]
    Duplicate,

    #[error("record not found")]
    NotFound,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("backend request failed: {0}")]
    Transport(String),

    #[error("malformed backend response: {0}")]
    Malformed(String),

    #[error("backend failure: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}
