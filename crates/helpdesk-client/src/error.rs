use helpdesk_backend::BackendError;
use thiserror::Error;

/// Failure taxonomy of the policy layer. Every operation converts whatever
/// went wrong into exactly one of these; the Display string is the
/// transient message the UI shows. Nothing here is fatal to the process —
/// the worst outcome is a forced logout.
#[derive(Debug, Error)]
pub enum Error {
    #[error("user name may only contain letters, digits and underscore")]
    InvalidIdentifier,

    #[error("this user name is already registered")]
    DuplicateIdentity,

    #[error("password must be at least 6 characters")]
    WeakCredential,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("no profile exists for this account")]
    ProfileMissing,

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Validation(&'static str),

    #[error("comment message cannot be empty")]
    EmptyMessage,

    #[error(transparent)]
    Backend(BackendError),
}

impl Error {
    /// Stable machine-readable tag for the shell protocol.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier => "invalid_identifier",
            Self::DuplicateIdentity => "duplicate_identity",
            Self::WeakCredential => "weak_credential",
            Self::InvalidCredentials => "invalid_credentials",
            Self::ProfileMissing => "profile_missing",
            Self::NotFound => "not_found",
            Self::Validation(_) => "validation",
            Self::EmptyMessage => "empty_message",
            Self::Backend(_) => "backend",
        }
    }
}

impl From<BackendError> for Error {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::InvalidCredentials => Self::InvalidCredentials,
            BackendError::Duplicate => Self::DuplicateIdentity,
            BackendError::NotFound => Self::NotFound,
            other => Self::Backend(other),
        }
    }
}
