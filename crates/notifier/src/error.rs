use thiserror::Error;

/// Failures of the push leg as a whole.
///
/// Individual tokens failing is not an error; those are reported in
/// [`crate::gateway::MulticastReport`].
#[derive(Debug, Error)]
pub enum PushError {
    #[error("push transport is not configured")]
    NotConfigured,

    #[error("invalid push credentials: {0}")]
    Credentials(String),

    #[error("push service unreachable: {0}")]
    Transport(String),

    #[error("device token lookup failed: {0}")]
    TokenLookup(#[from] sqlx::Error),
}

impl From<PushError> for herald_common::error::AppError {
    fn from(err: PushError) -> Self {
        match err {
            PushError::NotConfigured => Self::Config(err.to_string()),
            other => Self::Push(other.to_string()),
        }
    }
}
