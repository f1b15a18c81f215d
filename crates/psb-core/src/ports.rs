use async_trait::async_trait;

use crate::{
    domain::{Credentials, Profile},
    Result,
};

/// Failure signals a scraping backend can report.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The username has no corresponding profile.
    #[error("profile does not exist")]
    NotFound,

    /// The backend answered but refused the request (bad credentials, checkpoint, ...).
    #[error("rejected by backend: {0}")]
    Rejected(String),

    /// Network failure, timeout or unexpected HTTP status.
    #[error("request failed: {0}")]
    Request(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Hexagonal port for the scraping backend.
///
/// Implementations must be cheap to share; all pacing and mutual exclusion is
/// done by `RemoteAccessManager`, never by the backend itself.
#[async_trait]
pub trait ProfileBackend: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> std::result::Result<(), BackendError>;

    async fn load_profile(&self, username: &str) -> std::result::Result<Profile, BackendError>;
}

/// Process-level control used by the `/restart` admin command.
pub trait ProcessControl: Send + Sync {
    /// Replace the running process with a fresh copy. Only returns on failure.
    fn restart(&self) -> Result<()>;
}
