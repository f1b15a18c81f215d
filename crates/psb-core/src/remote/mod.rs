//! Remote-access manager: the single, serialized path to the scraping backend.

pub mod gate;
pub mod session;

use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::{
    domain::{Credentials, Profile},
    ports::{BackendError, ProfileBackend},
};

pub use gate::RateGate;
pub use session::{AuthState, Session, SessionStatus, MAX_LOGIN_ATTEMPTS};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("invalid username")]
    InvalidUsername,

    #[error("profile not found")]
    NotFound,

    #[error("backend error: {0}")]
    Backend(String),
}

/// `Session::status()` plus whether the process runs without credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteStatus {
    pub auth_state: AuthState,
    pub login_attempts: u32,
    pub last_error: Option<String>,
    pub anonymous: bool,
}

/// Strip one leading `@` and surrounding whitespace.
pub fn normalize_username(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('@')
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Single point of access to the scraping backend.
///
/// Every backend call (profile loads and logins) runs while holding `exclusive`,
/// and the rate-gate wait happens inside that critical section, so at most one
/// request is in flight and consecutive requests are at least one gate
/// interval apart no matter how many handlers call in.
pub struct RemoteAccessManager {
    session: Session,
    exclusive: Mutex<()>,
}

impl RemoteAccessManager {
    pub fn new(
        backend: Arc<dyn ProfileBackend>,
        min_interval: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            session: Session::new(backend, RateGate::new(min_interval), request_timeout),
            exclusive: Mutex::new(()),
        }
    }

    /// Log in (retrying up to `MAX_LOGIN_ATTEMPTS` in total) or settle on anonymous mode.
    ///
    /// Returns `false` if credentials were given but login is now disabled.
    pub async fn initialize(&self, credentials: Option<&Credentials>) -> bool {
        let _exclusive = self.exclusive.lock().await;
        loop {
            if self.session.initialize(credentials).await {
                return true;
            }
            if self.session.status().await.auth_state == AuthState::LoginFailed {
                info!("continuing in anonymous mode after repeated login failures");
                return false;
            }
        }
    }

    pub async fn fetch_profile(&self, raw_username: &str) -> Result<Profile, FetchError> {
        let username = normalize_username(raw_username);
        if username.is_empty() {
            return Err(FetchError::InvalidUsername);
        }

        let _exclusive = self.exclusive.lock().await;
        self.session.gate().acquire().await;

        debug!(username = %username, "loading profile");
        match self
            .session
            .bounded(self.session.backend().load_profile(&username))
            .await
        {
            Ok(profile) => Ok(profile),
            Err(BackendError::NotFound) => {
                info!(username = %username, "profile not found");
                Err(FetchError::NotFound)
            }
            Err(e) => {
                let detail = e.to_string();
                error!(username = %username, error = %detail, "profile fetch failed");
                self.session
                    .record_error(format!("fetch {username}: {detail}"))
                    .await;
                Err(FetchError::Backend(detail))
            }
        }
    }

    pub async fn status(&self) -> RemoteStatus {
        let st = self.session.status().await;
        RemoteStatus {
            auth_state: st.auth_state,
            login_attempts: st.login_attempts,
            last_error: st.last_error,
            anonymous: !st.credentials_configured,
        }
    }
}
