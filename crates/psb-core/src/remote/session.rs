use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    domain::Credentials,
    ports::{BackendError, ProfileBackend},
    remote::gate::RateGate,
};

/// Login attempts allowed per process lifetime before falling back to anonymous use.
pub const MAX_LOGIN_ATTEMPTS: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated,
    LoginFailed,
}

impl AuthState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticated => "authenticated",
            Self::LoginFailed => "login failed",
        }
    }
}

/// Read-only snapshot of a `Session`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    pub auth_state: AuthState,
    pub login_attempts: u32,
    pub last_error: Option<String>,
    pub credentials_configured: bool,
}

#[derive(Debug)]
struct SessionState {
    auth_state: AuthState,
    login_attempts: u32,
    last_error: Option<String>,
    credentials_configured: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            auth_state: AuthState::Anonymous,
            login_attempts: 0,
            last_error: None,
            credentials_configured: false,
        }
    }
}

/// The process's single logical connection to the scraping backend.
///
/// Owns the rate gate every backend request passes through and the login
/// bookkeeping. `login_attempts` never exceeds `MAX_LOGIN_ATTEMPTS`; once it
/// reaches it the state is pinned to `LoginFailed` and no more logins happen.
pub struct Session {
    backend: Arc<dyn ProfileBackend>,
    gate: RateGate,
    request_timeout: Duration,
    state: Mutex<SessionState>,
    login_lock: Mutex<()>,
}

impl Session {
    pub fn new(backend: Arc<dyn ProfileBackend>, gate: RateGate, request_timeout: Duration) -> Self {
        Self {
            backend,
            gate,
            request_timeout,
            state: Mutex::new(SessionState::default()),
            login_lock: Mutex::new(()),
        }
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    pub fn backend(&self) -> &dyn ProfileBackend {
        self.backend.as_ref()
    }

    /// Make (at most) one login attempt.
    ///
    /// Returns `true` when the session is usable as configured: authenticated, or
    /// anonymous because no credentials were given. Returns `false` when degraded.
    /// Never fails; problems are logged and recorded in `last_error`.
    pub async fn initialize(&self, credentials: Option<&Credentials>) -> bool {
        let _login = self.login_lock.lock().await;

        let Some(creds) = credentials else {
            let mut st = self.state.lock().await;
            st.credentials_configured = false;
            st.auth_state = AuthState::Anonymous;
            info!("no backend credentials configured; running anonymously");
            return true;
        };

        {
            let mut st = self.state.lock().await;
            st.credentials_configured = true;
            match st.auth_state {
                AuthState::Authenticated => return true,
                AuthState::LoginFailed => {
                    warn!(
                        attempts = st.login_attempts,
                        "login disabled for this process; staying anonymous"
                    );
                    return false;
                }
                AuthState::Anonymous => {}
            }
        }

        self.gate.acquire().await;
        let result = self.bounded(self.backend.login(creds)).await;

        let mut st = self.state.lock().await;
        match result {
            Ok(()) => {
                st.auth_state = AuthState::Authenticated;
                st.login_attempts = 0;
                info!(user = %creds.username, "backend login succeeded");
                true
            }
            Err(e) => {
                st.login_attempts = (st.login_attempts + 1).min(MAX_LOGIN_ATTEMPTS);
                st.last_error = Some(format!("login: {e}"));
                if st.login_attempts >= MAX_LOGIN_ATTEMPTS {
                    st.auth_state = AuthState::LoginFailed;
                }
                warn!(
                    user = %creds.username,
                    attempt = st.login_attempts,
                    max = MAX_LOGIN_ATTEMPTS,
                    error = %e,
                    "backend login failed"
                );
                false
            }
        }
    }

    pub async fn status(&self) -> SessionStatus {
        let st = self.state.lock().await;
        SessionStatus {
            auth_state: st.auth_state,
            login_attempts: st.login_attempts,
            last_error: st.last_error.clone(),
            credentials_configured: st.credentials_configured,
        }
    }

    pub async fn record_error(&self, detail: String) {
        self.state.lock().await.last_error = Some(detail);
    }

    /// Run a backend call under the session's request timeout.
    pub async fn bounded<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, BackendError>>,
    ) -> std::result::Result<T, BackendError> {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(res) => res,
            Err(_) => Err(BackendError::Request(format!(
                "timed out after {}s",
                self.request_timeout.as_secs()
            ))),
        }
    }
}
