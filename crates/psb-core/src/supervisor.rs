use std::{future::Future, time::Duration};

use tracing::{error, info, warn};

use crate::Result;

/// Keeps a long-running loop alive: restarts it after `restart_delay` whenever it
/// fails or panics. A clean `Ok(())` return is treated as a shutdown request.
#[derive(Clone, Debug)]
pub struct Supervisor {
    name: String,
    restart_delay: Duration,
}

impl Supervisor {
    pub fn new(name: impl Into<String>, restart_delay: Duration) -> Self {
        Self {
            name: name.into(),
            restart_delay,
        }
    }

    pub async fn run<F, Fut>(&self, mut start: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut restarts: u64 = 0;
        loop {
            info!(task = %self.name, restarts, "starting supervised loop");
            match tokio::spawn(start()).await {
                Ok(Ok(())) => {
                    info!(task = %self.name, "supervised loop stopped");
                    return;
                }
                Ok(Err(e)) => {
                    error!(task = %self.name, error = %e, "supervised loop failed");
                }
                Err(join) if join.is_panic() => {
                    error!(task = %self.name, "supervised loop panicked");
                }
                Err(join) => {
                    error!(task = %self.name, error = %join, "supervised loop aborted");
                }
            }

            restarts += 1;
            warn!(
                task = %self.name,
                delay_secs = self.restart_delay.as_secs_f64(),
                "restarting after backoff"
            );
            tokio::time::sleep(self.restart_delay).await;
        }
    }
}
