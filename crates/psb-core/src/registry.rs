use std::collections::HashSet;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    domain::{ChatId, UserId},
    messaging::{port::MessagingPort, types::TextFormat},
};

/// In-memory set of subscribers that receive broadcasts.
#[derive(Debug, Default)]
pub struct UserRegistry {
    users: Mutex<HashSet<UserId>>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the user was not registered yet.
    pub async fn add(&self, user: UserId) -> bool {
        self.users.lock().await.insert(user)
    }

    /// Returns `true` if the user was registered.
    pub async fn remove(&self, user: UserId) -> bool {
        self.users.lock().await.remove(&user)
    }

    /// Sorted copy of the current members.
    pub async fn snapshot(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.users.lock().await.iter().copied().collect();
        users.sort();
        users
    }

    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.lock().await.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastTally {
    pub success: usize,
    pub failed: usize,
}

/// Send `text` to every registered user.
///
/// Works on a snapshot, so users added mid-broadcast are not included. A failed
/// send is logged and counted; it never stops the remaining sends.
pub async fn broadcast(
    registry: &UserRegistry,
    messenger: &dyn MessagingPort,
    text: &str,
) -> BroadcastTally {
    let recipients = registry.snapshot().await;
    let mut tally = BroadcastTally::default();

    for user in recipients {
        match messenger
            .send_text(ChatId(user.0), text, TextFormat::Plain, None)
            .await
        {
            Ok(_) => tally.success += 1,
            Err(e) => {
                tally.failed += 1;
                warn!(user_id = user.0, error = %e, "broadcast delivery failed");
            }
        }
    }

    info!(
        success = tally.success,
        failed = tally.failed,
        "broadcast finished"
    );
    tally
}
