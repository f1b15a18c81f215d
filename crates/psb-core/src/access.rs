use tracing::debug;

use crate::{domain::UserId, messaging::port::MessagingPort};

// ============== Authorization ==============

pub fn is_admin(user_id: Option<UserId>, admin: UserId) -> bool {
    user_id == Some(admin)
}

// ============== Channel Gating ==============

/// Whether `user` may use the bot: member, administrator or creator of `channel`.
///
/// Fails closed: any lookup error counts as "not a member".
pub async fn is_channel_member(messenger: &dyn MessagingPort, channel: &str, user: UserId) -> bool {
    match messenger.member_status(channel, user).await {
        Ok(status) => status.is_member(),
        Err(e) => {
            debug!(user_id = user.0, channel, error = %e, "membership lookup failed");
            false
        }
    }
}
