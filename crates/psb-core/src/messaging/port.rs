use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef, UserId},
    messaging::types::{ChatAction, InlineKeyboard, MemberStatus, MessagingCapabilities, TextFormat},
    Result,
};

/// Cross-messenger port.
///
/// Telegram is the only implementation; the shape keeps Telegram types out of the
/// command handlers so they can be driven by fakes in tests.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef>;

    async fn edit_text(&self, msg: MessageRef, text: &str, format: TextFormat) -> Result<()>;

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;

    /// Look up `user_id`'s membership in a public channel given by username (no `@`).
    async fn member_status(&self, channel: &str, user_id: UserId) -> Result<MemberStatus>;
}
