//! Telegram update handlers.
//!
//! Each handler converts a teloxide update into a core `IncomingUpdate` and hands
//! it to the `CommandDispatcher`. Non-command messages are ignored.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message, User},
};
use tracing::warn;

use psb_core::{
    dispatcher::CommandDispatcher,
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::types::{self, Command, IncomingUpdate},
};

pub async fn handle_message(msg: Message, dispatcher: Arc<CommandDispatcher>) -> ResponseResult<()> {
    if let Some(update) = command_from_message(&msg) {
        dispatch(&dispatcher, update).await;
    }
    Ok(())
}

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    dispatcher: Arc<CommandDispatcher>,
) -> ResponseResult<()> {
    match callback_from_query(&q) {
        Some(update) => dispatch(&dispatcher, update).await,
        // Always answer, otherwise the client keeps spinning.
        None => {
            let _ = bot.answer_callback_query(q.id).await;
        }
    }
    Ok(())
}

async fn dispatch(dispatcher: &CommandDispatcher, update: IncomingUpdate) {
    if let Err(e) = dispatcher.handle(update).await {
        warn!(error = %e, "update handling failed");
    }
}

fn core_user(user: &User) -> (UserId, Option<String>) {
    (UserId(user.id.0 as i64), user.username.clone())
}

fn command_from_message(msg: &Message) -> Option<IncomingUpdate> {
    let text = msg.text()?;
    let (user_id, username) = core_user(msg.from()?);
    Command::parse(ChatId(msg.chat.id.0), user_id, username, text).map(IncomingUpdate::Command)
}

fn callback_from_query(q: &CallbackQuery) -> Option<IncomingUpdate> {
    let message = q.message.as_ref()?;
    let data = q.data.clone().filter(|d| !d.is_empty())?;
    let (user_id, username) = core_user(&q.from);
    let chat_id = ChatId(message.chat.id.0);

    Some(IncomingUpdate::Callback(types::CallbackQuery {
        chat_id,
        user_id,
        username,
        callback_id: q.id.clone(),
        data,
        message: Some(MessageRef {
            chat_id,
            message_id: MessageId(message.id.0),
        }),
    }))
}
