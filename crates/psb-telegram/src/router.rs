use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::info;

use psb_core::dispatcher::CommandDispatcher;

use crate::handlers;

/// Long-poll Telegram until the process receives Ctrl-C.
///
/// Returns `Ok(())` only on shutdown; transport failures surface as errors so the
/// caller's supervisor can restart polling.
pub async fn run_polling(bot: Bot, dispatcher: Arc<CommandDispatcher>) -> anyhow::Result<()> {
    let me = bot.get_me().await?;
    info!(bot = %me.username(), "polling started");

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![dispatcher])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("polling stopped");
    Ok(())
}
