use std::sync::Arc;

use teloxide::Bot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use psb_core::{
    classifier::ProfileRiskClassifier,
    config::Config,
    dispatcher::CommandDispatcher,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    registry::UserRegistry,
    remote::RemoteAccessManager,
    supervisor::Supervisor,
    Error,
};
use psb_instagram::InstagramClient;
use psb_telegram::{router::run_polling, TelegramMessenger};

mod health;
mod restart;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    psb_core::logging::init("psb")?;

    let cfg = Arc::new(Config::load()?);

    let backend = Arc::new(InstagramClient::new(cfg.instagram_request_timeout)?);
    let remote = Arc::new(RemoteAccessManager::new(
        backend,
        cfg.instagram_min_interval,
        cfg.instagram_request_timeout,
    ));
    if !remote.initialize(cfg.instagram_credentials.as_ref()).await {
        warn!("instagram login disabled after repeated failures; profile lookups stay anonymous");
    }

    let bot = Bot::new(cfg.telegram_bot_token.clone());
    // Outgoing calls are paced here; the adapter still retries once on RetryAfter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let dispatcher = Arc::new(CommandDispatcher {
        cfg: cfg.clone(),
        messenger,
        remote,
        classifier: Arc::new(ProfileRiskClassifier::new()),
        users: Arc::new(UserRegistry::new()),
        process: Arc::new(restart::ExecRestarter),
    });

    let shutdown = CancellationToken::new();
    let health = {
        let listener = health::bind(cfg.health_port).await?;
        info!(port = cfg.health_port, "health endpoint listening");
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = health::serve(listener, shutdown).await {
                error!(error = %e, "health endpoint stopped");
            }
        })
    };

    Supervisor::new("telegram-polling", cfg.polling_restart_delay)
        .run(|| {
            let bot = bot.clone();
            let dispatcher = dispatcher.clone();
            async move {
                run_polling(bot, dispatcher)
                    .await
                    .map_err(|e| Error::External(format!("telegram polling failed: {e}")))
            }
        })
        .await;

    shutdown.cancel();
    let _ = health.await;
    info!("shutdown complete");
    Ok(())
}
