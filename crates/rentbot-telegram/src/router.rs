use std::{sync::Arc, time::Duration};

use teloxide::{
    dispatching::Dispatcher, dptree, error_handlers::LoggingErrorHandler, prelude::*,
    types::BotCommand as TgBotCommand, update_listeners::Polling,
};

use rentbot_core::{
    commands::BotCommand,
    config::Config,
    errors::Error,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    model::client::CompletionClient,
    service::BotService,
    Result,
};

use crate::{handlers, map_err, TelegramMessenger};

/// Headroom between the long-poll timeout and the HTTP client timeout.
const HTTP_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// Build a `Bot` whose HTTP client outlives a long poll and honors the proxy config.
pub fn build_bot(cfg: &Config) -> Result<Bot> {
    let mut builder = teloxide::net::default_reqwest_settings()
        .timeout(cfg.polling_timeout.saturating_add(HTTP_TIMEOUT_MARGIN));
    if let Some(p) = cfg.outbound_proxy() {
        let proxy = reqwest::Proxy::all(p)
            .map_err(|e| Error::Config(format!("invalid proxy for Telegram client: {e}")))?
            .no_proxy(cfg.no_proxy.as_deref().and_then(reqwest::NoProxy::from_string));
        builder = builder.proxy(proxy);
    }
    let client = builder
        .build()
        .map_err(|e| Error::External(format!("telegram client build error: {e}")))?;

    Ok(Bot::with_client(cfg.bot_token.clone(), client))
}

/// `getMe`; returns the bot username. Used at startup and by `rentbot check`.
pub async fn check_telegram(bot: &Bot) -> Result<String> {
    let me = bot.get_me().await.map_err(map_err)?;
    Ok(me.username().to_string())
}

pub fn bot_commands() -> Vec<TgBotCommand> {
    BotCommand::MENU
        .iter()
        .map(|(name, desc)| TgBotCommand::new(*name, *desc))
        .collect()
}

pub async fn run_polling(
    cfg: Arc<Config>,
    completion: Option<Arc<dyn CompletionClient>>,
) -> anyhow::Result<()> {
    let bot = build_bot(&cfg)?;
    let username = check_telegram(&bot).await?;

    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        tracing::warn!(error = %e, "failed to register command menu");
    }

    // Keyword bursts in busy groups are the main source of 429s; space calls out
    // here and keep the single RetryAfter retry in the adapter.
    let raw: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> =
        Arc::new(ThrottledMessenger::new(raw, ThrottleConfig::default()));

    let has_completion = completion.is_some();
    let service = Arc::new(
        BotService::new(cfg.clone(), messenger, completion).with_bot_username(username.clone()),
    );
    let state = service.state().await;

    tracing::info!(
        bot = %username,
        mode = state.mode.label(),
        model = %state.model,
        keywords = cfg.keywords.len(),
        completion = has_completion,
        proxy = cfg.outbound_proxy().is_some(),
        "bot loaded, long polling"
    );

    let listener = Polling::builder(bot.clone())
        .timeout(cfg.polling_timeout)
        .drop_pending_updates()
        .build();

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![service])
        .default_handler(|_| async {})
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("error from the update listener"),
        )
        .await;

    Ok(())
}
