use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use nfb_core::{
    config::Config, directory::ProfileDirectory, dispatcher::CommandDispatcher,
    messaging::port::MessagingPort,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<CommandDispatcher>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    directory: Arc<dyn ProfileDirectory>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(bot = %me.username(), "bot started"),
        Err(e) => tracing::warn!(error = %e, "could not fetch bot identity"),
    }
    tracing::info!(
        workers = cfg.resolver_workers,
        temp_dir = %cfg.temp_dir.display(),
        "non-follower checks enabled"
    );

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let dispatcher = Arc::new(CommandDispatcher::from_config(&cfg, messenger, directory));

    // Best-effort: the bot still works without the command menu.
    if let Err(e) = dispatcher.register_commands().await {
        tracing::warn!(error = %e, "failed to register bot commands");
    }

    let state = Arc::new(AppState { dispatcher });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    // No per-chat ordering: `/stop` must reach a user whose check is still running.
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .distribution_function(|_| None::<std::convert::Infallible>)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("dispatcher stopped");
    Ok(())
}
