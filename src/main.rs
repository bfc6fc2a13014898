use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;

use mintbay::cli::{Cli, Commands};
use mintbay::core::{config, init_logger};
use mintbay::storage::create_pool;
use mintbay::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

/// Main entry point for the Telegram bot
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Catch panics from the dispatcher so a bad update is logged instead of
    // silently terminating the process.
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    init_logger(&config::LOG_FILE_PATH)?;

    // Load environment variables from .env if present
    let _ = dotenv();

    match cli.command {
        Some(Commands::Run { webhook }) => {
            log::info!("Running bot (webhook: {})", webhook);
            run_bot(webhook).await
        }
        None => {
            log::info!("No command specified, running bot in long polling mode");
            run_bot(false).await
        }
    }
}

async fn run_bot(use_webhook: bool) -> Result<()> {
    log::info!("Starting bot...");

    let bot = create_bot()?;

    let bot_info = bot.get_me().await?;
    log::info!("Bot username: {:?}, Bot ID: {}", bot_info.username, bot_info.id);

    setup_bot_commands(&bot).await?;

    let db_pool = Arc::new(create_pool(&config::DATABASE_PATH)?);
    log::info!("Database ready at {}", config::DATABASE_PATH.as_str());

    if !config::admin::ADMIN_IDS.is_empty() {
        log::info!("Admin allow-list: {:?}", *config::admin::ADMIN_IDS);
    } else {
        log::warn!("ADMIN_IDS not set; /admin is disabled for everyone");
    }

    let deps = HandlerDeps::new(Arc::clone(&db_pool));
    let handler = schema(deps);

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .enable_ctrlc_handler()
        .build();

    let webhook_url = if use_webhook { config::WEBHOOK_URL.clone() } else { None };

    if let Some(raw_url) = webhook_url {
        let url = url::Url::parse(&raw_url)?;
        let addr = ([0, 0, 0, 0], *config::WEBHOOK_PORT).into();
        log::info!("Starting bot in webhook mode at {} (port {})", url, *config::WEBHOOK_PORT);

        let listener = webhooks::axum(bot.clone(), webhooks::Options::new(addr, url)).await?;
        dispatcher
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await;
    } else {
        if use_webhook {
            log::warn!("--webhook set but WEBHOOK_URL is not configured; falling back to long polling");
        }
        log::info!("Starting bot in long polling mode");
        dispatcher.dispatch().await;
    }

    Ok(())
}
