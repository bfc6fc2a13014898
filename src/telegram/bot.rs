//! Bot initialization and the command surface
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Command registration in the Telegram UI

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "I can:")]
pub enum Command {
    #[command(description = "register and show the welcome message")]
    Start,
    #[command(description = "show your collectibles")]
    Profile,
    #[command(description = "mint a new collectible")]
    Mint,
    #[command(description = "browse collectibles for sale")]
    Market,
    #[command(description = "put a collectible up for sale: /list <id> <price>")]
    List(String),
    #[command(description = "admin report (allow-listed users only)")]
    Admin,
    #[command(description = "show this help")]
    Help,
}

/// Creates a Bot instance from the configured token
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - BOT_TOKEN / TELOXIDE_TOKEN not configured
pub fn create_bot() -> anyhow::Result<Bot> {
    let token = config::BOT_TOKEN.as_str();
    if token.is_empty() {
        return Err(anyhow::anyhow!("BOT_TOKEN environment variable not set"));
    }
    Ok(Bot::new(token))
}

/// Sets up bot commands in Telegram UI
///
/// The /admin command is deliberately left unregistered so it stays out of
/// the command menu for regular users.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "register and show the welcome message"),
        BotCommand::new("profile", "show your collectibles"),
        BotCommand::new("mint", "mint a new collectible"),
        BotCommand::new("market", "browse collectibles for sale"),
        BotCommand::new("list", "put a collectible up for sale: /list <id> <price>"),
        BotCommand::new("help", "show help"),
    ])
    .await?;

    Ok(())
}
