//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the bot. Each command
//! and callback is split into a synchronous reply builder that does all the
//! storage work and an async endpoint that only sends. The builders return
//! plain data and drop their pooled connection before the endpoint awaits
//! anything, which keeps the endpoint futures `Send` and guarantees the
//! storage mutation is committed before any reply goes out.
//!
//! Registration is asymmetric on purpose — /start auto-creates the caller's
//! user row, while /profile, /mint, /list and the buy button reject
//! unregistered callers with a register hint. That onboarding gate is carried
//! over from the original bots, not an oversight to unify.

use std::path::PathBuf;
use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, Message};
use teloxide::utils::command::BotCommands;

use crate::core::config;
use crate::core::error::AppResult;
use crate::market::{self, ListOutcome, PurchaseOutcome};
use crate::mint;
use crate::storage::db::{self, Asset, DbConnection, DbPool, User};
use crate::telegram::admin::{build_report, is_admin};
use crate::telegram::bot::Command;
use crate::telegram::notifications::{answer_callback, send_photo_with_caption, send_text, send_text_with_keyboard};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }
}

const INTERNAL_ERROR_REPLY: &str = "Something went wrong on my side. Please try again.";
const REGISTER_HINT: &str = "You are not registered yet. Use /start first.";

/// A photo reply: caption plus the image references the send helper needs
/// for its local-file / URL / text fallback chain.
struct AssetCard {
    caption: String,
    local_path: Option<PathBuf>,
    image_url: String,
}

impl AssetCard {
    fn for_asset(asset: &Asset) -> Self {
        let price_line = if asset.is_listed() {
            format!("For sale at {}", asset.listed_price)
        } else {
            "Not for sale".to_string()
        };
        Self {
            caption: format!("#{} {}\nToken: {}\n{}", asset.id, asset.name, asset.token_id, price_line),
            local_path: asset.image_url.strip_prefix("file://").map(PathBuf::from),
            image_url: asset.image_url.clone(),
        }
    }
}

/// Reply shape for commands that may answer with photos.
enum CardsReply {
    Text(String),
    Cards(Vec<AssetCard>),
}

/// Reply shape for /market: each listing gets its own message with a buy
/// button carrying the asset id.
enum MarketReply {
    Text(String),
    Listings(Vec<Listing>),
}

struct Listing {
    text: String,
    asset_id: i64,
}

/// A callback answer plus an optional follow-up chat message.
struct BuyReply {
    ack: String,
    follow_up: Option<String>,
}

impl BuyReply {
    fn ack_only(ack: &str) -> Self {
        Self { ack: ack.to_string(), follow_up: None }
    }
}

/// Creates the main dispatcher schema for the bot.
///
/// The same schema is used in production and in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_callback = deps.clone();

    dptree::entry()
        // Command handler
        .branch(command_handler(deps_commands))
        // Buy-button callback handler
        .branch(callback_handler(deps_callback))
        // Anything else gets the command summary
        .branch(help_fallback_handler())
}

/// Handler for bot commands (/start, /mint, /market, etc.)
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command: {:?} from chat {}", cmd, msg.chat.id);

                match cmd {
                    Command::Start => handle_start_command(&bot, &msg, &deps).await,
                    Command::Profile => handle_profile_command(&bot, &msg, &deps).await,
                    Command::Mint => handle_mint_command(&bot, &msg, &deps).await,
                    Command::Market => handle_market_command(&bot, &msg, &deps).await,
                    Command::List(args) => handle_list_command(&bot, &msg, &deps, &args).await,
                    Command::Admin => handle_admin_command(&bot, &msg, &deps).await,
                    Command::Help => {
                        send_text(&bot, msg.chat.id, &Command::descriptions().to_string()).await;
                        Ok(())
                    }
                }
            }
        },
    ))
}

/// Handler for inline button presses (buy_<asset_id>)
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move { handle_buy_callback(&bot, &q, &deps).await }
    })
}

/// Any other text gets the help/command summary.
fn help_fallback_handler() -> UpdateHandler<HandlerError> {
    Update::filter_message().endpoint(|bot: Bot, msg: Message| async move {
        send_text(&bot, msg.chat.id, &Command::descriptions().to_string()).await;
        Ok(())
    })
}

fn caller_username(msg: &Message) -> Option<String> {
    msg.from.as_ref().and_then(|u| u.username.clone())
}

fn connection(deps: &HandlerDeps) -> AppResult<DbConnection> {
    Ok(db::get_connection(&deps.db_pool)?)
}

/// Look up the caller's user row without creating one. Commands other than
/// /start require prior registration; the error side carries the reply text
/// for the caller to send after the connection is gone.
fn require_registered(conn: &DbConnection, tg_id: i64) -> Result<User, String> {
    match db::get_user_by_tg_id(conn, tg_id) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(REGISTER_HINT.to_string()),
        Err(e) => {
            log::error!("Failed to look up user {}: {}", tg_id, e);
            Err(INTERNAL_ERROR_REPLY.to_string())
        }
    }
}

fn start_reply(deps: &HandlerDeps, tg_id: i64, username: Option<&str>) -> String {
    let conn = match connection(deps) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get database connection: {}", e);
            return INTERNAL_ERROR_REPLY.to_string();
        }
    };

    let already_registered = matches!(db::get_user_by_tg_id(&conn, tg_id), Ok(Some(_)));

    match db::resolve_or_create_user(&conn, tg_id, username) {
        Ok(user) => {
            let display = user.username.clone().unwrap_or_else(|| "collector".to_string());
            if already_registered {
                format!("Hi {} 👋 you are already registered. Try /mint or /market.", display)
            } else {
                log::info!("Registered new user {} (tg {})", user.id, tg_id);
                format!(
                    "Welcome {} ✅ you are registered!\nMint a collectible with /mint, browse with /market.",
                    display
                )
            }
        }
        Err(e) => {
            log::error!("Failed to register user {}: {}", tg_id, e);
            "Registration failed. Please try again.".to_string()
        }
    }
}

fn profile_reply(deps: &HandlerDeps, tg_id: i64) -> CardsReply {
    let conn = match connection(deps) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get database connection: {}", e);
            return CardsReply::Text(INTERNAL_ERROR_REPLY.to_string());
        }
    };
    let user = match require_registered(&conn, tg_id) {
        Ok(user) => user,
        Err(reply) => return CardsReply::Text(reply),
    };

    let assets = match db::get_assets_by_owner(&conn, user.id) {
        Ok(assets) => assets,
        Err(e) => {
            log::error!("Failed to load assets for user {}: {}", user.id, e);
            return CardsReply::Text(INTERNAL_ERROR_REPLY.to_string());
        }
    };

    if assets.is_empty() {
        return CardsReply::Text("You have no collectibles yet. Mint one with /mint.".to_string());
    }
    CardsReply::Cards(assets.iter().map(AssetCard::for_asset).collect())
}

fn mint_reply(deps: &HandlerDeps, tg_id: i64, image_dir: &str, public_base_url: Option<&str>) -> CardsReply {
    let conn = match connection(deps) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get database connection: {}", e);
            return CardsReply::Text(INTERNAL_ERROR_REPLY.to_string());
        }
    };
    let user = match require_registered(&conn, tg_id) {
        Ok(user) => user,
        Err(reply) => return CardsReply::Text(reply),
    };

    match mint::mint_asset(&conn, &user, image_dir, public_base_url) {
        Ok(minted) => {
            let caption = format!(
                "Minted a new collectible! 🎉\n#{} {}\nToken ID: {}\nURL: {}",
                minted.asset.id, minted.asset.name, minted.asset.token_id, minted.asset.image_url
            );
            CardsReply::Cards(vec![AssetCard {
                caption,
                local_path: Some(minted.image_path),
                image_url: minted.asset.image_url,
            }])
        }
        Err(e) => {
            log::error!("Mint failed for user {}: {}", user.id, e);
            CardsReply::Text("Minting failed. Please try again.".to_string())
        }
    }
}

fn market_reply(deps: &HandlerDeps) -> MarketReply {
    let conn = match connection(deps) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get database connection: {}", e);
            return MarketReply::Text(INTERNAL_ERROR_REPLY.to_string());
        }
    };

    let listings = match market::list_for_sale(&conn, *config::market::PAGE_SIZE) {
        Ok(listings) => listings,
        Err(e) => {
            log::error!("Failed to load marketplace listings: {}", e);
            return MarketReply::Text(INTERNAL_ERROR_REPLY.to_string());
        }
    };

    if listings.is_empty() {
        return MarketReply::Text("Nothing is for sale right now. List yours with /list <id> <price>.".to_string());
    }

    MarketReply::Listings(
        listings
            .iter()
            .map(|asset| Listing {
                text: format!(
                    "#{} {}\nPrice: {}\nToken: {}\nImage: {}",
                    asset.id, asset.name, asset.listed_price, asset.token_id, asset.image_url
                ),
                asset_id: asset.id,
            })
            .collect(),
    )
}

fn list_reply(deps: &HandlerDeps, tg_id: i64, args: &str) -> String {
    const USAGE: &str = "Usage: /list <asset id> <price>, e.g. /list 1 2.5";

    let mut parts = args.split_whitespace();
    let (Some(id_raw), Some(price_raw), None) = (parts.next(), parts.next(), parts.next()) else {
        return USAGE.to_string();
    };
    let Ok(asset_id) = id_raw.parse::<i64>() else {
        return USAGE.to_string();
    };
    let price = match price_raw.parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => price,
        _ => return "Price must be a number of 0 or more.".to_string(),
    };

    let conn = match connection(deps) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get database connection: {}", e);
            return INTERNAL_ERROR_REPLY.to_string();
        }
    };
    let user = match require_registered(&conn, tg_id) {
        Ok(user) => user,
        Err(reply) => return reply,
    };

    match market::set_price(&conn, asset_id, user.id, price) {
        Ok(ListOutcome::Updated) => {
            if price > 0.0 {
                format!("Collectible #{} is now listed at {}.", asset_id, price)
            } else {
                format!("Collectible #{} is no longer for sale.", asset_id)
            }
        }
        Ok(ListOutcome::NotOwner) => "You can only list collectibles you own.".to_string(),
        Ok(ListOutcome::NotFound) => format!("No collectible with id {}.", asset_id),
        Err(e) => {
            log::error!("set_price({}, {}, {}) failed: {}", asset_id, user.id, price, e);
            INTERNAL_ERROR_REPLY.to_string()
        }
    }
}

fn admin_reply(deps: &HandlerDeps, tg_id: i64) -> String {
    if !is_admin(tg_id) {
        return "❌ You are not allowed to use this command.".to_string();
    }

    let conn = match connection(deps) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get database connection: {}", e);
            return INTERNAL_ERROR_REPLY.to_string();
        }
    };

    match build_report(&conn) {
        Ok(report) => report,
        Err(e) => {
            log::error!("Failed to build admin report: {}", e);
            "Failed to build the report.".to_string()
        }
    }
}

/// Resolve a buy button press into a callback answer and optional follow-up.
/// Any ownership transfer is committed before this returns; sends happen
/// afterwards and cannot undo it.
fn buy_reply(deps: &HandlerDeps, payload: Option<&str>, buyer_tg_id: Option<i64>) -> BuyReply {
    let Some(asset_id) = payload.and_then(|d| d.strip_prefix("buy_")).and_then(|id| id.parse::<i64>().ok()) else {
        log::warn!("Unrecognized callback payload: {:?}", payload);
        return BuyReply::ack_only("Unrecognized action");
    };

    let Some(buyer_tg_id) = buyer_tg_id else {
        return BuyReply::ack_only("Unrecognized caller");
    };

    let conn = match connection(deps) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get database connection: {}", e);
            return BuyReply::ack_only("Something went wrong, try again");
        }
    };

    // Purchase requires prior registration; the buy path never auto-creates.
    let buyer = match db::get_user_by_tg_id(&conn, buyer_tg_id) {
        Ok(Some(user)) => user,
        Ok(None) => {
            return BuyReply {
                ack: "Register with /start first".to_string(),
                follow_up: Some("You need to register before buying. Use /start.".to_string()),
            };
        }
        Err(e) => {
            log::error!("Failed to look up buyer {}: {}", buyer_tg_id, e);
            return BuyReply::ack_only("Something went wrong, try again");
        }
    };

    match market::purchase(&conn, asset_id, buyer.id) {
        Ok(PurchaseOutcome::Bought) => BuyReply {
            ack: "Purchase complete! 🎉".to_string(),
            follow_up: Some(format!("Collectible #{} is now yours.", asset_id)),
        },
        Ok(PurchaseOutcome::AlreadyOwner) => BuyReply::ack_only("You already own this one"),
        Ok(PurchaseOutcome::NotFound) => BuyReply::ack_only("This collectible no longer exists"),
        Ok(PurchaseOutcome::Conflict) => BuyReply::ack_only("Someone else got there first"),
        Err(e) => {
            log::error!("purchase({}, {}) failed: {}", asset_id, buyer.id, e);
            BuyReply::ack_only("Something went wrong, try again")
        }
    }
}

async fn send_cards(bot: &Bot, chat_id: ChatId, reply: CardsReply) {
    match reply {
        CardsReply::Text(text) => send_text(bot, chat_id, &text).await,
        CardsReply::Cards(cards) => {
            for card in &cards {
                send_photo_with_caption(bot, chat_id, card.local_path.as_deref(), &card.image_url, &card.caption)
                    .await;
            }
        }
    }
}

async fn handle_start_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let reply = start_reply(deps, msg.chat.id.0, caller_username(msg).as_deref());
    send_text(bot, msg.chat.id, &reply).await;
    Ok(())
}

async fn handle_profile_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let reply = profile_reply(deps, msg.chat.id.0);
    send_cards(bot, msg.chat.id, reply).await;
    Ok(())
}

async fn handle_mint_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let reply = mint_reply(deps, msg.chat.id.0, &config::IMAGE_DIR, config::PUBLIC_BASE_URL.as_deref());
    send_cards(bot, msg.chat.id, reply).await;
    Ok(())
}

async fn handle_market_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    match market_reply(deps) {
        MarketReply::Text(text) => send_text(bot, msg.chat.id, &text).await,
        MarketReply::Listings(listings) => {
            for listing in &listings {
                let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
                    "💰 Buy",
                    format!("buy_{}", listing.asset_id),
                )]]);
                send_text_with_keyboard(bot, msg.chat.id, &listing.text, keyboard).await;
            }
        }
    }
    Ok(())
}

async fn handle_list_command(bot: &Bot, msg: &Message, deps: &HandlerDeps, args: &str) -> Result<(), HandlerError> {
    let reply = list_reply(deps, msg.chat.id.0, args);
    send_text(bot, msg.chat.id, &reply).await;
    Ok(())
}

async fn handle_admin_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let reply = admin_reply(deps, msg.chat.id.0);
    send_text(bot, msg.chat.id, &reply).await;
    Ok(())
}

async fn handle_buy_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let chat_id = q.message.as_ref().map(|m| m.chat().id);
    let buyer_tg_id = i64::try_from(q.from.id.0).ok();

    let reply = buy_reply(deps, q.data.as_deref(), buyer_tg_id);

    // Every button press is acknowledged exactly once, after the mutation.
    answer_callback(bot, q, &reply.ack).await;
    if let (Some(chat_id), Some(text)) = (chat_id, reply.follow_up) {
        send_text(bot, chat_id, &text).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::create_pool;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn test_deps() -> (TempDir, HandlerDeps) {
        let dir = TempDir::new().expect("create temp dir");
        let db_path = dir.path().join("test.sqlite");
        let pool = create_pool(db_path.to_str().expect("utf-8 path")).expect("create pool");
        (dir, HandlerDeps::new(Arc::new(pool)))
    }

    #[test]
    fn unregistered_caller_gets_register_hint_without_a_row() {
        let (_dir, deps) = test_deps();

        let CardsReply::Text(reply) = profile_reply(&deps, 42) else {
            panic!("expected a text reply for an unregistered caller");
        };

        assert_eq!(reply, REGISTER_HINT);
        let conn = connection(&deps).unwrap();
        assert!(db::get_all_users(&conn).unwrap().is_empty(), "the guard must not create a row");
    }

    #[test]
    fn mint_requires_registration() {
        let (dir, deps) = test_deps();

        let CardsReply::Text(reply) = mint_reply(&deps, 42, dir.path().to_str().unwrap(), None) else {
            panic!("expected a text reply for an unregistered caller");
        };

        assert_eq!(reply, REGISTER_HINT);
        let conn = connection(&deps).unwrap();
        assert!(db::get_all_assets(&conn).unwrap().is_empty());
    }

    #[test]
    fn list_requires_registration_after_parsing() {
        let (_dir, deps) = test_deps();

        assert_eq!(list_reply(&deps, 42, "1 2.5"), REGISTER_HINT);
    }

    #[test]
    fn list_rejects_malformed_arguments() {
        let (_dir, deps) = test_deps();
        start_reply(&deps, 7, Some("alice"));

        assert!(list_reply(&deps, 7, "").starts_with("Usage:"));
        assert!(list_reply(&deps, 7, "1").starts_with("Usage:"));
        assert!(list_reply(&deps, 7, "one 2.5").starts_with("Usage:"));
        assert_eq!(list_reply(&deps, 7, "1 free"), "Price must be a number of 0 or more.");
        assert_eq!(list_reply(&deps, 7, "1 -3"), "Price must be a number of 0 or more.");
    }

    #[test]
    fn start_registers_then_mint_returns_a_card() {
        let (dir, deps) = test_deps();

        let greeting = start_reply(&deps, 7, Some("alice"));
        assert!(greeting.contains("registered"));

        let CardsReply::Cards(cards) = mint_reply(&deps, 7, dir.path().to_str().unwrap(), None) else {
            panic!("expected a minted card for a registered caller");
        };
        assert_eq!(cards.len(), 1);
        assert!(cards[0].local_path.as_ref().is_some_and(|p| p.exists()));
    }

    #[test]
    fn unrecognized_callback_payload_is_acknowledged() {
        let (_dir, deps) = test_deps();

        let reply = buy_reply(&deps, Some("noop_7"), Some(42));

        assert_eq!(reply.ack, "Unrecognized action");
        assert!(reply.follow_up.is_none());
    }

    #[test]
    fn unregistered_buyer_is_told_to_register() {
        let (dir, deps) = test_deps();
        start_reply(&deps, 7, Some("seller"));
        let conn = connection(&deps).unwrap();
        let seller = db::get_user_by_tg_id(&conn, 7).unwrap().unwrap();
        let minted = mint::mint_asset(&conn, &seller, dir.path().to_str().unwrap(), None).unwrap();
        drop(conn);

        let reply = buy_reply(&deps, Some(&format!("buy_{}", minted.asset.id)), Some(8));

        assert_eq!(reply.ack, "Register with /start first");
        assert!(reply.follow_up.is_some());
        let conn = connection(&deps).unwrap();
        let stored = db::get_asset(&conn, minted.asset.id).unwrap().unwrap();
        assert_eq!(stored.owner_user_id, seller.id, "an unregistered buyer must not take ownership");
    }

    #[test]
    fn registered_buyer_purchases_via_callback_payload() {
        let (dir, deps) = test_deps();
        start_reply(&deps, 7, Some("seller"));
        start_reply(&deps, 8, Some("buyer"));
        let conn = connection(&deps).unwrap();
        let seller = db::get_user_by_tg_id(&conn, 7).unwrap().unwrap();
        let buyer = db::get_user_by_tg_id(&conn, 8).unwrap().unwrap();
        let minted = mint::mint_asset(&conn, &seller, dir.path().to_str().unwrap(), None).unwrap();
        drop(conn);

        let reply = buy_reply(&deps, Some(&format!("buy_{}", minted.asset.id)), Some(8));

        assert_eq!(reply.ack, "Purchase complete! 🎉");
        let conn = connection(&deps).unwrap();
        let stored = db::get_asset(&conn, minted.asset.id).unwrap().unwrap();
        assert_eq!(stored.owner_user_id, buyer.id);
    }
}
