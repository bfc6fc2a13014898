//! Mintbay - Telegram bot for minting and trading mock digital collectibles
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, and logging
//! - `storage`: SQLite pool, migrations, and typed queries
//! - `mint`: placeholder artwork generation and asset creation
//! - `market`: listing, browsing, and ownership transfer
//! - `telegram`: bot commands, handler tree, and outbound replies

pub mod cli;
pub mod core;
pub mod market;
pub mod mint;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, init_logger, AppError, AppResult};
pub use crate::storage::{create_pool, get_connection, Asset, DbConnection, DbPool, User};
pub use crate::telegram::{schema, HandlerDeps};
