//! SQLite persistence: connection pool, schema migrations, typed queries

pub mod db;
pub mod migrations;

pub use db::{create_pool, get_connection, Asset, DbConnection, DbPool, User};
