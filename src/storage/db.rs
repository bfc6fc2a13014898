use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, Result, Row};

/// A registered bot user.
///
/// The Telegram ID (`tg_id`) is the natural key supplied by the platform;
/// `id` is the internal surrogate key that asset ownership references.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Internal surrogate id
    pub id: i64,
    /// Telegram ID, unique across all users
    pub tg_id: i64,
    /// Telegram username, if available
    pub username: Option<String>,
    /// Registration timestamp (SQLite CURRENT_TIMESTAMP text)
    pub created_at: String,
}

/// A mock collectible owned by exactly one user.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub id: i64,
    /// Internal id of the owning user, never null
    pub owner_user_id: i64,
    pub name: String,
    /// Opaque metadata blob, reserved for future use
    pub data_json: String,
    /// Image reference: https URL when publicly served, file:// path otherwise
    pub image_url: String,
    /// Simulated token identifier, time-derived, not collision-free
    pub token_id: String,
    /// Sale price; <= 0 means not for sale
    pub listed_price: f64,
    pub created_at: String,
}

impl Asset {
    /// Whether the asset currently appears on the marketplace.
    pub fn is_listed(&self) -> bool {
        self.listed_price > 0.0
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and runs schema
/// migrations on the first connection.
pub fn create_pool(database_path: &str) -> anyhow::Result<DbPool> {
    // Busy timeout on every pooled connection so concurrent writers queue
    // on SQLite's lock instead of failing with SQLITE_BUSY.
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.busy_timeout(std::time::Duration::from_secs(5)));
    let pool = Pool::builder().max_size(10).build(manager)?;

    let mut conn = pool.get()?;
    crate::storage::migrations::run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped, which guarantees
/// scoped acquisition and release per request.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

fn user_from_row(row: &Row<'_>) -> Result<User> {
    Ok(User {
        id: row.get(0)?,
        tg_id: row.get(1)?,
        username: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn asset_from_row(row: &Row<'_>) -> Result<Asset> {
    Ok(Asset {
        id: row.get(0)?,
        owner_user_id: row.get(1)?,
        name: row.get(2)?,
        data_json: row.get(3)?,
        image_url: row.get(4)?,
        token_id: row.get(5)?,
        listed_price: row.get(6)?,
        created_at: row.get(7)?,
    })
}

const USER_COLUMNS: &str = "id, tg_id, username, created_at";
const ASSET_COLUMNS: &str = "id, owner_user_id, name, data_json, image_url, token_id, listed_price, created_at";

/// Look up a user by Telegram ID.
pub fn get_user_by_tg_id(conn: &DbConnection, tg_id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE tg_id = ?1", USER_COLUMNS),
        [tg_id],
        user_from_row,
    )
    .optional()
}

/// Resolve a user by Telegram ID, creating the row on first contact.
///
/// Idempotent under concurrent first contacts: the UNIQUE constraint on
/// `tg_id` makes the conflicting insert a no-op rather than an error, so the
/// same Telegram ID always maps to exactly one row. The username is refreshed
/// best-effort on later contacts.
pub fn resolve_or_create_user(conn: &DbConnection, tg_id: i64, username: Option<&str>) -> Result<User> {
    let inserted = conn.execute(
        "INSERT INTO users (tg_id, username) VALUES (?1, ?2) ON CONFLICT(tg_id) DO NOTHING",
        &[&tg_id as &dyn rusqlite::ToSql, &username as &dyn rusqlite::ToSql],
    )?;

    if inserted == 0 {
        if let Some(name) = username {
            conn.execute(
                "UPDATE users SET username = ?1 WHERE tg_id = ?2 AND username IS NOT ?1",
                &[&name as &dyn rusqlite::ToSql, &tg_id as &dyn rusqlite::ToSql],
            )?;
        }
    }

    conn.query_row(
        &format!("SELECT {} FROM users WHERE tg_id = ?1", USER_COLUMNS),
        [tg_id],
        user_from_row,
    )
}

/// Insert a freshly minted asset owned by `owner_user_id` with price 0.
pub fn insert_asset(
    conn: &DbConnection,
    owner_user_id: i64,
    name: &str,
    data_json: &str,
    image_url: &str,
    token_id: &str,
) -> Result<Asset> {
    conn.execute(
        "INSERT INTO assets (owner_user_id, name, data_json, image_url, token_id, listed_price)
         VALUES (?1, ?2, ?3, ?4, ?5, 0)",
        &[
            &owner_user_id as &dyn rusqlite::ToSql,
            &name as &dyn rusqlite::ToSql,
            &data_json as &dyn rusqlite::ToSql,
            &image_url as &dyn rusqlite::ToSql,
            &token_id as &dyn rusqlite::ToSql,
        ],
    )?;
    let id = conn.last_insert_rowid();

    conn.query_row(
        &format!("SELECT {} FROM assets WHERE id = ?1", ASSET_COLUMNS),
        [id],
        asset_from_row,
    )
}

/// Look up an asset by internal id.
pub fn get_asset(conn: &DbConnection, asset_id: i64) -> Result<Option<Asset>> {
    conn.query_row(
        &format!("SELECT {} FROM assets WHERE id = ?1", ASSET_COLUMNS),
        [asset_id],
        asset_from_row,
    )
    .optional()
}

/// All assets owned by a user, oldest first.
pub fn get_assets_by_owner(conn: &DbConnection, owner_user_id: i64) -> Result<Vec<Asset>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM assets WHERE owner_user_id = ?1 ORDER BY id",
        ASSET_COLUMNS
    ))?;
    let rows = stmt.query_map([owner_user_id], asset_from_row)?;
    rows.collect()
}

/// Assets currently for sale (price > 0), newest-created first, capped at `limit`.
pub fn get_assets_for_sale(conn: &DbConnection, limit: u32) -> Result<Vec<Asset>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM assets WHERE listed_price > 0 ORDER BY created_at DESC, id DESC LIMIT ?1",
        ASSET_COLUMNS
    ))?;
    let rows = stmt.query_map([limit], asset_from_row)?;
    rows.collect()
}

/// Update the listed price, but only if `owner_user_id` still owns the asset.
///
/// The ownership check and the mutation are a single conditional UPDATE, so a
/// concurrent ownership change cannot slip between them. Returns the number
/// of rows changed (0 = wrong owner or no such asset).
pub fn update_price_if_owner(conn: &DbConnection, asset_id: i64, owner_user_id: i64, price: f64) -> Result<usize> {
    conn.execute(
        "UPDATE assets SET listed_price = ?1 WHERE id = ?2 AND owner_user_id = ?3",
        &[
            &price as &dyn rusqlite::ToSql,
            &asset_id as &dyn rusqlite::ToSql,
            &owner_user_id as &dyn rusqlite::ToSql,
        ],
    )
}

/// Reassign ownership, but only if the asset is still owned by `expected_owner`.
///
/// This is the hardened purchase write: of two racing buyers only one can
/// match the expected owner, so exactly one transfer commits and the loser
/// observes 0 rows changed. The price field is deliberately left untouched.
pub fn transfer_owner_if(conn: &DbConnection, asset_id: i64, expected_owner: i64, new_owner: i64) -> Result<usize> {
    conn.execute(
        "UPDATE assets SET owner_user_id = ?1 WHERE id = ?2 AND owner_user_id = ?3",
        &[
            &new_owner as &dyn rusqlite::ToSql,
            &asset_id as &dyn rusqlite::ToSql,
            &expected_owner as &dyn rusqlite::ToSql,
        ],
    )
}

/// All users, for the admin report.
pub fn get_all_users(conn: &DbConnection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
    let rows = stmt.query_map([], user_from_row)?;
    rows.collect()
}

/// All assets, for the admin report.
pub fn get_all_assets(conn: &DbConnection) -> Result<Vec<Asset>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM assets ORDER BY id", ASSET_COLUMNS))?;
    let rows = stmt.query_map([], asset_from_row)?;
    rows.collect()
}
