//! Common test utilities
//!
//! Shared across all integration tests.

use mintbay::storage::{create_pool, DbPool};
use tempfile::TempDir;

/// Create a throwaway SQLite database with the full schema applied.
///
/// The TempDir must be kept alive for the lifetime of the pool.
pub fn test_pool() -> (TempDir, DbPool) {
    let dir = TempDir::new().expect("create temp dir");
    let db_path = dir.path().join("test.sqlite");
    let pool = create_pool(db_path.to_str().expect("utf-8 path")).expect("create pool");
    (dir, pool)
}
