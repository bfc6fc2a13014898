use once_cell::sync::Lazy;
use std::env;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: mintbay.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "mintbay.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: mintbay.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "mintbay.log".to_string()));

/// Webhook URL for Telegram updates
/// Read from WEBHOOK_URL environment variable; unset means long polling
pub static WEBHOOK_URL: Lazy<Option<String>> = Lazy::new(|| env::var("WEBHOOK_URL").ok());

/// Local port the webhook listener binds to
/// Read from WEBHOOK_PORT environment variable
/// Default: 8443
pub static WEBHOOK_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEBHOOK_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8443)
});

/// Directory where generated collectible images are written
/// Read from IMAGE_DIR environment variable
/// Default: asset_images
pub static IMAGE_DIR: Lazy<String> =
    Lazy::new(|| env::var("IMAGE_DIR").unwrap_or_else(|_| "asset_images".to_string()));

/// Public base URL under which IMAGE_DIR is served, if any
/// Read from PUBLIC_BASE_URL environment variable
/// When unset, stored image references fall back to file:// paths
pub static PUBLIC_BASE_URL: Lazy<Option<String>> = Lazy::new(|| {
    env::var("PUBLIC_BASE_URL")
        .ok()
        .map(|s| s.trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
});

/// Admin access configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    fn parse_admin_ids(raw: &str) -> Vec<i64> {
        raw.split([',', ' ', '\n', '\t'])
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    }

    /// Admin user IDs (comma-separated)
    /// Read from ADMIN_IDS environment variable
    pub static ADMIN_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
        env::var("ADMIN_IDS")
            .ok()
            .map(|raw| parse_admin_ids(&raw))
            .unwrap_or_default()
    });

    #[cfg(test)]
    mod tests {
        use super::parse_admin_ids;

        #[test]
        fn parses_mixed_separators() {
            assert_eq!(parse_admin_ids("1, 2\n3\t4"), vec![1, 2, 3, 4]);
        }

        #[test]
        fn skips_garbage_entries() {
            assert_eq!(parse_admin_ids("10,abc, 20"), vec![10, 20]);
        }
    }
}

/// Marketplace configuration
pub mod market {
    use once_cell::sync::Lazy;
    use std::env;

    /// Maximum number of listings shown by /market
    pub const DEFAULT_PAGE_SIZE: u32 = 10;

    /// Page size, overridable via MARKET_PAGE_SIZE
    pub static PAGE_SIZE: Lazy<u32> = Lazy::new(|| {
        env::var("MARKET_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
    });
}
