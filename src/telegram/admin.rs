//! Admin surface: allow-list check and the report dump

use crate::core::config::admin::ADMIN_IDS;
use crate::storage::db::{get_all_assets, get_all_users, DbConnection};

/// Maximum message length for Telegram (with margin)
const MAX_MESSAGE_LENGTH: usize = 4000;

/// Check if user is admin
pub fn is_admin(user_id: i64) -> bool {
    ADMIN_IDS.contains(&user_id)
}

fn truncate_message(text: &str) -> String {
    if text.len() <= MAX_MESSAGE_LENGTH {
        return text.to_string();
    }
    let mut trimmed = text.chars().take(MAX_MESSAGE_LENGTH - 20).collect::<String>();
    trimmed.push_str("\n... (truncated)");
    trimmed
}

/// Build the full users + assets report for the /admin command.
pub fn build_report(conn: &DbConnection) -> rusqlite::Result<String> {
    let users = get_all_users(conn)?;
    let assets = get_all_assets(conn)?;

    let mut report = String::from("📋 Admin report\n\nUsers:\n");
    if users.is_empty() {
        report.push_str("(none)\n");
    }
    for user in &users {
        report.push_str(&format!(
            "- #{} {} (tg {})\n",
            user.id,
            user.username.as_deref().unwrap_or("<no username>"),
            user.tg_id
        ));
    }

    report.push_str("\nAssets:\n");
    if assets.is_empty() {
        report.push_str("(none)\n");
    }
    for asset in &assets {
        report.push_str(&format!(
            "- ID {} | {} | Owner: {} | Price: {}\n  URL: {}\n",
            asset.id, asset.name, asset.owner_user_id, asset.listed_price, asset.image_url
        ));
    }

    Ok(truncate_message(&report))
}
