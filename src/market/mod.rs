//! Marketplace engine: listing, browsing, and ownership transfer
//!
//! Both mutations here are single conditional UPDATEs guarded by the owner
//! observed in the same request, so an existence/ownership check can never
//! race a concurrent write into a lost update. Purchase intentionally has no
//! payment step and no listed-for-sale precondition: buying an unlisted
//! (price 0) asset is allowed, matching the original behavior.

use rusqlite::Result;

use crate::storage::db::{self, Asset, DbConnection};

/// Outcome of a price-setting attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOutcome {
    /// Price updated
    Updated,
    /// Asset exists but the requester does not own it
    NotOwner,
    /// No asset with that id
    NotFound,
}

/// Outcome of a purchase attempt.
///
/// Buyer registration is checked by the caller before invoking [`purchase`];
/// an unregistered buyer never reaches this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// Ownership transferred to the buyer
    Bought,
    /// The buyer already owns the asset; nothing changed
    AlreadyOwner,
    /// No asset with that id
    NotFound,
    /// A concurrent purchase won the race; nothing changed for this buyer
    Conflict,
}

/// Set the sale price of an asset the requester owns.
///
/// Price validity (finite, >= 0) is a usage concern enforced by the command
/// parser; this function only decides between updated / denied / not found.
/// Setting price 0 delists the asset.
pub fn set_price(conn: &DbConnection, asset_id: i64, requester_user_id: i64, price: f64) -> Result<ListOutcome> {
    let changed = db::update_price_if_owner(conn, asset_id, requester_user_id, price)?;
    if changed > 0 {
        return Ok(ListOutcome::Updated);
    }

    // Zero rows: disambiguate a missing asset from someone else's asset.
    match db::get_asset(conn, asset_id)? {
        Some(_) => Ok(ListOutcome::NotOwner),
        None => Ok(ListOutcome::NotFound),
    }
}

/// Assets currently for sale, newest first, capped at `limit`.
///
/// An empty result means "nothing currently listed", not an error.
pub fn list_for_sale(conn: &DbConnection, limit: u32) -> Result<Vec<Asset>> {
    db::get_assets_for_sale(conn, limit)
}

/// Transfer ownership of `asset_id` to `buyer_user_id`.
///
/// The transfer is guarded by the owner read in this same call: if another
/// buyer commits first, the guarded UPDATE matches zero rows and this buyer
/// gets [`PurchaseOutcome::Conflict`] instead of a false success.
pub fn purchase(conn: &DbConnection, asset_id: i64, buyer_user_id: i64) -> Result<PurchaseOutcome> {
    let asset = match db::get_asset(conn, asset_id)? {
        Some(asset) => asset,
        None => return Ok(PurchaseOutcome::NotFound),
    };

    if asset.owner_user_id == buyer_user_id {
        return Ok(PurchaseOutcome::AlreadyOwner);
    }

    let changed = db::transfer_owner_if(conn, asset_id, asset.owner_user_id, buyer_user_id)?;
    if changed > 0 {
        log::info!(
            "Asset {} transferred from user {} to user {}",
            asset_id,
            asset.owner_user_id,
            buyer_user_id
        );
        Ok(PurchaseOutcome::Bought)
    } else {
        log::warn!("Purchase of asset {} by user {} lost an ownership race", asset_id, buyer_user_id);
        Ok(PurchaseOutcome::Conflict)
    }
}
