//! Minting: placeholder artwork plus a new asset row
//!
//! Minting is deliberately mock: the "token id" is wall-clock time with a
//! small random suffix, with no uniqueness guarantee. The image artifact is
//! written before the row is inserted, so a failed write never leaves a
//! dangling asset record.

pub mod image;

use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::AppResult;
use crate::storage::db::{self, Asset, DbConnection, User};

/// Typed shape of the asset metadata blob.
///
/// Currently empty — it serializes to `{}` — but gives future attributes a
/// schema'd place to land instead of a free-form string.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AssetMetadata {}

/// Result of a successful mint: the persisted row and the local artifact path.
#[derive(Debug)]
pub struct MintedAsset {
    pub asset: Asset,
    pub image_path: PathBuf,
}

/// Simulated token identifier: unix seconds plus a 4-digit random suffix.
/// Deterministically unfit for collision-freedom, like the original scheme.
fn simulated_token_id() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("{}{:04}", Utc::now().timestamp(), suffix)
}

/// Image reference stored on the asset row. A public https URL when the
/// image directory is served somewhere, a file:// marker otherwise; which
/// one is a deployment concern, not a contract.
fn image_reference(public_base_url: Option<&str>, image_path: &Path) -> String {
    match public_base_url {
        Some(base) => {
            let file_name = image_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("{}/{}", base, file_name)
        }
        None => format!("file://{}", image_path.display()),
    }
}

/// Mint a new collectible for `owner`.
///
/// Generates the placeholder PNG, persists it under `image_dir`, then inserts
/// the asset row (price 0, empty metadata). Artifact write failures abort the
/// mint before any row exists.
pub fn mint_asset(
    conn: &DbConnection,
    owner: &User,
    image_dir: &str,
    public_base_url: Option<&str>,
) -> AppResult<MintedAsset> {
    let token_id = simulated_token_id();
    let name = format!("NFT-{}", token_id);

    std::fs::create_dir_all(image_dir)?;
    let image_path = Path::new(image_dir).join(format!("nft_{}_{}.png", owner.tg_id, token_id));

    let artwork = image::render_placeholder(&name);
    artwork.save(&image_path)?;

    let image_url = image_reference(public_base_url, &image_path);
    let metadata = serde_json::to_string(&AssetMetadata::default())?;
    let asset = db::insert_asset(conn, owner.id, &name, &metadata, &image_url, &token_id)?;

    log::info!(
        "Minted asset {} (token {}) for user {} -> {}",
        asset.id,
        asset.token_id,
        owner.tg_id,
        asset.image_url
    );

    Ok(MintedAsset { asset, image_path })
}
