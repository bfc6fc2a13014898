//! Contract tests for registration, minting, listing, and purchase

mod common;

use common::test_pool;
use mintbay::market::{self, ListOutcome, PurchaseOutcome};
use mintbay::mint;
use mintbay::storage::db::{self, DbConnection, User};
use mintbay::storage::get_connection;
use pretty_assertions::assert_eq;

fn register(conn: &DbConnection, tg_id: i64, username: &str) -> User {
    db::resolve_or_create_user(conn, tg_id, Some(username)).expect("register user")
}

fn mint_for(conn: &DbConnection, owner: &User, image_dir: &std::path::Path) -> db::Asset {
    mint::mint_asset(conn, owner, image_dir.to_str().expect("utf-8 path"), None)
        .expect("mint asset")
        .asset
}

#[test]
fn registration_is_idempotent() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    let first = register(&conn, 1001, "alice");
    let second = register(&conn, 1001, "alice");

    assert_eq!(first.id, second.id);
    assert_eq!(db::get_all_users(&conn).unwrap().len(), 1);
}

#[test]
fn registration_refreshes_username_best_effort() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    register(&conn, 1001, "alice");
    let renamed = register(&conn, 1001, "alice_renamed");

    assert_eq!(renamed.username.as_deref(), Some("alice_renamed"));
}

#[test]
fn mint_creates_unlisted_asset_with_artifact() {
    let (dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();
    let alice = register(&conn, 1001, "alice");

    let minted = mint::mint_asset(&conn, &alice, dir.path().to_str().unwrap(), None).expect("mint");

    assert_eq!(minted.asset.owner_user_id, alice.id);
    assert_eq!(minted.asset.listed_price, 0.0);
    assert_eq!(minted.asset.data_json, "{}");
    assert!(minted.image_path.exists(), "image artifact should be on disk");
    assert!(minted.asset.image_url.starts_with("file://"));
    assert!(minted.asset.name.ends_with(&minted.asset.token_id));
}

#[test]
fn failed_artifact_write_leaves_no_asset_row() {
    let (dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();
    let alice = register(&conn, 1001, "alice");

    // A regular file where the image directory should be makes the
    // artifact write fail before any row is inserted.
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"occupied").unwrap();
    let bad_dir = blocker.join("images");

    let result = mint::mint_asset(&conn, &alice, bad_dir.to_str().unwrap(), None);

    assert!(result.is_err());
    assert!(db::get_all_assets(&conn).unwrap().is_empty());
}

#[test]
fn non_owner_cannot_set_price() {
    let (dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();
    let alice = register(&conn, 1001, "alice");
    let bob = register(&conn, 1002, "bob");
    let asset = mint_for(&conn, &alice, dir.path());

    let outcome = market::set_price(&conn, asset.id, bob.id, 5.0).unwrap();

    assert_eq!(outcome, ListOutcome::NotOwner);
    let stored = db::get_asset(&conn, asset.id).unwrap().unwrap();
    assert_eq!(stored.listed_price, 0.0, "price must stay unchanged after denial");
}

#[test]
fn set_price_on_missing_asset_is_not_found() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();
    let alice = register(&conn, 1001, "alice");

    let outcome = market::set_price(&conn, 9999, alice.id, 5.0).unwrap();

    assert_eq!(outcome, ListOutcome::NotFound);
}

#[test]
fn owner_can_list_and_delist() {
    let (dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();
    let alice = register(&conn, 1001, "alice");
    let asset = mint_for(&conn, &alice, dir.path());

    assert_eq!(market::set_price(&conn, asset.id, alice.id, 2.5).unwrap(), ListOutcome::Updated);
    let listed = db::get_asset(&conn, asset.id).unwrap().unwrap();
    assert_eq!(listed.listed_price, 2.5);
    assert!(listed.is_listed());

    assert_eq!(market::set_price(&conn, asset.id, alice.id, 0.0).unwrap(), ListOutcome::Updated);
    let delisted = db::get_asset(&conn, asset.id).unwrap().unwrap();
    assert!(!delisted.is_listed());
}

#[test]
fn market_shows_only_listed_assets_newest_first() {
    let (dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();
    let alice = register(&conn, 1001, "alice");

    let first = mint_for(&conn, &alice, dir.path());
    let second = mint_for(&conn, &alice, dir.path());
    let third = mint_for(&conn, &alice, dir.path());

    market::set_price(&conn, second.id, alice.id, 1.0).unwrap();
    market::set_price(&conn, third.id, alice.id, 2.0).unwrap();

    let listings = market::list_for_sale(&conn, 10).unwrap();
    let ids: Vec<i64> = listings.iter().map(|a| a.id).collect();

    assert_eq!(ids, vec![third.id, second.id]);
    assert!(!ids.contains(&first.id), "unlisted asset must never appear");
}

#[test]
fn market_respects_the_listing_cap() {
    let (dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();
    let alice = register(&conn, 1001, "alice");

    for _ in 0..4 {
        let asset = mint_for(&conn, &alice, dir.path());
        market::set_price(&conn, asset.id, alice.id, 1.0).unwrap();
    }

    assert_eq!(market::list_for_sale(&conn, 3).unwrap().len(), 3);
}

#[test]
fn empty_market_is_a_valid_result() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    assert!(market::list_for_sale(&conn, 10).unwrap().is_empty());
}

#[test]
fn purchase_transfers_ownership_and_keeps_price() {
    let (dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();
    let alice = register(&conn, 1001, "alice");
    let bob = register(&conn, 1002, "bob");
    let asset = mint_for(&conn, &alice, dir.path());
    market::set_price(&conn, asset.id, alice.id, 3.0).unwrap();

    let outcome = market::purchase(&conn, asset.id, bob.id).unwrap();

    assert_eq!(outcome, PurchaseOutcome::Bought);
    let stored = db::get_asset(&conn, asset.id).unwrap().unwrap();
    assert_eq!(stored.owner_user_id, bob.id);
    assert_eq!(stored.listed_price, 3.0, "purchase must not touch the price");
}

#[test]
fn self_purchase_is_rejected_without_mutation() {
    let (dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();
    let alice = register(&conn, 1001, "alice");
    let asset = mint_for(&conn, &alice, dir.path());

    let outcome = market::purchase(&conn, asset.id, alice.id).unwrap();

    assert_eq!(outcome, PurchaseOutcome::AlreadyOwner);
    let stored = db::get_asset(&conn, asset.id).unwrap().unwrap();
    assert_eq!(stored.owner_user_id, alice.id);
}

#[test]
fn purchase_of_missing_asset_is_not_found() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();
    let bob = register(&conn, 1002, "bob");

    assert_eq!(market::purchase(&conn, 424242, bob.id).unwrap(), PurchaseOutcome::NotFound);
}

#[test]
fn stale_owner_guard_blocks_lost_updates() {
    let (dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();
    let alice = register(&conn, 1001, "alice");
    let bob = register(&conn, 1002, "bob");
    let carol = register(&conn, 1003, "carol");
    let asset = mint_for(&conn, &alice, dir.path());

    // Bob's purchase commits between Carol's ownership read and her write.
    let stale_owner = asset.owner_user_id;
    assert_eq!(db::transfer_owner_if(&conn, asset.id, stale_owner, bob.id).unwrap(), 1);

    // Carol's guarded write sees zero matching rows instead of clobbering.
    assert_eq!(db::transfer_owner_if(&conn, asset.id, stale_owner, carol.id).unwrap(), 0);

    let stored = db::get_asset(&conn, asset.id).unwrap().unwrap();
    assert_eq!(stored.owner_user_id, bob.id);
}

#[test]
fn concurrent_purchases_end_with_exactly_one_owner() {
    let (dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();
    let alice = register(&conn, 1001, "alice");
    let bob = register(&conn, 1002, "bob");
    let carol = register(&conn, 1003, "carol");
    let asset = mint_for(&conn, &alice, dir.path());
    drop(conn);

    let mut handles = Vec::new();
    for buyer_id in [bob.id, carol.id] {
        let pool = pool.clone();
        let asset_id = asset.id;
        handles.push(std::thread::spawn(move || {
            let conn = get_connection(&pool).expect("pooled connection");
            market::purchase(&conn, asset_id, buyer_id).expect("purchase")
        }));
    }
    let outcomes: Vec<PurchaseOutcome> = handles.into_iter().map(|h| h.join().expect("join")).collect();

    let conn = get_connection(&pool).unwrap();
    let stored = db::get_asset(&conn, asset.id).unwrap().unwrap();

    // Exactly one final owner, and it is one of the buyers.
    assert!(stored.owner_user_id == bob.id || stored.owner_user_id == carol.id);
    // At least one buyer succeeded, and a losing buyer never saw Bought.
    assert!(outcomes.contains(&PurchaseOutcome::Bought));
    if outcomes.iter().filter(|o| **o == PurchaseOutcome::Bought).count() == 1 {
        let winner = if outcomes[0] == PurchaseOutcome::Bought { bob.id } else { carol.id };
        assert_eq!(stored.owner_user_id, winner);
    }
}
