//! Exercises `Database` directly against an in-memory SQLite pool: license
//! CRUD, grace-period/expiration sweep queries, and key-pair bootstrap.

mod common;

use chrono::{Duration, Utc};

#[tokio::test]
async fn insert_and_fetch_license_round_trips() {
    let db = common::setup_db().await;
    let kp = common::seed_key_pair(&db).await.expect("seed key pair");
    let license = common::sample_license(&kp, "license-code-1".to_string());

    db.insert_license(&license).await.expect("insert license");

    let fetched = db.get_license(&license.id).await.expect("get license").expect("license present");
    assert_eq!(fetched.id, license.id);
    assert_eq!(fetched.customer_email, "owner@acme.test");
    assert_eq!(fetched.status, "active");
}

#[tokio::test]
async fn upsert_on_conflict_updates_existing_row() {
    let db = common::setup_db().await;
    let kp = common::seed_key_pair(&db).await.expect("seed key pair");
    let mut license = common::sample_license(&kp, "license-code-2".to_string());
    db.insert_license(&license).await.expect("insert license");

    license.status = "suspended".to_string();
    license.notes = Some("suspended for nonpayment".to_string());
    db.insert_license(&license).await.expect("update license");

    let fetched = db.get_license(&license.id).await.expect("get license").expect("license present");
    assert_eq!(fetched.status, "suspended");
    assert_eq!(fetched.notes.as_deref(), Some("suspended for nonpayment"));
}

#[tokio::test]
async fn get_license_by_email_finds_all_matches() {
    let db = common::setup_db().await;
    let kp = common::seed_key_pair(&db).await.expect("seed key pair");
    let a = common::sample_license(&kp, "code-a".to_string());
    let mut b = common::sample_license(&kp, "code-b".to_string());
    b.id = uuid::Uuid::new_v4().to_string();

    db.insert_license(&a).await.expect("insert a");
    db.insert_license(&b).await.expect("insert b");

    let found = db.get_license_by_email("owner@acme.test").await.expect("query by email");
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn get_expired_grace_period_licenses_only_returns_lapsed_suspensions() {
    let db = common::setup_db().await;
    let kp = common::seed_key_pair(&db).await.expect("seed key pair");
    let now = Utc::now().naive_utc();

    let mut lapsed = common::sample_license(&kp, "lapsed".to_string());
    lapsed.status = "suspended".to_string();
    lapsed.grace_period_ends_at = Some(now - Duration::hours(1));

    let mut still_in_grace = common::sample_license(&kp, "still-in-grace".to_string());
    still_in_grace.id = uuid::Uuid::new_v4().to_string();
    still_in_grace.status = "suspended".to_string();
    still_in_grace.grace_period_ends_at = Some(now + Duration::days(1));

    let mut active = common::sample_license(&kp, "active".to_string());
    active.id = uuid::Uuid::new_v4().to_string();

    db.insert_license(&lapsed).await.expect("insert lapsed");
    db.insert_license(&still_in_grace).await.expect("insert still_in_grace");
    db.insert_license(&active).await.expect("insert active");

    let expired = db.get_expired_grace_period_licenses(now).await.expect("query expired grace");
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, lapsed.id);
}

#[tokio::test]
async fn get_expired_licenses_only_returns_active_past_valid_until() {
    let db = common::setup_db().await;
    let kp = common::seed_key_pair(&db).await.expect("seed key pair");
    let now = Utc::now().naive_utc();

    let mut lapsed = common::sample_license(&kp, "lapsed-active".to_string());
    lapsed.valid_until = now - Duration::days(1);

    let mut still_valid = common::sample_license(&kp, "still-valid".to_string());
    still_valid.id = uuid::Uuid::new_v4().to_string();

    let mut already_revoked = common::sample_license(&kp, "already-revoked".to_string());
    already_revoked.id = uuid::Uuid::new_v4().to_string();
    already_revoked.status = "revoked".to_string();
    already_revoked.valid_until = now - Duration::days(1);

    db.insert_license(&lapsed).await.expect("insert lapsed");
    db.insert_license(&still_valid).await.expect("insert still_valid");
    db.insert_license(&already_revoked).await.expect("insert already_revoked");

    let expired = db.get_expired_licenses(now).await.expect("query expired");
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, lapsed.id);
}

#[tokio::test]
async fn get_active_key_pair_returns_most_recently_created() {
    let db = common::setup_db().await;
    let first = common::seed_key_pair(&db).await.expect("seed first key pair");
    // sqlite `created_at` has second resolution; without a delta the two
    // inserts could tie and the "most recent" ordering would be undefined.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let second = common::seed_key_pair(&db).await.expect("seed second key pair");

    let active = db.get_active_key_pair().await.expect("query active key pair").expect("a key pair exists");
    assert_eq!(active.id, second.id);
    assert_ne!(active.id, first.id);
}
