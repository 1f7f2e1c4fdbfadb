//! Background sweep behavior: grace-period expiry -> revoked, and
//! license expiry -> expired, without a live cron scheduler.

mod common;

use chrono::{Duration, Utc};
use retailease::jobs::{run_grace_period_check, run_license_expiration_check};

#[tokio::test]
async fn grace_period_sweep_revokes_lapsed_suspensions_only() {
    let db = common::setup_db().await;
    let kp = common::seed_key_pair(&db).await.expect("seed key pair");
    let now = Utc::now().naive_utc();

    let mut lapsed = common::sample_license(&kp, "lapsed".to_string());
    lapsed.status = "suspended".to_string();
    lapsed.grace_period_ends_at = Some(now - Duration::hours(1));
    db.insert_license(&lapsed).await.expect("insert lapsed");

    let mut still_in_grace = common::sample_license(&kp, "still-in-grace".to_string());
    still_in_grace.id = uuid::Uuid::new_v4().to_string();
    still_in_grace.status = "suspended".to_string();
    still_in_grace.grace_period_ends_at = Some(now + Duration::days(1));
    db.insert_license(&still_in_grace).await.expect("insert still_in_grace");

    let revoked_count = run_grace_period_check(&db).await.expect("grace period sweep");
    assert_eq!(revoked_count, 1);

    let lapsed_after = db.get_license(&lapsed.id).await.expect("get lapsed").expect("present");
    assert_eq!(lapsed_after.status, "revoked");
    assert_eq!(lapsed_after.revoke_reason.as_deref(), Some("grace period expired"));
    assert!(lapsed_after.revoked_at.is_some());

    let still_in_grace_after =
        db.get_license(&still_in_grace.id).await.expect("get still_in_grace").expect("present");
    assert_eq!(still_in_grace_after.status, "suspended");
}

#[tokio::test]
async fn grace_period_sweep_is_idempotent() {
    let db = common::setup_db().await;
    let kp = common::seed_key_pair(&db).await.expect("seed key pair");
    let now = Utc::now().naive_utc();

    let mut lapsed = common::sample_license(&kp, "lapsed".to_string());
    lapsed.status = "suspended".to_string();
    lapsed.grace_period_ends_at = Some(now - Duration::hours(1));
    db.insert_license(&lapsed).await.expect("insert lapsed");

    assert_eq!(run_grace_period_check(&db).await.expect("first sweep"), 1);
    assert_eq!(run_grace_period_check(&db).await.expect("second sweep"), 0);
}

#[tokio::test]
async fn license_expiration_sweep_expires_lapsed_active_licenses_only() {
    let db = common::setup_db().await;
    let kp = common::seed_key_pair(&db).await.expect("seed key pair");
    let now = Utc::now().naive_utc();

    let mut lapsed = common::sample_license(&kp, "lapsed".to_string());
    lapsed.valid_until = now - Duration::days(1);
    db.insert_license(&lapsed).await.expect("insert lapsed");

    let mut still_valid = common::sample_license(&kp, "still-valid".to_string());
    still_valid.id = uuid::Uuid::new_v4().to_string();
    db.insert_license(&still_valid).await.expect("insert still_valid");

    let expired_count = run_license_expiration_check(&db).await.expect("expiration sweep");
    assert_eq!(expired_count, 1);

    let lapsed_after = db.get_license(&lapsed.id).await.expect("get lapsed").expect("present");
    assert_eq!(lapsed_after.status, "expired");

    let still_valid_after =
        db.get_license(&still_valid.id).await.expect("get still_valid").expect("present");
    assert_eq!(still_valid_after.status, "active");
}
