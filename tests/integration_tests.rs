//! Full-router integration tests driven through `tower::ServiceExt::oneshot`
//! against an in-memory SQLite database — no bound socket required.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use retailease::crypto::signer::LicenseSigner;
use retailease::server::routes::build_router;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.expect("collect body").to_bytes();
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

#[tokio::test]
async fn health_reports_connected() {
    let db = common::setup_db().await;
    let state = common::build_state(db, std::env::temp_dir());
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn validate_license_activates_a_fresh_machine() {
    let db = common::setup_db().await;
    let kp = common::seed_key_pair(&db).await.expect("seed key pair");
    let mut license = common::sample_license(&kp, String::new());
    let code = LicenseSigner::sign(
        &retailease::crypto::signer::LicensePayload {
            lid: license.id.clone(),
            cname: license.customer_name.clone(),
            cemail: license.customer_email.clone(),
            ltype: license.license_type.clone(),
            vfrom: license.valid_from,
            vuntil: license.valid_until,
            maxact: license.max_activations as u32,
            iat: chrono::Utc::now().naive_utc(),
        },
        &kp.private_key().unwrap(),
    )
    .expect("sign license");
    license.license_code = code.clone();
    db.insert_license(&license).await.expect("insert license");

    let app = build_router(common::build_state(db, std::env::temp_dir()));
    let response = app
        .oneshot(json_request(
            "POST",
            "/license/validate",
            json!({ "license_code": code, "machine_id": "machine-1", "machine_name": "Front Till" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["license"]["status"], "active");
}

#[tokio::test]
async fn validate_license_rejects_malformed_code_without_touching_the_database() {
    let db = common::setup_db().await;
    common::seed_key_pair(&db).await.expect("seed key pair");
    let app = build_router(common::build_state(db, std::env::temp_dir()));

    let response = app
        .oneshot(json_request(
            "POST",
            "/license/validate",
            json!({ "license_code": "not-a-real-code", "machine_id": "machine-1", "machine_name": null }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["valid"], false);
    assert!(body["error"].as_str().unwrap().len() > 0);
}

#[tokio::test]
async fn auth_flow_mints_token_and_provisions_business_and_counter() {
    let db = common::setup_db().await;
    let kp = common::seed_key_pair(&db).await.expect("seed key pair");
    let license = common::sample_license(&kp, "auth-flow-code".to_string());
    db.insert_license(&license).await.expect("insert license");

    let app = build_router(common::build_state(db.clone(), std::env::temp_dir()));

    let auth_response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/retailease/auth/",
            json!({
                "license_id": license.id,
                "machine_id": "till-1",
                "machine_name": "Front Till",
                "device_type": "pos",
                "os_info": "linux",
                "app_version": "1.0.0",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(auth_response.status(), StatusCode::OK);
    let auth_body = body_json(auth_response).await;
    let token = auth_body["token"].as_str().expect("token present").to_string();
    assert!(auth_body["counter"].is_null());

    let register_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/retailease/business/register")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::from(json!({ "name": "Acme Store", "email": "owner@acme.test" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(register_response.status(), StatusCode::OK);

    let status_response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/retailease/status")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(status_response.status(), StatusCode::OK);
    let status_body = body_json(status_response).await;
    assert_eq!(status_body["valid"], true);
}

#[tokio::test]
async fn status_rejects_missing_bearer_token() {
    let db = common::setup_db().await;
    let app = build_router(common::build_state(db, std::env::temp_dir()));

    let response = app
        .oneshot(Request::builder().uri("/retailease/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_create_get_and_revoke_license() {
    let db = common::setup_db().await;
    common::seed_key_pair(&db).await.expect("seed key pair");
    let app = build_router(common::build_state(db, std::env::temp_dir()));

    let create_response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/admin/licenses",
            json!({
                "admin_key": "test-admin-key",
                "customer_name": "Beta Retail",
                "customer_email": "beta@example.test",
                "customer_company": null,
                "customer_phone": null,
                "license_type": "standard",
                "max_activations": 3,
                "billing_cycle": "monthly",
                "valid_days": 30,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(create_response.status(), StatusCode::OK);
    let created = body_json(create_response).await;
    let license_id = created["id"].as_str().unwrap().to_string();

    let get_response = app
        .clone()
        .oneshot(Request::builder().uri(format!("/admin/licenses/{license_id}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(get_response.status(), StatusCode::OK);

    let revoke_response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/admin/licenses/{license_id}/revoke"),
            json!({ "admin_key": "test-admin-key", "reason": "chargeback" }),
        ))
        .await
        .unwrap();
    assert_eq!(revoke_response.status(), StatusCode::OK);
    let revoked = body_json(revoke_response).await;
    assert_eq!(revoked["license"]["status"], "revoked");
}

#[tokio::test]
async fn admin_extend_overrides_valid_until_directly() {
    let db = common::setup_db().await;
    let kp = common::seed_key_pair(&db).await.expect("seed key pair");
    let license = common::sample_license(&kp, "REP-EXTEND-0".to_string());
    let license_id = license.id.clone();
    let old_valid_until = license.valid_until;
    db.insert_license(&license).await.expect("insert license");
    let app = build_router(common::build_state(db.clone(), std::env::temp_dir()));

    let new_valid_until = old_valid_until + chrono::Duration::days(60);
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/admin/licenses/{license_id}/extend"),
            json!({
                "admin_key": "test-admin-key",
                "new_valid_until": new_valid_until,
                "reason": "goodwill extension",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let updated = db.get_license(&license_id).await.expect("get license").expect("license present");
    assert_eq!(updated.valid_until, new_valid_until);
}

#[tokio::test]
async fn admin_reinstate_applies_optional_new_valid_until() {
    let db = common::setup_db().await;
    let kp = common::seed_key_pair(&db).await.expect("seed key pair");
    let mut license = common::sample_license(&kp, "REP-REINSTATE-0".to_string());
    license.status = "suspended".to_string();
    license.grace_period_ends_at = Some(license.valid_until);
    let license_id = license.id.clone();
    db.insert_license(&license).await.expect("insert license");
    let app = build_router(common::build_state(db.clone(), std::env::temp_dir()));

    let new_valid_until = chrono::Utc::now().naive_utc() + chrono::Duration::days(90);
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/admin/licenses/{license_id}/reinstate"),
            json!({
                "admin_key": "test-admin-key",
                "new_valid_until": new_valid_until,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let updated = db.get_license(&license_id).await.expect("get license").expect("license present");
    assert_eq!(updated.status, "active");
    assert_eq!(updated.valid_until, new_valid_until);
}

#[tokio::test]
async fn admin_action_rejects_wrong_admin_key() {
    let db = common::setup_db().await;
    common::seed_key_pair(&db).await.expect("seed key pair");
    let app = build_router(common::build_state(db, std::env::temp_dir()));

    let response = app
        .oneshot(json_request(
            "POST",
            "/admin/licenses",
            json!({
                "admin_key": "wrong-key",
                "customer_name": "Beta Retail",
                "customer_email": "beta@example.test",
                "customer_company": null,
                "customer_phone": null,
                "license_type": "standard",
                "max_activations": 3,
                "billing_cycle": "monthly",
                "valid_days": 30,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn backup_upload_download_round_trip() {
    let db = common::setup_db().await;
    let kp = common::seed_key_pair(&db).await.expect("seed key pair");
    let license = common::sample_license(&kp, "backup-flow-code".to_string());
    db.insert_license(&license).await.expect("insert license");

    let storage_root = std::env::temp_dir().join(format!("retailease-test-{}", uuid::Uuid::new_v4()));
    let app = build_router(common::build_state(db.clone(), storage_root));

    let auth_response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/retailease/auth/",
            json!({ "license_id": license.id, "machine_id": "till-1", "machine_name": "Front Till" }),
        ))
        .await
        .unwrap();
    let token = body_json(auth_response).await["token"].as_str().unwrap().to_string();

    let boundary = "retailease-test-boundary";
    let file_contents = b"encrypted-backup-bytes";
    let mut multipart_body = Vec::new();
    multipart_body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"backup_type\"\r\n\r\nmanual\r\n"
        )
        .as_bytes(),
    );
    multipart_body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"backup.enc\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    multipart_body.extend_from_slice(file_contents);
    multipart_body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let upload_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/retailease/backups/upload/")
                .header("authorization", format!("Bearer {token}"))
                .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                .header("x-forwarded-for", "203.0.113.7")
                .body(Body::from(multipart_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(upload_response.status(), StatusCode::OK);
    let upload_body = body_json(upload_response).await;
    let backup_id = upload_body["backup"]["id"].as_str().unwrap().to_string();

    let download_response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/retailease/backups/{backup_id}"))
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(download_response.status(), StatusCode::OK);
    let downloaded = download_response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&downloaded[..], file_contents);
}

#[tokio::test]
async fn sync_session_start_complete_and_history() {
    let db = common::setup_db().await;
    let kp = common::seed_key_pair(&db).await.expect("seed key pair");
    let license = common::sample_license(&kp, "sync-flow-code".to_string());
    db.insert_license(&license).await.expect("insert license");

    let app = build_router(common::build_state(db.clone(), std::env::temp_dir()));

    let auth_response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/retailease/auth/",
            json!({ "license_id": license.id, "machine_id": "till-1", "machine_name": "Front Till" }),
        ))
        .await
        .unwrap();
    let token = body_json(auth_response).await["token"].as_str().unwrap().to_string();

    let start_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/retailease/sync/start")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::from(json!({ "sync_type": "full", "direction": "upload" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(start_response.status(), StatusCode::OK);
    let sync_id = body_json(start_response).await["id"].as_str().unwrap().to_string();

    let complete_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/retailease/sync/{sync_id}/complete"))
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::from(
                    json!({
                        "records_uploaded": 12,
                        "records_downloaded": 0,
                        "conflicts_detected": 0,
                        "conflicts_resolved": 0,
                        "status": "completed",
                        "error_message": null,
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(complete_response.status(), StatusCode::OK);
    let completed = body_json(complete_response).await;
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["records_uploaded"], 12);

    let history_response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/retailease/sync/history")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(history_response.status(), StatusCode::OK);
    let history = body_json(history_response).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}
