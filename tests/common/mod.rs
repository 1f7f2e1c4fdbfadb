//! Shared test scaffolding: an in-memory SQLite-backed `Database` with the
//! full RetailEase schema, plus a convenience builder for `AppState`.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;

use retailease::crypto::key_store::KeyPair;
use retailease::errors::LicenseResult;
use retailease::server::activation::ActivationManager;
use retailease::server::backups::BackupIngestor;
use retailease::server::database::{Database, KeyPairRow, License};
use retailease::server::handlers::AppState;
use retailease::server::sync_log::SyncSessionLog;
use retailease::server::tenant::TenantStore;

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE key_pairs (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        private_key_pem TEXT NOT NULL,
        public_key_pem TEXT NOT NULL,
        is_active INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE licenses (
        id TEXT PRIMARY KEY,
        key_pair_id TEXT NOT NULL,
        customer_name TEXT NOT NULL,
        customer_email TEXT NOT NULL,
        customer_company TEXT,
        customer_phone TEXT,
        license_type TEXT NOT NULL,
        status TEXT NOT NULL,
        max_activations INTEGER NOT NULL,
        current_activations INTEGER NOT NULL,
        valid_from TEXT NOT NULL,
        valid_until TEXT NOT NULL,
        billing_cycle TEXT NOT NULL,
        renewal_count INTEGER NOT NULL,
        last_renewed_at TEXT,
        notes TEXT,
        license_code TEXT NOT NULL,
        client_id TEXT,
        grace_period_ends_at TEXT,
        revoked_at TEXT,
        revoke_reason TEXT
    )"#,
    r#"CREATE TABLE activations (
        id TEXT PRIMARY KEY,
        license_id TEXT NOT NULL,
        machine_id TEXT NOT NULL,
        machine_name TEXT,
        activated_at TEXT NOT NULL,
        last_check TEXT NOT NULL,
        is_active INTEGER NOT NULL,
        ip_address TEXT,
        UNIQUE(license_id, machine_id)
    )"#,
    r#"CREATE TABLE businesses (
        id TEXT PRIMARY KEY,
        license_id TEXT NOT NULL,
        name TEXT NOT NULL,
        legal_name TEXT,
        business_type TEXT,
        email TEXT,
        phone TEXT,
        website TEXT,
        address_line1 TEXT,
        address_line2 TEXT,
        city TEXT,
        state TEXT,
        country TEXT,
        postal_code TEXT,
        gst_number TEXT,
        pan_number TEXT,
        currency_code TEXT,
        currency_symbol TEXT,
        date_format TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        last_synced_at TEXT
    )"#,
    r#"CREATE TABLE counters (
        id TEXT PRIMARY KEY,
        business_id TEXT NOT NULL,
        activation_id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        device_name TEXT,
        device_type TEXT,
        os_info TEXT,
        app_version TEXT,
        status TEXT NOT NULL,
        is_primary INTEGER NOT NULL,
        sync_enabled INTEGER NOT NULL,
        last_sync_at TEXT
    )"#,
    r#"CREATE TABLE api_tokens (
        id TEXT PRIMARY KEY,
        token TEXT NOT NULL UNIQUE,
        license_id TEXT NOT NULL,
        counter_id TEXT,
        name TEXT,
        is_active INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        last_used_at TEXT,
        expires_at TEXT
    )"#,
    r#"CREATE TABLE backups (
        id TEXT PRIMARY KEY,
        business_id TEXT NOT NULL,
        counter_id TEXT,
        storage_path TEXT NOT NULL,
        filename TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        checksum TEXT NOT NULL,
        is_encrypted INTEGER NOT NULL,
        encryption_version TEXT,
        backup_type TEXT NOT NULL,
        status TEXT NOT NULL,
        app_version TEXT,
        db_version INTEGER,
        record_counts TEXT,
        notes TEXT,
        created_at TEXT NOT NULL,
        uploaded_at TEXT,
        error_message TEXT
    )"#,
    r#"CREATE TABLE sync_logs (
        id TEXT PRIMARY KEY,
        business_id TEXT NOT NULL,
        counter_id TEXT NOT NULL,
        sync_type TEXT NOT NULL,
        sync_direction TEXT NOT NULL,
        status TEXT NOT NULL,
        records_uploaded INTEGER NOT NULL,
        records_downloaded INTEGER NOT NULL,
        conflicts_detected INTEGER NOT NULL,
        conflicts_resolved INTEGER NOT NULL,
        started_at TEXT NOT NULL,
        completed_at TEXT,
        duration_seconds INTEGER,
        details TEXT,
        error_message TEXT
    )"#,
    r#"CREATE TABLE app_config (
        key TEXT PRIMARY KEY,
        google_client_id TEXT,
        google_client_id_ios TEXT,
        google_client_id_android TEXT,
        google_reversed_client_id TEXT,
        google_drive_enabled INTEGER NOT NULL,
        server_backup_enabled INTEGER NOT NULL,
        local_backup_enabled INTEGER NOT NULL,
        minimum_app_version TEXT,
        latest_app_version TEXT,
        maintenance_mode INTEGER NOT NULL
    )"#,
];

pub async fn setup_db() -> Arc<Database> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite pool");

    for stmt in SCHEMA_STATEMENTS {
        sqlx::query(stmt).execute(&pool).await.expect("schema creation");
    }

    Arc::new(Database::SQLite(pool))
}

/// Generate and persist a 2048-bit signing key pair, returning it.
pub async fn seed_key_pair(db: &Database) -> LicenseResult<KeyPair> {
    let kp = KeyPair::generate("test", 2048)?;
    let row = KeyPairRow {
        id: kp.id.clone(),
        name: kp.name.clone(),
        private_key_pem: kp.private_key_pem.clone(),
        public_key_pem: kp.public_key_pem.clone(),
        is_active: kp.is_active,
        created_at: kp.created_at,
    };
    db.insert_key_pair(&row).await?;
    Ok(kp)
}

/// Build a License row signed with `code`, ready to persist and activate against.
pub fn sample_license(kp: &KeyPair, code: String) -> License {
    let now = Utc::now().naive_utc();
    License {
        id: uuid::Uuid::new_v4().to_string(),
        key_pair_id: kp.id.clone(),
        customer_name: "Acme Retail".to_string(),
        customer_email: "owner@acme.test".to_string(),
        customer_company: None,
        customer_phone: None,
        license_type: "professional".to_string(),
        status: "active".to_string(),
        max_activations: 2,
        current_activations: 0,
        valid_from: now - Duration::days(1),
        valid_until: now + Duration::days(365),
        billing_cycle: "yearly".to_string(),
        renewal_count: 0,
        last_renewed_at: None,
        notes: None,
        license_code: code,
        client_id: None,
        grace_period_ends_at: None,
        revoked_at: None,
        revoke_reason: None,
    }
}

pub fn test_config() -> retailease::config::RetaileaseConfig {
    let mut config = retailease::config::RetaileaseConfig::default();
    config.license.admin_key = "test-admin-key".to_string();
    config
}

pub fn build_state(db: Arc<Database>, storage_root: impl Into<std::path::PathBuf>) -> AppState {
    let config = test_config();
    AppState {
        db: db.clone(),
        activation: ActivationManager::new(db.clone(), config.license.grace_period_days),
        tenant: TenantStore::new(db.clone()),
        backups: BackupIngestor::new(db.clone(), storage_root),
        sync_log: SyncSessionLog::new(db),
        config: Arc::new(config),
    }
}
