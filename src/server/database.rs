//! Storage layer: entity structs plus a `Database` enum dispatching every
//! query to either a SQLite or a Postgres pool.
//!
//! Every public method exists in both a `Database::SQLite` and a
//! `Database::Postgres` arm. The SQL is duplicated rather than shared because
//! the two backends disagree on placeholder syntax (`?` vs `$N`) and a couple
//! of upsert clauses (`ON CONFLICT ... DO UPDATE` needs `excluded.` vs
//! `EXCLUDED.`) — this mirrors how the rest of the service talks to Postgres
//! and SQLite side by side.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, FromRow};
use std::sync::Arc;
use tracing::error;

#[cfg(feature = "sqlite")]
use sqlx::SqlitePool;

#[cfg(feature = "postgres")]
use sqlx::PgPool;

use crate::config::get_config;
use crate::errors::{LicenseError, LicenseResult};

// ===========================================================================
// Entities
// ===========================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct KeyPairRow {
    pub id: String,
    pub name: String,
    pub private_key_pem: String,
    pub public_key_pem: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub key_pair_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_company: Option<String>,
    pub customer_phone: Option<String>,
    pub license_type: String,
    pub status: String,
    pub max_activations: i64,
    pub current_activations: i64,
    pub valid_from: NaiveDateTime,
    pub valid_until: NaiveDateTime,
    pub billing_cycle: String,
    pub renewal_count: i64,
    pub last_renewed_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub license_code: String,
    pub client_id: Option<String>,
    pub grace_period_ends_at: Option<NaiveDateTime>,
    pub revoked_at: Option<NaiveDateTime>,
    pub revoke_reason: Option<String>,
}

impl License {
    pub fn is_valid(&self, now: NaiveDateTime) -> bool {
        self.status == "active" && self.valid_from <= now && now <= self.valid_until
    }

    /// `status=active ∧ valid_until < now ≤ valid_until + graceDays` (base rule), or
    /// `status=suspended` within its `grace_period_ends_at` (sweep-driven rule).
    /// These are separate windows over separate statuses, not one check.
    pub fn in_grace_period(&self, now: NaiveDateTime, grace_days: i64) -> bool {
        match self.status.as_str() {
            "active" => now > self.valid_until && now <= self.valid_until + chrono::Duration::days(grace_days),
            "suspended" => match self.grace_period_ends_at {
                Some(ends) => now <= ends,
                None => now <= self.valid_until + chrono::Duration::days(grace_days),
            },
            _ => false,
        }
    }

    pub fn days_remaining(&self, now: NaiveDateTime) -> i64 {
        if !self.is_valid(now) {
            return 0;
        }
        (self.valid_until - now).num_days().max(0)
    }

    /// Append a timestamped line to the audit-trail `notes` field.
    pub fn append_note(&mut self, line: &str) {
        let stamped = format!("[{}] {}", Utc::now().naive_utc(), line);
        match &mut self.notes {
            Some(notes) => {
                notes.push('\n');
                notes.push_str(&stamped);
            }
            None => self.notes = Some(stamped),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Activation {
    pub id: String,
    pub license_id: String,
    pub machine_id: String,
    pub machine_name: Option<String>,
    pub activated_at: NaiveDateTime,
    pub last_check: NaiveDateTime,
    pub is_active: bool,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Business {
    pub id: String,
    pub license_id: String,
    pub name: String,
    pub legal_name: Option<String>,
    pub business_type: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub gst_number: Option<String>,
    pub pan_number: Option<String>,
    pub currency_code: Option<String>,
    pub currency_symbol: Option<String>,
    pub date_format: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub last_synced_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Counter {
    pub id: String,
    pub business_id: String,
    pub activation_id: String,
    pub name: String,
    pub description: Option<String>,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    pub os_info: Option<String>,
    pub app_version: Option<String>,
    pub status: String,
    pub is_primary: bool,
    pub sync_enabled: bool,
    pub last_sync_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: String,
    pub token: String,
    pub license_id: String,
    pub counter_id: Option<String>,
    pub name: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub last_used_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
}

impl ApiToken {
    pub fn is_valid(&self, now: NaiveDateTime) -> bool {
        self.is_active && self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Backup {
    pub id: String,
    pub business_id: String,
    pub counter_id: Option<String>,
    pub storage_path: String,
    pub filename: String,
    pub file_size: i64,
    pub checksum: String,
    pub is_encrypted: bool,
    pub encryption_version: Option<String>,
    pub backup_type: String,
    pub status: String,
    pub app_version: Option<String>,
    pub db_version: Option<i64>,
    pub record_counts: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub uploaded_at: Option<NaiveDateTime>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SyncLog {
    pub id: String,
    pub business_id: String,
    pub counter_id: String,
    pub sync_type: String,
    pub sync_direction: String,
    pub status: String,
    pub records_uploaded: i64,
    pub records_downloaded: i64,
    pub conflicts_detected: i64,
    pub conflicts_resolved: i64,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub duration_seconds: Option<i64>,
    pub details: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AppConfig {
    pub key: String,
    pub google_client_id: Option<String>,
    pub google_client_id_ios: Option<String>,
    pub google_client_id_android: Option<String>,
    pub google_reversed_client_id: Option<String>,
    pub google_drive_enabled: bool,
    pub server_backup_enabled: bool,
    pub local_backup_enabled: bool,
    pub minimum_app_version: Option<String>,
    pub latest_app_version: Option<String>,
    pub maintenance_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            key: "default".to_string(),
            google_client_id: None,
            google_client_id_ios: None,
            google_client_id_android: None,
            google_reversed_client_id: None,
            google_drive_enabled: false,
            server_backup_enabled: true,
            local_backup_enabled: true,
            minimum_app_version: None,
            latest_app_version: None,
            maintenance_mode: false,
        }
    }
}

// ===========================================================================
// Database
// ===========================================================================

#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

fn db_err(backend: &str, op: &str, e: impl std::fmt::Display) -> LicenseError {
    error!("{backend} {op} failed: {e}");
    LicenseError::StorageError(format!("database error: {e}"))
}

impl Database {
    pub async fn new() -> LicenseResult<Arc<Self>> {
        let config = get_config()?;
        let db_config = &config.database;

        match db_config.db_type.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                let pool = SqlitePool::connect(&db_config.sqlite_url)
                    .await
                    .map_err(|e| db_err("sqlite", "connect", e))?;
                Ok(Arc::new(Database::SQLite(pool)))
            }
            #[cfg(not(feature = "sqlite"))]
            "sqlite" => Err(LicenseError::ConfigError(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            "postgres" => {
                let pool = PgPool::connect(&db_config.postgres_url)
                    .await
                    .map_err(|e| db_err("postgres", "connect", e))?;
                Ok(Arc::new(Database::Postgres(pool)))
            }
            #[cfg(not(feature = "postgres"))]
            "postgres" => Err(LicenseError::ConfigError(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            other => Err(LicenseError::ConfigError(format!(
                "unsupported database type: {other}"
            ))),
        }
    }

    // --- KeyPair ---------------------------------------------------------

    pub async fn insert_key_pair(&self, kp: &KeyPairRow) -> LicenseResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query("INSERT INTO key_pairs (id, name, private_key_pem, public_key_pem, is_active, created_at) VALUES (?, ?, ?, ?, ?, ?)")
                    .bind(&kp.id).bind(&kp.name).bind(&kp.private_key_pem).bind(&kp.public_key_pem).bind(kp.is_active).bind(kp.created_at)
                    .execute(pool).await.map_err(|e| db_err("sqlite", "insert_key_pair", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query("INSERT INTO key_pairs (id, name, private_key_pem, public_key_pem, is_active, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
                    .bind(&kp.id).bind(&kp.name).bind(&kp.private_key_pem).bind(&kp.public_key_pem).bind(kp.is_active).bind(kp.created_at)
                    .execute(pool).await.map_err(|e| db_err("postgres", "insert_key_pair", e))?;
            }
        }
        Ok(())
    }

    pub async fn get_active_key_pair(&self) -> LicenseResult<Option<KeyPairRow>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, KeyPairRow>(
                "SELECT * FROM key_pairs WHERE is_active = 1 ORDER BY created_at DESC LIMIT 1",
            )
            .fetch_optional(pool)
            .await
            .map_err(|e| db_err("sqlite", "get_active_key_pair", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, KeyPairRow>(
                "SELECT * FROM key_pairs WHERE is_active = true ORDER BY created_at DESC LIMIT 1",
            )
            .fetch_optional(pool)
            .await
            .map_err(|e| db_err("postgres", "get_active_key_pair", e)),
        }
    }

    // --- License ----------------------------------------------------------

    /// Upsert keyed on `id`.
    #[allow(clippy::too_many_lines)]
    pub async fn insert_license(&self, l: &License) -> LicenseResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    r#"
                    INSERT INTO licenses (
                        id, key_pair_id, customer_name, customer_email, customer_company, customer_phone,
                        license_type, status, max_activations, current_activations, valid_from, valid_until,
                        billing_cycle, renewal_count, last_renewed_at, notes, license_code, client_id,
                        grace_period_ends_at, revoked_at, revoke_reason
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        key_pair_id = excluded.key_pair_id,
                        customer_name = excluded.customer_name,
                        customer_email = excluded.customer_email,
                        customer_company = excluded.customer_company,
                        customer_phone = excluded.customer_phone,
                        license_type = excluded.license_type,
                        status = excluded.status,
                        max_activations = excluded.max_activations,
                        current_activations = excluded.current_activations,
                        valid_from = excluded.valid_from,
                        valid_until = excluded.valid_until,
                        billing_cycle = excluded.billing_cycle,
                        renewal_count = excluded.renewal_count,
                        last_renewed_at = excluded.last_renewed_at,
                        notes = excluded.notes,
                        license_code = excluded.license_code,
                        client_id = excluded.client_id,
                        grace_period_ends_at = excluded.grace_period_ends_at,
                        revoked_at = excluded.revoked_at,
                        revoke_reason = excluded.revoke_reason
                    "#,
                )
                .bind(&l.id).bind(&l.key_pair_id).bind(&l.customer_name).bind(&l.customer_email)
                .bind(&l.customer_company).bind(&l.customer_phone).bind(&l.license_type).bind(&l.status)
                .bind(l.max_activations).bind(l.current_activations).bind(l.valid_from).bind(l.valid_until)
                .bind(&l.billing_cycle).bind(l.renewal_count).bind(l.last_renewed_at).bind(&l.notes)
                .bind(&l.license_code).bind(&l.client_id).bind(l.grace_period_ends_at).bind(l.revoked_at)
                .bind(&l.revoke_reason)
                .execute(pool).await.map_err(|e| db_err("sqlite", "insert_license", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    r#"
                    INSERT INTO licenses (
                        id, key_pair_id, customer_name, customer_email, customer_company, customer_phone,
                        license_type, status, max_activations, current_activations, valid_from, valid_until,
                        billing_cycle, renewal_count, last_renewed_at, notes, license_code, client_id,
                        grace_period_ends_at, revoked_at, revoke_reason
                    ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21)
                    ON CONFLICT (id) DO UPDATE SET
                        key_pair_id = EXCLUDED.key_pair_id,
                        customer_name = EXCLUDED.customer_name,
                        customer_email = EXCLUDED.customer_email,
                        customer_company = EXCLUDED.customer_company,
                        customer_phone = EXCLUDED.customer_phone,
                        license_type = EXCLUDED.license_type,
                        status = EXCLUDED.status,
                        max_activations = EXCLUDED.max_activations,
                        current_activations = EXCLUDED.current_activations,
                        valid_from = EXCLUDED.valid_from,
                        valid_until = EXCLUDED.valid_until,
                        billing_cycle = EXCLUDED.billing_cycle,
                        renewal_count = EXCLUDED.renewal_count,
                        last_renewed_at = EXCLUDED.last_renewed_at,
                        notes = EXCLUDED.notes,
                        license_code = EXCLUDED.license_code,
                        client_id = EXCLUDED.client_id,
                        grace_period_ends_at = EXCLUDED.grace_period_ends_at,
                        revoked_at = EXCLUDED.revoked_at,
                        revoke_reason = EXCLUDED.revoke_reason
                    "#,
                )
                .bind(&l.id).bind(&l.key_pair_id).bind(&l.customer_name).bind(&l.customer_email)
                .bind(&l.customer_company).bind(&l.customer_phone).bind(&l.license_type).bind(&l.status)
                .bind(l.max_activations).bind(l.current_activations).bind(l.valid_from).bind(l.valid_until)
                .bind(&l.billing_cycle).bind(l.renewal_count).bind(l.last_renewed_at).bind(&l.notes)
                .bind(&l.license_code).bind(&l.client_id).bind(l.grace_period_ends_at).bind(l.revoked_at)
                .bind(&l.revoke_reason)
                .execute(pool).await.map_err(|e| db_err("postgres", "insert_license", e))?;
            }
        }
        Ok(())
    }

    pub async fn get_license(&self, id: &str) -> LicenseResult<Option<License>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, License>("SELECT * FROM licenses WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(|e| db_err("sqlite", "get_license", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, License>("SELECT * FROM licenses WHERE id = $1")
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_err("postgres", "get_license", e))
            }
        }
    }

    pub async fn get_license_by_email(&self, email: &str) -> LicenseResult<Vec<License>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, License>("SELECT * FROM licenses WHERE customer_email = ?")
                    .bind(email)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| db_err("sqlite", "get_license_by_email", e))
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, License>("SELECT * FROM licenses WHERE customer_email = $1")
                    .bind(email)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| db_err("postgres", "get_license_by_email", e))
            }
        }
    }

    pub async fn get_expired_grace_period_licenses(
        &self,
        now: NaiveDateTime,
    ) -> LicenseResult<Vec<License>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, License>(
                "SELECT * FROM licenses WHERE status = 'suspended' AND grace_period_ends_at IS NOT NULL AND grace_period_ends_at < ?",
            )
            .bind(now)
            .fetch_all(pool)
            .await
            .map_err(|e| db_err("sqlite", "get_expired_grace_period_licenses", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, License>(
                "SELECT * FROM licenses WHERE status = 'suspended' AND grace_period_ends_at IS NOT NULL AND grace_period_ends_at < $1",
            )
            .bind(now)
            .fetch_all(pool)
            .await
            .map_err(|e| db_err("postgres", "get_expired_grace_period_licenses", e)),
        }
    }

    pub async fn get_expired_licenses(&self, now: NaiveDateTime) -> LicenseResult<Vec<License>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, License>(
                "SELECT * FROM licenses WHERE status = 'active' AND valid_until < ?",
            )
            .bind(now)
            .fetch_all(pool)
            .await
            .map_err(|e| db_err("sqlite", "get_expired_licenses", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, License>(
                "SELECT * FROM licenses WHERE status = 'active' AND valid_until < $1",
            )
            .bind(now)
            .fetch_all(pool)
            .await
            .map_err(|e| db_err("postgres", "get_expired_licenses", e)),
        }
    }

    // --- Activation ---------------------------------------------------------

    pub async fn get_activation(
        &self,
        license_id: &str,
        machine_id: &str,
    ) -> LicenseResult<Option<Activation>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, Activation>(
                "SELECT * FROM activations WHERE license_id = ? AND machine_id = ?",
            )
            .bind(license_id)
            .bind(machine_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_err("sqlite", "get_activation", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, Activation>(
                "SELECT * FROM activations WHERE license_id = $1 AND machine_id = $2",
            )
            .bind(license_id)
            .bind(machine_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_err("postgres", "get_activation", e)),
        }
    }

    pub async fn insert_activation(&self, a: &Activation) -> LicenseResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    "INSERT INTO activations (id, license_id, machine_id, machine_name, activated_at, last_check, is_active, ip_address)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT(license_id, machine_id) DO UPDATE SET
                        machine_name = excluded.machine_name,
                        last_check = excluded.last_check,
                        is_active = excluded.is_active,
                        ip_address = excluded.ip_address",
                )
                .bind(&a.id).bind(&a.license_id).bind(&a.machine_id).bind(&a.machine_name)
                .bind(a.activated_at).bind(a.last_check).bind(a.is_active).bind(&a.ip_address)
                .execute(pool).await.map_err(|e| db_err("sqlite", "insert_activation", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    "INSERT INTO activations (id, license_id, machine_id, machine_name, activated_at, last_check, is_active, ip_address)
                     VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
                     ON CONFLICT (license_id, machine_id) DO UPDATE SET
                        machine_name = EXCLUDED.machine_name,
                        last_check = EXCLUDED.last_check,
                        is_active = EXCLUDED.is_active,
                        ip_address = EXCLUDED.ip_address",
                )
                .bind(&a.id).bind(&a.license_id).bind(&a.machine_id).bind(&a.machine_name)
                .bind(a.activated_at).bind(a.last_check).bind(a.is_active).bind(&a.ip_address)
                .execute(pool).await.map_err(|e| db_err("postgres", "insert_activation", e))?;
            }
        }
        Ok(())
    }

    pub async fn count_active_activations(&self, license_id: &str) -> LicenseResult<i64> {
        let count: (i64,) = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as(
                "SELECT COUNT(*) FROM activations WHERE license_id = ? AND is_active = 1",
            )
            .bind(license_id)
            .fetch_one(pool)
            .await
            .map_err(|e| db_err("sqlite", "count_active_activations", e))?,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as(
                "SELECT COUNT(*) FROM activations WHERE license_id = $1 AND is_active = true",
            )
            .bind(license_id)
            .fetch_one(pool)
            .await
            .map_err(|e| db_err("postgres", "count_active_activations", e))?,
        };
        Ok(count.0)
    }

    // --- Business -----------------------------------------------------------

    pub async fn get_business_by_license(&self, license_id: &str) -> LicenseResult<Option<Business>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, Business>("SELECT * FROM businesses WHERE license_id = ?")
                    .bind(license_id)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_err("sqlite", "get_business_by_license", e))
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, Business>("SELECT * FROM businesses WHERE license_id = $1")
                    .bind(license_id)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_err("postgres", "get_business_by_license", e))
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    pub async fn upsert_business(&self, b: &Business) -> LicenseResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    r#"INSERT INTO businesses (
                        id, license_id, name, legal_name, business_type, email, phone, website,
                        address_line1, address_line2, city, state, country, postal_code,
                        gst_number, pan_number, currency_code, currency_symbol, date_format,
                        created_at, updated_at, last_synced_at
                    ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)
                    ON CONFLICT(id) DO UPDATE SET
                        name=excluded.name, legal_name=excluded.legal_name, business_type=excluded.business_type,
                        email=excluded.email, phone=excluded.phone, website=excluded.website,
                        address_line1=excluded.address_line1, address_line2=excluded.address_line2,
                        city=excluded.city, state=excluded.state, country=excluded.country,
                        postal_code=excluded.postal_code, gst_number=excluded.gst_number,
                        pan_number=excluded.pan_number, currency_code=excluded.currency_code,
                        currency_symbol=excluded.currency_symbol, date_format=excluded.date_format,
                        updated_at=excluded.updated_at, last_synced_at=excluded.last_synced_at"#,
                )
                .bind(&b.id).bind(&b.license_id).bind(&b.name).bind(&b.legal_name).bind(&b.business_type)
                .bind(&b.email).bind(&b.phone).bind(&b.website).bind(&b.address_line1).bind(&b.address_line2)
                .bind(&b.city).bind(&b.state).bind(&b.country).bind(&b.postal_code).bind(&b.gst_number)
                .bind(&b.pan_number).bind(&b.currency_code).bind(&b.currency_symbol).bind(&b.date_format)
                .bind(b.created_at).bind(b.updated_at).bind(b.last_synced_at)
                .execute(pool).await.map_err(|e| db_err("sqlite", "upsert_business", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    r#"INSERT INTO businesses (
                        id, license_id, name, legal_name, business_type, email, phone, website,
                        address_line1, address_line2, city, state, country, postal_code,
                        gst_number, pan_number, currency_code, currency_symbol, date_format,
                        created_at, updated_at, last_synced_at
                    ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22)
                    ON CONFLICT (id) DO UPDATE SET
                        name=EXCLUDED.name, legal_name=EXCLUDED.legal_name, business_type=EXCLUDED.business_type,
                        email=EXCLUDED.email, phone=EXCLUDED.phone, website=EXCLUDED.website,
                        address_line1=EXCLUDED.address_line1, address_line2=EXCLUDED.address_line2,
                        city=EXCLUDED.city, state=EXCLUDED.state, country=EXCLUDED.country,
                        postal_code=EXCLUDED.postal_code, gst_number=EXCLUDED.gst_number,
                        pan_number=EXCLUDED.pan_number, currency_code=EXCLUDED.currency_code,
                        currency_symbol=EXCLUDED.currency_symbol, date_format=EXCLUDED.date_format,
                        updated_at=EXCLUDED.updated_at, last_synced_at=EXCLUDED.last_synced_at"#,
                )
                .bind(&b.id).bind(&b.license_id).bind(&b.name).bind(&b.legal_name).bind(&b.business_type)
                .bind(&b.email).bind(&b.phone).bind(&b.website).bind(&b.address_line1).bind(&b.address_line2)
                .bind(&b.city).bind(&b.state).bind(&b.country).bind(&b.postal_code).bind(&b.gst_number)
                .bind(&b.pan_number).bind(&b.currency_code).bind(&b.currency_symbol).bind(&b.date_format)
                .bind(b.created_at).bind(b.updated_at).bind(b.last_synced_at)
                .execute(pool).await.map_err(|e| db_err("postgres", "upsert_business", e))?;
            }
        }
        Ok(())
    }

    // --- Counter --------------------------------------------------------

    pub async fn get_counter(&self, id: &str) -> LicenseResult<Option<Counter>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, Counter>("SELECT * FROM counters WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(|e| db_err("sqlite", "get_counter", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, Counter>("SELECT * FROM counters WHERE id = $1")
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_err("postgres", "get_counter", e))
            }
        }
    }

    pub async fn get_counter_by_activation(
        &self,
        activation_id: &str,
    ) -> LicenseResult<Option<Counter>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, Counter>("SELECT * FROM counters WHERE activation_id = ?")
                    .bind(activation_id)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_err("sqlite", "get_counter_by_activation", e))
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, Counter>("SELECT * FROM counters WHERE activation_id = $1")
                    .bind(activation_id)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_err("postgres", "get_counter_by_activation", e))
            }
        }
    }

    pub async fn list_counters_by_business(&self, business_id: &str) -> LicenseResult<Vec<Counter>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, Counter>("SELECT * FROM counters WHERE business_id = ? ORDER BY id")
                    .bind(business_id)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| db_err("sqlite", "list_counters_by_business", e))
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, Counter>("SELECT * FROM counters WHERE business_id = $1 ORDER BY id")
                    .bind(business_id)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| db_err("postgres", "list_counters_by_business", e))
            }
        }
    }

    pub async fn count_counters_by_business(&self, business_id: &str) -> LicenseResult<i64> {
        let count: (i64,) = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as("SELECT COUNT(*) FROM counters WHERE business_id = ?")
                    .bind(business_id)
                    .fetch_one(pool)
                    .await
                    .map_err(|e| db_err("sqlite", "count_counters_by_business", e))?
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as("SELECT COUNT(*) FROM counters WHERE business_id = $1")
                    .bind(business_id)
                    .fetch_one(pool)
                    .await
                    .map_err(|e| db_err("postgres", "count_counters_by_business", e))?
            }
        };
        Ok(count.0)
    }

    #[allow(clippy::too_many_lines)]
    pub async fn upsert_counter(&self, c: &Counter) -> LicenseResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    r#"INSERT INTO counters (
                        id, business_id, activation_id, name, description, device_name, device_type,
                        os_info, app_version, status, is_primary, sync_enabled, last_sync_at
                    ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?)
                    ON CONFLICT(id) DO UPDATE SET
                        name=excluded.name, description=excluded.description, device_name=excluded.device_name,
                        device_type=excluded.device_type, os_info=excluded.os_info, app_version=excluded.app_version,
                        status=excluded.status, is_primary=excluded.is_primary, sync_enabled=excluded.sync_enabled,
                        last_sync_at=excluded.last_sync_at"#,
                )
                .bind(&c.id).bind(&c.business_id).bind(&c.activation_id).bind(&c.name).bind(&c.description)
                .bind(&c.device_name).bind(&c.device_type).bind(&c.os_info).bind(&c.app_version)
                .bind(&c.status).bind(c.is_primary).bind(c.sync_enabled).bind(c.last_sync_at)
                .execute(pool).await.map_err(|e| db_err("sqlite", "upsert_counter", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    r#"INSERT INTO counters (
                        id, business_id, activation_id, name, description, device_name, device_type,
                        os_info, app_version, status, is_primary, sync_enabled, last_sync_at
                    ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
                    ON CONFLICT (id) DO UPDATE SET
                        name=EXCLUDED.name, description=EXCLUDED.description, device_name=EXCLUDED.device_name,
                        device_type=EXCLUDED.device_type, os_info=EXCLUDED.os_info, app_version=EXCLUDED.app_version,
                        status=EXCLUDED.status, is_primary=EXCLUDED.is_primary, sync_enabled=EXCLUDED.sync_enabled,
                        last_sync_at=EXCLUDED.last_sync_at"#,
                )
                .bind(&c.id).bind(&c.business_id).bind(&c.activation_id).bind(&c.name).bind(&c.description)
                .bind(&c.device_name).bind(&c.device_type).bind(&c.os_info).bind(&c.app_version)
                .bind(&c.status).bind(c.is_primary).bind(c.sync_enabled).bind(c.last_sync_at)
                .execute(pool).await.map_err(|e| db_err("postgres", "upsert_counter", e))?;
            }
        }
        Ok(())
    }

    // --- APIToken ---------------------------------------------------------

    pub async fn get_token(&self, token: &str) -> LicenseResult<Option<ApiToken>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, ApiToken>("SELECT * FROM api_tokens WHERE token = ?")
                .bind(token)
                .fetch_optional(pool)
                .await
                .map_err(|e| db_err("sqlite", "get_token", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, ApiToken>("SELECT * FROM api_tokens WHERE token = $1")
                    .bind(token)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_err("postgres", "get_token", e))
            }
        }
    }

    pub async fn get_token_by_license_counter(
        &self,
        license_id: &str,
        counter_id: Option<&str>,
    ) -> LicenseResult<Option<ApiToken>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, ApiToken>(
                "SELECT * FROM api_tokens WHERE license_id = ? AND counter_id IS ?",
            )
            .bind(license_id)
            .bind(counter_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_err("sqlite", "get_token_by_license_counter", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, ApiToken>(
                "SELECT * FROM api_tokens WHERE license_id = $1 AND counter_id IS NOT DISTINCT FROM $2",
            )
            .bind(license_id)
            .bind(counter_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| db_err("postgres", "get_token_by_license_counter", e)),
        }
    }

    pub async fn upsert_token(&self, t: &ApiToken) -> LicenseResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    "INSERT INTO api_tokens (id, token, license_id, counter_id, name, is_active, created_at, last_used_at, expires_at)
                     VALUES (?,?,?,?,?,?,?,?,?)
                     ON CONFLICT(id) DO UPDATE SET
                        token=excluded.token, is_active=excluded.is_active, last_used_at=excluded.last_used_at, expires_at=excluded.expires_at",
                )
                .bind(&t.id).bind(&t.token).bind(&t.license_id).bind(&t.counter_id).bind(&t.name)
                .bind(t.is_active).bind(t.created_at).bind(t.last_used_at).bind(t.expires_at)
                .execute(pool).await.map_err(|e| db_err("sqlite", "upsert_token", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    "INSERT INTO api_tokens (id, token, license_id, counter_id, name, is_active, created_at, last_used_at, expires_at)
                     VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
                     ON CONFLICT (id) DO UPDATE SET
                        token=EXCLUDED.token, is_active=EXCLUDED.is_active, last_used_at=EXCLUDED.last_used_at, expires_at=EXCLUDED.expires_at",
                )
                .bind(&t.id).bind(&t.token).bind(&t.license_id).bind(&t.counter_id).bind(&t.name)
                .bind(t.is_active).bind(t.created_at).bind(t.last_used_at).bind(t.expires_at)
                .execute(pool).await.map_err(|e| db_err("postgres", "upsert_token", e))?;
            }
        }
        Ok(())
    }

    pub async fn touch_token_last_used(&self, token: &str) -> LicenseResult<()> {
        let now = Utc::now().naive_utc();
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query("UPDATE api_tokens SET last_used_at = ? WHERE token = ?")
                    .bind(now).bind(token)
                    .execute(pool).await.map_err(|e| db_err("sqlite", "touch_token_last_used", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query("UPDATE api_tokens SET last_used_at = $1 WHERE token = $2")
                    .bind(now).bind(token)
                    .execute(pool).await.map_err(|e| db_err("postgres", "touch_token_last_used", e))?;
            }
        }
        Ok(())
    }

    // --- Backup -----------------------------------------------------------

    #[allow(clippy::too_many_lines)]
    pub async fn insert_backup(&self, b: &Backup) -> LicenseResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    r#"INSERT INTO backups (
                        id, business_id, counter_id, storage_path, filename, file_size, checksum,
                        is_encrypted, encryption_version, backup_type, status, app_version, db_version,
                        record_counts, notes, created_at, uploaded_at, error_message
                    ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)"#,
                )
                .bind(&b.id).bind(&b.business_id).bind(&b.counter_id).bind(&b.storage_path)
                .bind(&b.filename).bind(b.file_size).bind(&b.checksum).bind(b.is_encrypted)
                .bind(&b.encryption_version).bind(&b.backup_type).bind(&b.status).bind(&b.app_version)
                .bind(b.db_version).bind(&b.record_counts).bind(&b.notes).bind(b.created_at)
                .bind(b.uploaded_at).bind(&b.error_message)
                .execute(pool).await.map_err(|e| db_err("sqlite", "insert_backup", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    r#"INSERT INTO backups (
                        id, business_id, counter_id, storage_path, filename, file_size, checksum,
                        is_encrypted, encryption_version, backup_type, status, app_version, db_version,
                        record_counts, notes, created_at, uploaded_at, error_message
                    ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)"#,
                )
                .bind(&b.id).bind(&b.business_id).bind(&b.counter_id).bind(&b.storage_path)
                .bind(&b.filename).bind(b.file_size).bind(&b.checksum).bind(b.is_encrypted)
                .bind(&b.encryption_version).bind(&b.backup_type).bind(&b.status).bind(&b.app_version)
                .bind(b.db_version).bind(&b.record_counts).bind(&b.notes).bind(b.created_at)
                .bind(b.uploaded_at).bind(&b.error_message)
                .execute(pool).await.map_err(|e| db_err("postgres", "insert_backup", e))?;
            }
        }
        Ok(())
    }

    pub async fn get_backup(&self, id: &str) -> LicenseResult<Option<Backup>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, Backup>("SELECT * FROM backups WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(|e| db_err("sqlite", "get_backup", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, Backup>("SELECT * FROM backups WHERE id = $1")
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_err("postgres", "get_backup", e))
            }
        }
    }

    pub async fn list_backups_by_business(
        &self,
        business_id: &str,
        backup_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> LicenseResult<Vec<Backup>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => match backup_type {
                Some(t) => query_as::<_, Backup>(
                    "SELECT * FROM backups WHERE business_id = ? AND backup_type = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(business_id).bind(t).bind(limit).bind(offset)
                .fetch_all(pool).await.map_err(|e| db_err("sqlite", "list_backups_by_business", e)),
                None => query_as::<_, Backup>(
                    "SELECT * FROM backups WHERE business_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(business_id).bind(limit).bind(offset)
                .fetch_all(pool).await.map_err(|e| db_err("sqlite", "list_backups_by_business", e)),
            },
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => match backup_type {
                Some(t) => query_as::<_, Backup>(
                    "SELECT * FROM backups WHERE business_id = $1 AND backup_type = $2 ORDER BY created_at DESC LIMIT $3 OFFSET $4",
                )
                .bind(business_id).bind(t).bind(limit).bind(offset)
                .fetch_all(pool).await.map_err(|e| db_err("postgres", "list_backups_by_business", e)),
                None => query_as::<_, Backup>(
                    "SELECT * FROM backups WHERE business_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
                )
                .bind(business_id).bind(limit).bind(offset)
                .fetch_all(pool).await.map_err(|e| db_err("postgres", "list_backups_by_business", e)),
            },
        }
    }

    /// All backup ids for a business/type, newest first — used by retention pruning.
    pub async fn list_backup_ids_newest_first(
        &self,
        business_id: &str,
        backup_type: Option<&str>,
    ) -> LicenseResult<Vec<String>> {
        let backups = self.list_backups_by_business(business_id, backup_type, i64::MAX, 0).await?;
        Ok(backups.into_iter().map(|b| b.id).collect())
    }

    pub async fn delete_backup(&self, id: &str) -> LicenseResult<bool> {
        let rows = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query("DELETE FROM backups WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| db_err("sqlite", "delete_backup", e))?
                .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query("DELETE FROM backups WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| db_err("postgres", "delete_backup", e))?
                .rows_affected(),
        };
        Ok(rows > 0)
    }

    // --- SyncLog ------------------------------------------------------------

    #[allow(clippy::too_many_lines)]
    pub async fn insert_sync_log(&self, s: &SyncLog) -> LicenseResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    r#"INSERT INTO sync_logs (
                        id, business_id, counter_id, sync_type, sync_direction, status,
                        records_uploaded, records_downloaded, conflicts_detected, conflicts_resolved,
                        started_at, completed_at, duration_seconds, details, error_message
                    ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)
                    ON CONFLICT(id) DO UPDATE SET
                        status=excluded.status, records_uploaded=excluded.records_uploaded,
                        records_downloaded=excluded.records_downloaded, conflicts_detected=excluded.conflicts_detected,
                        conflicts_resolved=excluded.conflicts_resolved, completed_at=excluded.completed_at,
                        duration_seconds=excluded.duration_seconds, details=excluded.details,
                        error_message=excluded.error_message"#,
                )
                .bind(&s.id).bind(&s.business_id).bind(&s.counter_id).bind(&s.sync_type).bind(&s.sync_direction)
                .bind(&s.status).bind(s.records_uploaded).bind(s.records_downloaded).bind(s.conflicts_detected)
                .bind(s.conflicts_resolved).bind(s.started_at).bind(s.completed_at).bind(s.duration_seconds)
                .bind(&s.details).bind(&s.error_message)
                .execute(pool).await.map_err(|e| db_err("sqlite", "insert_sync_log", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    r#"INSERT INTO sync_logs (
                        id, business_id, counter_id, sync_type, sync_direction, status,
                        records_uploaded, records_downloaded, conflicts_detected, conflicts_resolved,
                        started_at, completed_at, duration_seconds, details, error_message
                    ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
                    ON CONFLICT (id) DO UPDATE SET
                        status=EXCLUDED.status, records_uploaded=EXCLUDED.records_uploaded,
                        records_downloaded=EXCLUDED.records_downloaded, conflicts_detected=EXCLUDED.conflicts_detected,
                        conflicts_resolved=EXCLUDED.conflicts_resolved, completed_at=EXCLUDED.completed_at,
                        duration_seconds=EXCLUDED.duration_seconds, details=EXCLUDED.details,
                        error_message=EXCLUDED.error_message"#,
                )
                .bind(&s.id).bind(&s.business_id).bind(&s.counter_id).bind(&s.sync_type).bind(&s.sync_direction)
                .bind(&s.status).bind(s.records_uploaded).bind(s.records_downloaded).bind(s.conflicts_detected)
                .bind(s.conflicts_resolved).bind(s.started_at).bind(s.completed_at).bind(s.duration_seconds)
                .bind(&s.details).bind(&s.error_message)
                .execute(pool).await.map_err(|e| db_err("postgres", "insert_sync_log", e))?;
            }
        }
        Ok(())
    }

    pub async fn get_sync_log(&self, id: &str) -> LicenseResult<Option<SyncLog>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, SyncLog>("SELECT * FROM sync_logs WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(|e| db_err("sqlite", "get_sync_log", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, SyncLog>("SELECT * FROM sync_logs WHERE id = $1")
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_err("postgres", "get_sync_log", e))
            }
        }
    }

    pub async fn list_sync_logs_by_business(
        &self,
        business_id: &str,
        limit: i64,
    ) -> LicenseResult<Vec<SyncLog>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, SyncLog>(
                "SELECT * FROM sync_logs WHERE business_id = ? ORDER BY started_at DESC LIMIT ?",
            )
            .bind(business_id)
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(|e| db_err("sqlite", "list_sync_logs_by_business", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, SyncLog>(
                "SELECT * FROM sync_logs WHERE business_id = $1 ORDER BY started_at DESC LIMIT $2",
            )
            .bind(business_id)
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(|e| db_err("postgres", "list_sync_logs_by_business", e)),
        }
    }

    // --- AppConfig ------------------------------------------------------------

    pub async fn get_app_config(&self) -> LicenseResult<AppConfig> {
        let row = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, AppConfig>("SELECT * FROM app_config WHERE key = 'default'")
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_err("sqlite", "get_app_config", e))?
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, AppConfig>("SELECT * FROM app_config WHERE key = 'default'")
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_err("postgres", "get_app_config", e))?
            }
        };
        Ok(row.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(now: NaiveDateTime) -> License {
        License {
            id: "lic_1".into(),
            key_pair_id: "kp_1".into(),
            customer_name: "Acme".into(),
            customer_email: "acme@test.dev".into(),
            customer_company: None,
            customer_phone: None,
            license_type: "professional".into(),
            status: "active".into(),
            max_activations: 1,
            current_activations: 0,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(30),
            billing_cycle: "yearly".into(),
            renewal_count: 0,
            last_renewed_at: None,
            notes: None,
            license_code: "REP-AAAAAAAA-x".into(),
            client_id: None,
            grace_period_ends_at: None,
            revoked_at: None,
            revoke_reason: None,
        }
    }

    #[test]
    fn active_license_within_grace_window_after_expiry() {
        let now = Utc::now().naive_utc();
        let mut license = sample(now);
        license.valid_until = now - Duration::days(2);
        assert!(license.in_grace_period(now, 7));
    }

    #[test]
    fn active_license_past_grace_window_is_not_in_grace() {
        let now = Utc::now().naive_utc();
        let mut license = sample(now);
        license.valid_until = now - Duration::days(8);
        assert!(!license.in_grace_period(now, 7));
    }

    #[test]
    fn active_license_not_yet_expired_is_not_in_grace() {
        let now = Utc::now().naive_utc();
        let license = sample(now);
        assert!(!license.in_grace_period(now, 7));
    }

    #[test]
    fn suspended_license_uses_grace_period_ends_at_when_set() {
        let now = Utc::now().naive_utc();
        let mut license = sample(now);
        license.status = "suspended".into();
        license.grace_period_ends_at = Some(now + Duration::days(1));
        assert!(license.in_grace_period(now, 7));

        license.grace_period_ends_at = Some(now - Duration::days(1));
        assert!(!license.in_grace_period(now, 7));
    }

    #[test]
    fn suspended_license_falls_back_to_valid_until_plus_grace_days() {
        let now = Utc::now().naive_utc();
        let mut license = sample(now);
        license.status = "suspended".into();
        license.valid_until = now - Duration::days(3);
        license.grace_period_ends_at = None;
        assert!(license.in_grace_period(now, 7));
    }

    #[test]
    fn revoked_license_is_never_in_grace_period() {
        let now = Utc::now().naive_utc();
        let mut license = sample(now);
        license.status = "revoked".into();
        license.valid_until = now - Duration::days(1);
        assert!(!license.in_grace_period(now, 7));
    }
}
