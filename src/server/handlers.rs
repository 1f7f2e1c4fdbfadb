//! Public and token-gated HTTP handlers for the RetailEase licensing API.
//!
//! Handlers are thin: they parse the request, call into the component that
//! owns the behavior (`ActivationManager`, `TenantStore`, `BackupIngestor`,
//! `SyncSessionLog`, `TokenAuthenticator`), and shape the response. The
//! license-state endpoints (`/license/validate`, `/license/check`,
//! `/license/refresh`) use a domain-specific envelope (`valid`/`status`
//! fields) rather than the generic `ApiError`, since a device needs to tell
//! "license doesn't exist" from "license exists but is suspended" without
//! parsing an HTTP status code.

use axum::extract::{FromRef, Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveDateTime, Utc};
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::config::RetaileaseConfig;
use crate::crypto::key_store::KeyPair;
use crate::errors::{LicenseError, LicenseResult};
use crate::server::activation::ActivationManager;
use crate::server::api_error::ApiError;
use crate::server::backups::{BackupIngestor, UploadRequest};
use crate::server::database::{AppConfig, Backup, Business, Counter, Database, License, SyncLog};
use crate::server::logging::{log_license_binding_event, log_license_event, LicenseEvent};
use crate::server::sync_log::{SyncSessionLog, SyncStats};
use crate::server::tenant::{BusinessFields, CounterFields, TenantStore};
use crate::server::tokens::{AuthenticatedCaller, TokenAuthenticator};

/// Shared application state threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<RetaileaseConfig>,
    pub activation: ActivationManager,
    pub tenant: TenantStore,
    pub backups: BackupIngestor,
    pub sync_log: SyncSessionLog,
}

impl FromRef<AppState> for Arc<Database> {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

async fn active_public_key(db: &Database) -> LicenseResult<RsaPublicKey> {
    let row = db.get_active_key_pair().await?.ok_or(LicenseError::NoActiveKey)?;
    let kp = KeyPair {
        id: row.id,
        name: row.name,
        private_key_pem: row.private_key_pem,
        public_key_pem: row.public_key_pem,
        is_active: row.is_active,
        created_at: row.created_at,
    };
    kp.public_key()
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()).map(str::to_string))
}

// ===========================================================================
// Public views
// ===========================================================================

/// Public-safe license view returned alongside `valid: true`. Never includes
/// `license_code` or any customer contact field beyond `customer_name`.
#[derive(Debug, Serialize)]
pub struct LicenseView {
    pub id: String,
    pub customer_name: String,
    pub license_type: String,
    pub status: String,
    pub valid_until: NaiveDateTime,
    pub max_activations: i64,
    pub current_activations: i64,
    pub days_remaining: i64,
    pub in_grace_period: bool,
}

impl LicenseView {
    fn from(license: &License, now: NaiveDateTime, grace_period_days: i64) -> Self {
        Self {
            id: license.id.clone(),
            customer_name: license.customer_name.clone(),
            license_type: license.license_type.clone(),
            status: license.status.clone(),
            valid_until: license.valid_until,
            max_activations: license.max_activations,
            current_activations: license.current_activations,
            days_remaining: license.days_remaining(now),
            in_grace_period: license.in_grace_period(now, grace_period_days),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BusinessView {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub currency_code: Option<String>,
}

impl From<&Business> for BusinessView {
    fn from(b: &Business) -> Self {
        Self {
            id: b.id.clone(),
            name: b.name.clone(),
            email: b.email.clone(),
            currency_code: b.currency_code.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CounterView {
    pub id: String,
    pub name: String,
    pub is_primary: bool,
    pub sync_enabled: bool,
}

impl From<&Counter> for CounterView {
    fn from(c: &Counter) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            is_primary: c.is_primary,
            sync_enabled: c.sync_enabled,
        }
    }
}

// ===========================================================================
// GET /config, GET /public-key, GET /health
// ===========================================================================

pub async fn config_handler(State(state): State<AppState>) -> Result<Json<AppConfig>, ApiError> {
    Ok(Json(state.db.get_app_config().await?))
}

#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    pub public_key_pem: String,
}

pub async fn public_key_handler(State(state): State<AppState>) -> Result<Json<PublicKeyResponse>, ApiError> {
    let row = state.db.get_active_key_pair().await?.ok_or(LicenseError::NoActiveKey)?;
    Ok(Json(PublicKeyResponse { public_key_pem: row.public_key_pem }))
}

#[derive(Debug, Deserialize)]
pub struct ByEmailQuery {
    pub email: String,
}

pub async fn by_email_handler(
    State(state): State<AppState>,
    Query(q): Query<ByEmailQuery>,
) -> Result<Json<Vec<LicenseView>>, ApiError> {
    let now = Utc::now().naive_utc();
    let licenses = state.db.get_license_by_email(&q.email).await?;
    let views = licenses
        .iter()
        .map(|l| LicenseView::from(l, now, state.config.license.grace_period_days))
        .collect();
    Ok(Json(views))
}

// ===========================================================================
// POST /license/validate
// ===========================================================================

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub license_code: String,
    pub machine_id: String,
    pub machine_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IntoResponse for ValidateResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

pub async fn validate_license_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ValidateRequest>,
) -> ValidateResponse {
    if let Err(e) = crate::server::validation::validate_license_code(&req.license_code, "license_code") {
        return ValidateResponse { valid: false, license: None, error: Some(e.to_string()) };
    }

    let ip = client_ip(&headers);
    let result = async {
        let public_key = active_public_key(&state.db).await?;
        state
            .activation
            .validate_and_activate(&req.license_code, &req.machine_id, req.machine_name.as_deref(), ip.as_deref(), &public_key)
            .await
    }
    .await;

    match result {
        Ok(outcome) => {
            log_license_binding_event(LicenseEvent::Activated, &outcome.license.id, &req.machine_id, req.machine_name.as_deref());
            let now = Utc::now().naive_utc();
            ValidateResponse {
                valid: true,
                license: Some(LicenseView::from(&outcome.license, now, state.config.license.grace_period_days)),
                error: None,
            }
        }
        Err(e) => {
            log_license_event(LicenseEvent::ValidationFailed, &req.machine_id, Some(&e.to_string()));
            ValidateResponse { valid: false, license: None, error: Some(e.to_string()) }
        }
    }
}

// ===========================================================================
// POST /license/check
// ===========================================================================

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub license_id: String,
    pub machine_id: String,
    pub last_known_expiry: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub valid: bool,
    pub status: String,
    pub days_remaining: i64,
    pub valid_until: NaiveDateTime,
    pub renewed: bool,
    pub in_grace_period: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
}

impl IntoResponse for CheckResponse {
    fn into_response(self) -> Response {
        let status = if self.valid { StatusCode::OK } else { StatusCode::BAD_REQUEST };
        (status, Json(self)).into_response()
    }
}

pub async fn check_license_handler(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> Result<CheckResponse, ApiError> {
    let mut license = state.db.get_license(&req.license_id).await?.ok_or(LicenseError::LicenseNotFound)?;

    let now = Utc::now().naive_utc();
    ActivationManager::reconcile_status(&mut license, now, state.config.license.grace_period_days);
    if license.status == "expired" {
        state.db.insert_license(&license).await?;
    }

    let in_grace = license.in_grace_period(now, state.config.license.grace_period_days);
    let valid = license.is_valid(now) || in_grace;
    let renewed = req.last_known_expiry.map(|prev| prev != license.valid_until).unwrap_or(false);

    Ok(CheckResponse {
        valid,
        status: license.status.clone(),
        days_remaining: license.days_remaining(now),
        valid_until: license.valid_until,
        renewed,
        in_grace_period: in_grace,
        expired: if license.status == "expired" { Some(true) } else { None },
    })
}

// ===========================================================================
// POST /license/refresh
// ===========================================================================

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub license_id: String,
    pub machine_id: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub valid: bool,
    pub status: String,
    pub days_remaining: i64,
    pub in_grace_period: bool,
}

pub async fn refresh_license_handler(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let snapshot = state.activation.refresh(&req.license_id, &req.machine_id).await?;
    log_license_binding_event(LicenseEvent::Refreshed, &req.license_id, &req.machine_id, None);
    Ok(Json(RefreshResponse {
        success: true,
        valid: snapshot.valid,
        status: snapshot.status,
        days_remaining: snapshot.days_remaining,
        in_grace_period: snapshot.in_grace_period,
    }))
}

// ===========================================================================
// POST /license/deactivate
// ===========================================================================

#[derive(Debug, Deserialize)]
pub struct DeactivateRequest {
    pub license_id: String,
    pub machine_id: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub async fn deactivate_license_handler(
    State(state): State<AppState>,
    Json(req): Json<DeactivateRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.activation.deactivate(&req.license_id, &req.machine_id).await?;
    log_license_binding_event(LicenseEvent::Deactivated, &req.license_id, &req.machine_id, None);
    Ok(Json(SuccessResponse { success: true }))
}

// ===========================================================================
// POST /retailease/auth/  (token-minting)
// ===========================================================================

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub license_id: String,
    pub machine_id: String,
    pub machine_name: Option<String>,
    pub device_type: Option<String>,
    pub os_info: Option<String>,
    pub app_version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business: Option<BusinessView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter: Option<CounterView>,
}

pub async fn authenticate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let mut license = state.db.get_license(&req.license_id).await?.ok_or(LicenseError::LicenseNotFound)?;

    let now = Utc::now().naive_utc();
    ActivationManager::reconcile_status(&mut license, now, state.config.license.grace_period_days);
    match license.status.as_str() {
        "revoked" => return Err(LicenseError::Revoked.into()),
        "suspended" => return Err(LicenseError::Suspended.into()),
        _ => {}
    }
    if !license.is_valid(now) && !license.in_grace_period(now, state.config.license.grace_period_days) {
        return Err(LicenseError::Expired.into());
    }

    let ip = client_ip(&headers);
    let activation = state
        .activation
        .get_or_create_activation(&mut license, &req.machine_id, req.machine_name.as_deref(), ip.as_deref())
        .await?;

    let business = state.db.get_business_by_license(&license.id).await?;
    let mut counter_view = None;
    let counter_id = if let Some(business) = &business {
        match state.db.get_counter_by_activation(&activation.id).await? {
            Some(c) => {
                counter_view = Some(CounterView::from(&c));
                Some(c.id)
            }
            None => {
                let existing_count = state.db.count_counters_by_business(&business.id).await?;
                let counter = Counter {
                    id: uuid::Uuid::new_v4().to_string(),
                    business_id: business.id.clone(),
                    activation_id: activation.id.clone(),
                    name: req.machine_name.clone().unwrap_or_else(|| "Counter".to_string()),
                    description: None,
                    device_name: req.machine_name.clone(),
                    device_type: req.device_type.clone(),
                    os_info: req.os_info.clone(),
                    app_version: req.app_version.clone(),
                    status: "active".to_string(),
                    is_primary: existing_count == 0,
                    sync_enabled: true,
                    last_sync_at: None,
                };
                state.db.upsert_counter(&counter).await?;
                counter_view = Some(CounterView::from(&counter));
                Some(counter.id)
            }
        }
    } else {
        None
    };

    let authenticator = TokenAuthenticator::new(state.db.clone());
    let token = authenticator.get_or_create(&license.id, counter_id.as_deref()).await?;

    log_license_binding_event(LicenseEvent::Validated, &license.id, &req.machine_id, req.machine_name.as_deref());

    Ok(Json(AuthResponse {
        token,
        business: business.as_ref().map(BusinessView::from),
        counter: counter_view,
    }))
}

pub async fn logout_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
) -> Result<Json<SuccessResponse>, ApiError> {
    let authenticator = TokenAuthenticator::new(state.db.clone());
    authenticator.logout(&caller.token.token).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ===========================================================================
// GET /retailease/status
// ===========================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub valid: bool,
    pub status: String,
    pub days_remaining: i64,
    pub in_grace_period: bool,
}

pub async fn status_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
) -> Result<Json<StatusResponse>, ApiError> {
    let mut license = state.db.get_license(&caller.token.license_id).await?.ok_or(LicenseError::LicenseNotFound)?;
    let now = Utc::now().naive_utc();
    ActivationManager::reconcile_status(&mut license, now, state.config.license.grace_period_days);
    let in_grace = license.in_grace_period(now, state.config.license.grace_period_days);

    Ok(Json(StatusResponse {
        valid: license.is_valid(now) || in_grace,
        status: license.status.clone(),
        days_remaining: license.days_remaining(now),
        in_grace_period: in_grace,
    }))
}

// ===========================================================================
// Business / Counter (token-gated)
// ===========================================================================

pub async fn get_business_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
) -> Result<Json<Business>, ApiError> {
    let business = state
        .db
        .get_business_by_license(&caller.token.license_id)
        .await?
        .ok_or(LicenseError::BusinessNotFound)?;
    Ok(Json(business))
}

pub async fn register_business_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    Json(fields): Json<BusinessFields>,
) -> Result<Json<Business>, ApiError> {
    let activation_id = match &caller.token.counter_id {
        Some(counter_id) => state.db.get_counter(counter_id).await?.map(|c| c.activation_id),
        None => None,
    };
    let business = state
        .tenant
        .register_or_update_business(&caller.token.license_id, activation_id.as_deref(), fields)
        .await?;
    log_license_event(LicenseEvent::BusinessRegistered, &caller.token.license_id, Some(&business.id));
    Ok(Json(business))
}

async fn owning_business_id(state: &AppState, caller: &AuthenticatedCaller) -> LicenseResult<String> {
    state
        .db
        .get_business_by_license(&caller.token.license_id)
        .await?
        .map(|b| b.id)
        .ok_or(LicenseError::BusinessNotFound)
}

async fn assert_counter_ownership(state: &AppState, caller: &AuthenticatedCaller, counter: &Counter) -> LicenseResult<()> {
    let business_id = owning_business_id(state, caller).await?;
    if counter.business_id != business_id {
        return Err(LicenseError::Unauthorized("counter does not belong to this license".into()));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct CounterListEntry {
    #[serde(flatten)]
    pub counter: Counter,
    pub is_current: bool,
}

pub async fn list_counters_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
) -> Result<Json<Vec<CounterListEntry>>, ApiError> {
    let business_id = owning_business_id(&state, &caller).await?;
    let current_activation_id = match &caller.token.counter_id {
        Some(counter_id) => state.db.get_counter(counter_id).await?.map(|c| c.activation_id),
        None => None,
    };

    let counters = state.tenant.list_counters(&business_id, current_activation_id.as_deref()).await?;
    Ok(Json(
        counters
            .into_iter()
            .map(|(counter, is_current)| CounterListEntry { counter, is_current })
            .collect(),
    ))
}

pub async fn update_counter_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    Path(counter_id): Path<String>,
    Json(fields): Json<CounterFields>,
) -> Result<Json<Counter>, ApiError> {
    let existing = state.db.get_counter(&counter_id).await?.ok_or(LicenseError::CounterNotFound)?;
    assert_counter_ownership(&state, &caller, &existing).await?;
    let counter = state.tenant.update_counter(&counter_id, fields).await?;
    Ok(Json(counter))
}

pub async fn deactivate_counter_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    Path(counter_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let existing = state.db.get_counter(&counter_id).await?.ok_or(LicenseError::CounterNotFound)?;
    assert_counter_ownership(&state, &caller, &existing).await?;
    state.tenant.deactivate_counter(&counter_id).await?;
    log_license_event(LicenseEvent::CounterDeactivated, &caller.token.license_id, Some(&counter_id));
    Ok(Json(SuccessResponse { success: true }))
}

// ===========================================================================
// Backups (token-gated)
// ===========================================================================

#[derive(Debug, Deserialize)]
pub struct ListBackupsQuery {
    #[serde(rename = "type")]
    pub backup_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_backups_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    Query(q): Query<ListBackupsQuery>,
) -> Result<Json<Vec<Backup>>, ApiError> {
    let business_id = owning_business_id(&state, &caller).await?;
    let backups = state.backups.list(&business_id, q.backup_type.as_deref(), q.limit, q.offset).await?;
    Ok(Json(backups))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub backup: Backup,
}

pub async fn upload_backup_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let business_id = owning_business_id(&state, &caller).await?;
    let counter_name = match &caller.token.counter_id {
        Some(id) => state.db.get_counter(id).await?.map(|c| c.name).unwrap_or_else(|| "device".to_string()),
        None => "device".to_string(),
    };

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut backup_type = "manual".to_string();
    let mut app_version = None;
    let mut db_version = None;
    let mut record_counts = None;
    let mut notes = None;
    let mut claimed_checksum = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| LicenseError::UploadError(e.to_string()))? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                file_bytes = Some(field.bytes().await.map_err(|e| LicenseError::UploadError(e.to_string()))?.to_vec());
            }
            "backup_type" => backup_type = field.text().await.unwrap_or_default(),
            "app_version" => app_version = Some(field.text().await.unwrap_or_default()),
            "db_version" => db_version = field.text().await.ok().and_then(|v| v.parse().ok()),
            "record_counts" => record_counts = Some(field.text().await.unwrap_or_default()),
            "notes" => notes = Some(field.text().await.unwrap_or_default()),
            "checksum" => claimed_checksum = Some(field.text().await.unwrap_or_default()),
            _ => {}
        }
    }

    let file_bytes = file_bytes.ok_or(LicenseError::NoFile)?;
    if file_bytes.len() as u64 > state.config.backup.max_upload_bytes {
        return Err(LicenseError::PayloadTooLarge.into());
    }

    let backup = state
        .backups
        .upload(UploadRequest {
            business_id,
            counter_id: caller.token.counter_id.clone(),
            counter_name,
            file_bytes,
            backup_type,
            app_version,
            db_version,
            record_counts,
            notes,
            claimed_checksum,
        })
        .await?;

    log_license_event(LicenseEvent::BackupUploaded, &caller.token.license_id, Some(&backup.id));
    Ok(Json(UploadResponse { success: true, backup }))
}

pub async fn download_backup_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    Path(backup_id): Path<String>,
) -> Result<Response, ApiError> {
    let business_id = owning_business_id(&state, &caller).await?;
    let (backup, bytes) = state.backups.download(&backup_id).await?;
    if backup.business_id != business_id {
        return Err(LicenseError::Unauthorized("backup does not belong to this license".into()).into());
    }

    let response = Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/octet-stream")
        .header("Content-Disposition", format!("attachment; filename=\"{}\"", backup.filename))
        .header("X-Checksum", backup.checksum.clone())
        .header("X-File-Size", backup.file_size.to_string())
        .body(axum::body::Body::from(bytes))
        .map_err(|e| LicenseError::ServerError(e.to_string()))?;
    Ok(response)
}

pub async fn delete_backup_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    Path(backup_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let business_id = owning_business_id(&state, &caller).await?;
    let backup = state.db.get_backup(&backup_id).await?.ok_or(LicenseError::BackupNotFound)?;
    if backup.business_id != business_id {
        return Err(LicenseError::Unauthorized("backup does not belong to this license".into()).into());
    }
    state.backups.delete(&backup_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    pub keep_count: usize,
    #[serde(rename = "type")]
    pub backup_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub deleted: usize,
}

pub async fn cleanup_backups_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    Json(req): Json<CleanupRequest>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let business_id = owning_business_id(&state, &caller).await?;
    let deleted = state.backups.cleanup(&business_id, req.keep_count, req.backup_type.as_deref()).await?;
    Ok(Json(CleanupResponse { success: true, deleted }))
}

// ===========================================================================
// Sync sessions (token-gated)
// ===========================================================================

#[derive(Debug, Deserialize)]
pub struct StartSyncRequest {
    pub sync_type: String,
    pub direction: String,
}

pub async fn start_sync_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    Json(req): Json<StartSyncRequest>,
) -> Result<Json<SyncLog>, ApiError> {
    let business_id = owning_business_id(&state, &caller).await?;
    let counter_id = caller.token.counter_id.clone().ok_or(LicenseError::CounterNotFound)?;
    let log = state.sync_log.start(&business_id, &counter_id, &req.sync_type, &req.direction).await?;
    log_license_event(LicenseEvent::SyncStarted, &caller.token.license_id, Some(&log.id));
    Ok(Json(log))
}

#[derive(Debug, Deserialize)]
pub struct CompleteSyncRequest {
    pub records_uploaded: i64,
    pub records_downloaded: i64,
    pub conflicts_detected: i64,
    pub conflicts_resolved: i64,
    pub status: String,
    pub error_message: Option<String>,
}

pub async fn complete_sync_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    Path(sync_id): Path<String>,
    Json(req): Json<CompleteSyncRequest>,
) -> Result<Json<SyncLog>, ApiError> {
    let business_id = owning_business_id(&state, &caller).await?;
    let existing = state.db.get_sync_log(&sync_id).await?.ok_or(LicenseError::ActivationNotFound)?;
    if existing.business_id != business_id {
        return Err(LicenseError::Unauthorized("sync session does not belong to this license".into()).into());
    }

    let log = state
        .sync_log
        .complete(
            &sync_id,
            SyncStats {
                records_uploaded: req.records_uploaded,
                records_downloaded: req.records_downloaded,
                conflicts_detected: req.conflicts_detected,
                conflicts_resolved: req.conflicts_resolved,
            },
            &req.status,
            req.error_message,
        )
        .await?;
    log_license_event(LicenseEvent::SyncCompleted, &caller.token.license_id, Some(&log.id));
    Ok(Json(log))
}

#[derive(Debug, Deserialize)]
pub struct SyncHistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

pub async fn sync_history_handler(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    Query(q): Query<SyncHistoryQuery>,
) -> Result<Json<Vec<SyncLog>>, ApiError> {
    let business_id = owning_business_id(&state, &caller).await?;
    let history = state.sync_log.history(&business_id, q.limit).await?;
    Ok(Json(history))
}

// ===========================================================================
// Health
// ===========================================================================

pub async fn health_handler(State(state): State<AppState>) -> Json<crate::server::logging::HealthResponse> {
    let db_type = state.config.database.db_type.clone();
    let connected = state.db.get_app_config().await.is_ok();
    info!(connected, "health check");
    Json(crate::server::logging::HealthResponse::healthy(connected, &db_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_license(now: NaiveDateTime) -> License {
        License {
            id: "lic_1".into(),
            key_pair_id: "kp_1".into(),
            customer_name: "Acme".into(),
            customer_email: "acme@test.dev".into(),
            customer_company: None,
            customer_phone: None,
            license_type: "basic".into(),
            status: "active".into(),
            max_activations: 2,
            current_activations: 1,
            valid_from: now - Duration::days(10),
            valid_until: now + Duration::days(30),
            billing_cycle: "monthly".into(),
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
    fn license_view_carries_computed_fields() {
        let now = Utc::now().naive_utc();
        let license = sample_license(now);
        let view = LicenseView::from(&license, now, 7);
        assert_eq!(view.status, "active");
        assert!(view.days_remaining > 0);
        assert!(!view.in_grace_period);
    }

    #[test]
    fn validate_response_serializes_without_null_fields_when_invalid() {
        let resp = ValidateResponse { valid: false, license: None, error: Some("expired".into()) };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"error\":\"expired\""));
        assert!(!json.contains("\"license\""));
    }

    #[test]
    fn client_ip_prefers_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn client_ip_falls_back_to_x_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.4".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("198.51.100.4"));
    }
}
