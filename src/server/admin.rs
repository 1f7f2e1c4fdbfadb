//! Admin-key-gated license management.
//!
//! `/license/renew` is the one route in this module that ordinary operator
//! tooling hits directly — everything else here (create/revoke/suspend/
//! reinstate/extend) exists because an operator needs *some* way to manage a
//! license's lifecycle beyond what a device can do for itself, and a shared
//! secret is simpler to provision than a full admin identity system for a
//! service this size (`SPEC_FULL.md` §6.5, §9).

use axum::extract::{Path, State};
use axum::Json;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::crypto::key_store::KeyPair;
use crate::crypto::signer::{LicensePayload, LicenseSigner};
use crate::errors::LicenseError;
use crate::server::api_error::{ApiError, ErrorCode};
use crate::server::database::License;
use crate::server::handlers::AppState;
use crate::server::logging::{log_license_event, LicenseEvent};
use crate::server::validation;

/// Constant-time byte comparison — timing leaks on the admin key would let
/// an attacker learn it one byte at a time.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn require_admin_key(state: &AppState, supplied: &str) -> Result<(), ApiError> {
    if state.config.license.admin_key.is_empty() || !constant_time_eq(supplied, &state.config.license.admin_key) {
        return Err(LicenseError::Unauthorized("invalid admin key".into()).into());
    }
    Ok(())
}

fn default_extend_days(billing_cycle: &str) -> i64 {
    match billing_cycle {
        "monthly" => 30,
        "yearly" | "annual" => 365,
        "lifetime" => 36_500,
        _ => 30,
    }
}

/// Default validity window for a newly created license, keyed on
/// `license_type` rather than `billing_cycle` — creation has no billing
/// cycle to key off yet.
fn default_validity_days(license_type: &str) -> i64 {
    match license_type {
        "trial" => 30,
        "lifetime" => 36_500,
        _ => 365,
    }
}

async fn resign_license(license: &License, state: &AppState) -> Result<String, ApiError> {
    let row = state.db.get_active_key_pair().await?.ok_or(LicenseError::NoActiveKey)?;
    let kp = KeyPair {
        id: row.id,
        name: row.name,
        private_key_pem: row.private_key_pem,
        public_key_pem: row.public_key_pem,
        is_active: row.is_active,
        created_at: row.created_at,
    };
    let payload = LicensePayload {
        lid: license.id.clone(),
        cname: license.customer_name.clone(),
        cemail: license.customer_email.clone(),
        ltype: license.license_type.clone(),
        vfrom: license.valid_from,
        vuntil: license.valid_until,
        maxact: license.max_activations as u32,
        iat: Utc::now().naive_utc(),
    };
    Ok(LicenseSigner::sign(&payload, &kp.private_key()?)?)
}

// ===========================================================================
// POST /license/renew
// ===========================================================================

#[derive(Debug, Deserialize)]
pub struct RenewRequest {
    pub license_id: String,
    pub admin_key: String,
    pub extend_days: Option<i64>,
    pub payment_reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RenewedLicenseSummary {
    pub old_valid_until: NaiveDateTime,
    pub new_valid_until: NaiveDateTime,
    pub renewal_count: i64,
}

#[derive(Debug, Serialize)]
pub struct RenewResponse {
    pub success: bool,
    pub license: RenewedLicenseSummary,
}

pub async fn renew_license_handler(
    State(state): State<AppState>,
    Json(req): Json<RenewRequest>,
) -> Result<Json<RenewResponse>, ApiError> {
    require_admin_key(&state, &req.admin_key)?;

    let guard = state.activation.lock_for(&req.license_id).await;
    let _permit = guard.lock().await;

    let mut license = state.db.get_license(&req.license_id).await?.ok_or(LicenseError::LicenseNotFound)?;

    let extend_days = req.extend_days.unwrap_or_else(|| default_extend_days(&license.billing_cycle));
    let old_valid_until = license.valid_until;
    let new_valid_until = license.valid_until.max(Utc::now().naive_utc()) + chrono::Duration::days(extend_days);

    license.valid_until = new_valid_until;
    license.status = "active".to_string();
    license.renewal_count += 1;
    license.last_renewed_at = Some(Utc::now().naive_utc());
    license.revoked_at = None;
    license.revoke_reason = None;
    license.grace_period_ends_at = None;
    license.append_note(&format!(
        "renewed +{extend_days}d (ref={})",
        req.payment_reference.as_deref().unwrap_or("none")
    ));

    license.license_code = resign_license(&license, &state).await?;

    state.db.insert_license(&license).await?;
    log_license_event(LicenseEvent::Renewed, &license.id, req.payment_reference.as_deref());
    info!(license_id = %license.id, renewal_count = license.renewal_count, "license renewed");

    Ok(Json(RenewResponse {
        success: true,
        license: RenewedLicenseSummary {
            old_valid_until,
            new_valid_until,
            renewal_count: license.renewal_count,
        },
    }))
}

// ===========================================================================
// POST /admin/licenses  (create)
// ===========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateLicenseRequest {
    pub admin_key: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_company: Option<String>,
    pub customer_phone: Option<String>,
    pub license_type: String,
    pub max_activations: i64,
    pub billing_cycle: String,
    pub valid_days: Option<i64>,
}

pub async fn create_license_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateLicenseRequest>,
) -> Result<Json<License>, ApiError> {
    require_admin_key(&state, &req.admin_key)?;
    validation::validate_email(&req.customer_email, "customer_email")
        .map_err(|e| ApiError::with_message(ErrorCode::InvalidRequest, e.to_string()))?;
    validation::validate_not_empty(&req.customer_name, "customer_name")
        .map_err(|e| ApiError::with_message(ErrorCode::InvalidRequest, e.to_string()))?;

    let row = state.db.get_active_key_pair().await?.ok_or(LicenseError::NoActiveKey)?;
    let kp = KeyPair {
        id: row.id.clone(),
        name: row.name,
        private_key_pem: row.private_key_pem,
        public_key_pem: row.public_key_pem,
        is_active: row.is_active,
        created_at: row.created_at,
    };

    let now = Utc::now().naive_utc();
    let valid_days = req.valid_days.unwrap_or_else(|| default_validity_days(&req.license_type));
    let valid_until = now + chrono::Duration::days(valid_days);

    let payload = LicensePayload {
        lid: uuid::Uuid::new_v4().to_string(),
        cname: req.customer_name.clone(),
        cemail: req.customer_email.clone(),
        ltype: req.license_type.clone(),
        vfrom: now,
        vuntil: valid_until,
        maxact: req.max_activations as u32,
        iat: now,
    };
    let license_code = LicenseSigner::sign(&payload, &kp.private_key()?)?;

    let license = License {
        id: payload.lid.clone(),
        key_pair_id: row.id,
        customer_name: req.customer_name,
        customer_email: req.customer_email,
        customer_company: req.customer_company,
        customer_phone: req.customer_phone,
        license_type: req.license_type,
        status: "active".to_string(),
        max_activations: req.max_activations,
        current_activations: 0,
        valid_from: now,
        valid_until,
        billing_cycle: req.billing_cycle,
        renewal_count: 0,
        last_renewed_at: None,
        notes: None,
        license_code,
        client_id: None,
        grace_period_ends_at: None,
        revoked_at: None,
        revoke_reason: None,
    };

    state.db.insert_license(&license).await?;
    log_license_event(LicenseEvent::Created, &license.id, None);
    Ok(Json(license))
}

pub async fn get_license_handler(
    State(state): State<AppState>,
    Path(license_id): Path<String>,
) -> Result<Json<License>, ApiError> {
    let license = state.db.get_license(&license_id).await?.ok_or(LicenseError::LicenseNotFound)?;
    Ok(Json(license))
}

// ===========================================================================
// POST /admin/licenses/{id}/revoke | suspend | reinstate
// ===========================================================================

#[derive(Debug, Deserialize)]
pub struct AdminActionRequest {
    pub admin_key: String,
    pub reason: Option<String>,
    /// Only applied by `reinstate`; a revoked/suspended license's old
    /// `valid_until` may already be stale by the time it's reinstated.
    pub new_valid_until: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize)]
pub struct LicenseActionResponse {
    pub success: bool,
    pub license: License,
}

pub async fn revoke_license_handler(
    State(state): State<AppState>,
    Path(license_id): Path<String>,
    Json(req): Json<AdminActionRequest>,
) -> Result<Json<LicenseActionResponse>, ApiError> {
    require_admin_key(&state, &req.admin_key)?;

    let guard = state.activation.lock_for(&license_id).await;
    let _permit = guard.lock().await;

    let mut license = state.db.get_license(&license_id).await?.ok_or(LicenseError::LicenseNotFound)?;
    license.status = "revoked".to_string();
    license.revoked_at = Some(Utc::now().naive_utc());
    license.revoke_reason = req.reason.clone();
    license.append_note(&format!("revoked (reason={})", req.reason.as_deref().unwrap_or("none")));
    state.db.insert_license(&license).await?;

    log_license_event(LicenseEvent::Revoked, &license.id, req.reason.as_deref());
    Ok(Json(LicenseActionResponse { success: true, license }))
}

pub async fn suspend_license_handler(
    State(state): State<AppState>,
    Path(license_id): Path<String>,
    Json(req): Json<AdminActionRequest>,
) -> Result<Json<LicenseActionResponse>, ApiError> {
    require_admin_key(&state, &req.admin_key)?;

    let guard = state.activation.lock_for(&license_id).await;
    let _permit = guard.lock().await;

    let mut license = state.db.get_license(&license_id).await?.ok_or(LicenseError::LicenseNotFound)?;
    license.status = "suspended".to_string();
    license.grace_period_ends_at =
        Some(Utc::now().naive_utc() + chrono::Duration::days(state.config.license.grace_period_days));
    license.append_note(&format!("suspended (reason={})", req.reason.as_deref().unwrap_or("none")));
    state.db.insert_license(&license).await?;

    log_license_event(LicenseEvent::Suspended, &license.id, req.reason.as_deref());
    Ok(Json(LicenseActionResponse { success: true, license }))
}

pub async fn reinstate_license_handler(
    State(state): State<AppState>,
    Path(license_id): Path<String>,
    Json(req): Json<AdminActionRequest>,
) -> Result<Json<LicenseActionResponse>, ApiError> {
    require_admin_key(&state, &req.admin_key)?;

    let guard = state.activation.lock_for(&license_id).await;
    let _permit = guard.lock().await;

    let mut license = state.db.get_license(&license_id).await?.ok_or(LicenseError::LicenseNotFound)?;
    license.status = "active".to_string();
    license.revoked_at = None;
    license.revoke_reason = None;
    license.grace_period_ends_at = None;
    if let Some(new_valid_until) = req.new_valid_until {
        license.valid_until = new_valid_until;
        license.append_note(&format!("reinstated (valid_until={new_valid_until})"));
    } else {
        license.append_note("reinstated");
    }
    state.db.insert_license(&license).await?;

    log_license_event(LicenseEvent::Reinstated, &license.id, None);
    Ok(Json(LicenseActionResponse { success: true, license }))
}

// ===========================================================================
// POST /admin/licenses/{id}/extend
// ===========================================================================

#[derive(Debug, Deserialize)]
pub struct ExtendLicenseRequest {
    pub admin_key: String,
    pub new_valid_until: NaiveDateTime,
    pub reason: Option<String>,
}

/// Pure operator override of `valid_until`, independent of any
/// billing-cycle or license-type default math — an operator handing out a
/// one-off extension, not a renewal. Re-signs the license code the same way
/// `renew_license_handler` does, since its payload embeds `vuntil`.
pub async fn extend_license_handler(
    State(state): State<AppState>,
    Path(license_id): Path<String>,
    Json(req): Json<ExtendLicenseRequest>,
) -> Result<Json<LicenseActionResponse>, ApiError> {
    require_admin_key(&state, &req.admin_key)?;

    let guard = state.activation.lock_for(&license_id).await;
    let _permit = guard.lock().await;

    let mut license = state.db.get_license(&license_id).await?.ok_or(LicenseError::LicenseNotFound)?;
    let old_valid_until = license.valid_until;
    license.valid_until = req.new_valid_until;
    license.append_note(&format!(
        "extended {old_valid_until} -> {} (reason={})",
        req.new_valid_until,
        req.reason.as_deref().unwrap_or("none")
    ));
    license.license_code = resign_license(&license, &state).await?;
    state.db.insert_license(&license).await?;

    log_license_event(LicenseEvent::Extended, &license.id, req.reason.as_deref());
    Ok(Json(LicenseActionResponse { success: true, license }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_equal_strings() {
        assert!(constant_time_eq("supersecret", "supersecret"));
    }

    #[test]
    fn constant_time_eq_rejects_mismatched_strings() {
        assert!(!constant_time_eq("supersecret", "wrongsecret"));
        assert!(!constant_time_eq("short", "muchlonger"));
    }

    #[test]
    fn default_extend_days_by_billing_cycle() {
        assert_eq!(default_extend_days("monthly"), 30);
        assert_eq!(default_extend_days("yearly"), 365);
        assert_eq!(default_extend_days("lifetime"), 36_500);
        assert_eq!(default_extend_days("unknown"), 30);
    }

    #[test]
    fn default_validity_days_by_license_type() {
        assert_eq!(default_validity_days("trial"), 30);
        assert_eq!(default_validity_days("lifetime"), 36_500);
        assert_eq!(default_validity_days("basic"), 365);
        assert_eq!(default_validity_days("professional"), 365);
        assert_eq!(default_validity_days("enterprise"), 365);
    }
}
