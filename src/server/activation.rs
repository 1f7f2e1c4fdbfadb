//! Per-(license, machine) activation slots.
//!
//! `ValidateAndActivate` and `Deactivate` on the same license must be
//! serialized so the slot-cap check and the persisted `current_activations`
//! write are one linearizable step (`SPEC_FULL.md` §5). A single-process
//! deployment gets this from a sharded in-memory mutex keyed by `license_id`;
//! a multi-process deployment would need `SELECT … FOR UPDATE` instead, but
//! that's a swap at the storage boundary, not here.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::errors::{LicenseError, LicenseResult};
use crate::server::database::{Activation, Database, License};

/// Outcome of `ValidateAndActivate`.
pub struct ActivationResult {
    pub license: License,
    pub activation: Activation,
}

/// Server-authoritative snapshot returned by `Refresh`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RefreshSnapshot {
    pub valid: bool,
    pub status: String,
    pub days_remaining: i64,
    pub in_grace_period: bool,
}

#[derive(Clone)]
pub struct ActivationManager {
    db: Arc<Database>,
    grace_period_days: i64,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ActivationManager {
    pub fn new(db: Arc<Database>, grace_period_days: i64) -> Self {
        Self {
            db,
            grace_period_days,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) async fn lock_for(&self, license_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(license_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Resolve the License's status/expiry bookkeeping against `now`,
    /// persisting a transition if one is due. Shared by activation,
    /// refresh, and the background sweeps.
    pub fn reconcile_status(license: &mut License, now: chrono::NaiveDateTime, grace_period_days: i64) {
        if license.status == "active" && now > license.valid_until && !license.in_grace_period(now, grace_period_days)
        {
            license.status = "expired".to_string();
        }
    }

    pub async fn validate_and_activate(
        &self,
        code: &str,
        machine_id: &str,
        machine_name: Option<&str>,
        ip: Option<&str>,
        public_key: &rsa::RsaPublicKey,
    ) -> LicenseResult<ActivationResult> {
        let verified = crate::crypto::signer::LicenseVerifier::verify(code, public_key)?;

        let mut license = self
            .db
            .get_license(&verified.payload.lid)
            .await?
            .ok_or(LicenseError::LicenseNotFound)?;

        match license.status.as_str() {
            "revoked" => return Err(LicenseError::Revoked),
            "suspended" => return Err(LicenseError::Suspended),
            _ => {}
        }

        let now = Utc::now().naive_utc();
        Self::reconcile_status(&mut license, now, self.grace_period_days);

        if !license.is_valid(now) && !license.in_grace_period(now, self.grace_period_days) {
            if license.status != "expired" {
                license.status = "expired".to_string();
                self.db.insert_license(&license).await?;
            }
            return Err(LicenseError::Expired);
        }

        let activation = self.get_or_create_activation(&mut license, machine_id, machine_name, ip).await?;

        info!(license_id = %license.id, machine_id = %machine_id, "license activated");
        Ok(ActivationResult { license, activation })
    }

    /// Shared step of `ValidateAndActivate` and the token-minting auth flow
    /// (`SPEC_FULL.md` §4.D step 5 / §4.E step 2): get-or-create the
    /// (license, machine) Activation under the per-license lock, enforcing
    /// the `max_activations` slot cap on first creation.
    pub async fn get_or_create_activation(
        &self,
        license: &mut License,
        machine_id: &str,
        machine_name: Option<&str>,
        ip: Option<&str>,
    ) -> LicenseResult<Activation> {
        let guard = self.lock_for(&license.id).await;
        let _permit = guard.lock().await;

        let now = Utc::now().naive_utc();
        let existing = self.db.get_activation(&license.id, machine_id).await?;

        let activation = match existing {
            Some(a) if !a.is_active => {
                return Err(LicenseError::DeviceDeactivated);
            }
            Some(mut a) => {
                a.last_check = now;
                if let Some(ip) = ip {
                    a.ip_address = Some(ip.to_string());
                }
                if let Some(name) = machine_name {
                    a.machine_name = Some(name.to_string());
                }
                self.db.insert_activation(&a).await?;
                a
            }
            None => {
                let candidate = Activation {
                    id: uuid::Uuid::new_v4().to_string(),
                    license_id: license.id.clone(),
                    machine_id: machine_id.to_string(),
                    machine_name: machine_name.map(str::to_string),
                    activated_at: now,
                    last_check: now,
                    is_active: true,
                    ip_address: ip.map(str::to_string),
                };
                self.db.insert_activation(&candidate).await?;

                let count = self.db.count_active_activations(&license.id).await?;
                if count > license.max_activations {
                    let mut rolled_back = candidate.clone();
                    rolled_back.is_active = false;
                    self.db.insert_activation(&rolled_back).await?;
                    warn!(license_id = %license.id, "activation rejected: max_activations reached");
                    return Err(LicenseError::MaxActivations);
                }

                license.current_activations = count;
                self.db.insert_license(&license).await?;
                candidate
            }
        };

        Ok(activation)
    }

    pub async fn deactivate(&self, license_id: &str, machine_id: &str) -> LicenseResult<()> {
        let guard = self.lock_for(license_id).await;
        let _permit = guard.lock().await;

        let mut activation = self
            .db
            .get_activation(license_id, machine_id)
            .await?
            .ok_or(LicenseError::ActivationNotFound)?;

        activation.is_active = false;
        self.db.insert_activation(&activation).await?;

        if let Some(mut license) = self.db.get_license(license_id).await? {
            license.current_activations = self.db.count_active_activations(license_id).await?;
            self.db.insert_license(&license).await?;
        }

        Ok(())
    }

    pub async fn refresh(&self, license_id: &str, machine_id: &str) -> LicenseResult<RefreshSnapshot> {
        let mut license = self
            .db
            .get_license(license_id)
            .await?
            .ok_or(LicenseError::LicenseNotFound)?;

        let activation = self.db.get_activation(license_id, machine_id).await?;

        let now = Utc::now().naive_utc();
        Self::reconcile_status(&mut license, now, self.grace_period_days);

        let device_deactivated = matches!(&activation, Some(a) if !a.is_active);
        let in_grace = license.in_grace_period(now, self.grace_period_days);
        let valid = !device_deactivated && license.is_valid(now);

        let status = if device_deactivated {
            "device_deactivated".to_string()
        } else {
            license.status.clone()
        };

        Ok(RefreshSnapshot {
            valid,
            status,
            days_remaining: license.days_remaining(now),
            in_grace_period: in_grace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::database::License;
    use chrono::Duration;

    fn sample_license(now: chrono::NaiveDateTime) -> License {
        License {
            id: "lic_1".into(),
            key_pair_id: "kp_1".into(),
            customer_name: "Acme".into(),
            customer_email: "acme@test.dev".into(),
            customer_company: None,
            customer_phone: None,
            license_type: "basic".into(),
            status: "active".into(),
            max_activations: 1,
            current_activations: 0,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(365),
            billing_cycle: "annual".into(),
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
    fn reconcile_transitions_past_due_active_license_to_expired() {
        let now = Utc::now().naive_utc();
        let mut license = sample_license(now);
        license.valid_until = now - Duration::days(8);
        ActivationManager::reconcile_status(&mut license, now, 7);
        assert_eq!(license.status, "expired");
    }

    #[test]
    fn reconcile_leaves_active_license_within_grace_period_untouched() {
        let now = Utc::now().naive_utc();
        let mut license = sample_license(now);
        license.valid_until = now - Duration::days(1);
        ActivationManager::reconcile_status(&mut license, now, 7);
        assert_eq!(license.status, "active");
    }

    #[test]
    fn reconcile_leaves_license_in_grace_period_untouched() {
        let now = Utc::now().naive_utc();
        let mut license = sample_license(now);
        license.status = "suspended".into();
        license.grace_period_ends_at = Some(now + Duration::days(1));
        ActivationManager::reconcile_status(&mut license, now, 7);
        assert_eq!(license.status, "suspended");
    }
}
