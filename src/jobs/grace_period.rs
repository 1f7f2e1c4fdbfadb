//! Grace period expiration job.
//!
//! This job checks for licenses that are in 'suspended' status with a grace period
//! that has expired, and updates their status to 'revoked'.

use chrono::Utc;
use tracing::{debug, info};

use crate::server::database::Database;
use crate::server::logging::{log_license_event, LicenseEvent};

use super::JobError;

/// Check for and process licenses with expired grace periods.
///
/// Queries for licenses where:
/// - `status = 'suspended'`
/// - `grace_period_ends_at < NOW()`
///
/// Updates matching licenses:
/// - Sets `status = 'revoked'`
/// - Sets `revoked_at = NOW()`
///
/// Returns the number of licenses that were revoked.
pub async fn run_grace_period_check(db: &Database) -> Result<u32, JobError> {
    let now = Utc::now().naive_utc();

    debug!("Checking for expired grace periods at {}", now);

    let expired_licenses = db.get_expired_grace_period_licenses(now).await?;

    let mut count = 0;

    for mut license in expired_licenses {
        debug!(
            "Revoking license {} (grace period ended at {:?})",
            license.id, license.grace_period_ends_at
        );

        license.status = "revoked".to_string();
        license.revoked_at = Some(now);
        license.revoke_reason = Some("grace period expired".to_string());
        license.append_note("revoked (reason=grace period expired)");

        if db.insert_license(&license).await.is_ok() {
            count += 1;
            log_license_event(LicenseEvent::Revoked, &license.id, Some("grace period expired"));
            info!(license_id = %license.id, "license revoked (grace period expired)");
        }
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    // Integration tests are in tests/jobs_tests.rs
}
