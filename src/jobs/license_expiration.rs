//! License expiration job.
//!
//! This job checks for licenses that are in 'active' status with an expiration date
//! that has passed, and updates their status to 'expired'.

use chrono::Utc;
use tracing::{debug, info};

use crate::server::database::Database;
use crate::server::logging::{log_license_event, LicenseEvent};

use super::JobError;

/// Check for and process expired licenses.
///
/// Queries for licenses where:
/// - `status = 'active'`
/// - `valid_until < NOW()`
///
/// Updates matching licenses:
/// - Sets `status = 'expired'`
///
/// Returns the number of licenses that were expired.
pub async fn run_license_expiration_check(db: &Database) -> Result<u32, JobError> {
    let now = Utc::now().naive_utc();

    debug!("Checking for expired licenses at {}", now);

    let expired_licenses = db.get_expired_licenses(now).await?;

    let mut count = 0;

    for mut license in expired_licenses {
        debug!("Expiring license {} (valid_until {:?})", license.id, license.valid_until);

        license.status = "expired".to_string();
        license.append_note("expired (valid_until elapsed)");

        if db.insert_license(&license).await.is_ok() {
            count += 1;
            log_license_event(LicenseEvent::Expired, &license.id, None);
            info!(license_id = %license.id, "license expired");
        }
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    // Integration tests are in tests/jobs_tests.rs
}
