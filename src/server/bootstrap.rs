//! Bootstrap flow for initial server setup.
//!
//! Signing requires an active `KeyPair`. If the database has none at
//! startup, this generates one from `[license] key_bits` rather than fail
//! every `/license/validate` call with `NoActiveKey` on an otherwise fresh
//! deployment.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::RetaileaseConfig;
use crate::crypto::key_store::KeyPair;
use crate::errors::LicenseResult;
use crate::server::database::{Database, KeyPairRow};

/// Ensure an active signing key exists, generating one if the store is empty.
///
/// Returns `true` if a new key pair was generated.
pub async fn ensure_active_key_pair(db: &Arc<Database>, config: &RetaileaseConfig) -> LicenseResult<bool> {
    if db.get_active_key_pair().await?.is_some() {
        return Ok(false);
    }

    warn!("no active signing key found, generating one ({}-bit RSA)", config.license.key_bits);
    let kp = KeyPair::generate("bootstrap", config.license.key_bits as usize)?;
    let row = KeyPairRow {
        id: kp.id,
        name: kp.name,
        private_key_pem: kp.private_key_pem,
        public_key_pem: kp.public_key_pem,
        is_active: kp.is_active,
        created_at: kp.created_at,
    };
    db.insert_key_pair(&row).await?;
    info!(key_pair_id = %row.id, "bootstrap signing key created");
    Ok(true)
}

#[cfg(test)]
mod tests {
    // `ensure_active_key_pair` needs a live Database pool to exercise, so its
    // coverage lives in the integration suite alongside the other
    // database-backed components.
}
