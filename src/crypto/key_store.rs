//! RSA key pair generation and PEM encoding.
//!
//! Private keys are PKCS8 PEM, public keys are SubjectPublicKeyInfo PEM —
//! the same encoding the license-issuing system this service replaces used,
//! so externally distributed public keys don't need to change shape.

use chrono::{NaiveDateTime, Utc};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::errors::{LicenseError, LicenseResult};

/// A generated (or loaded) RSA key pair used to sign license codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPair {
    pub id: String,
    pub name: String,
    /// PKCS8 PEM. Never serialized back out over the HTTP surface.
    pub private_key_pem: String,
    /// SubjectPublicKeyInfo PEM.
    pub public_key_pem: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl KeyPair {
    /// Generate a fresh RSA key pair of the given modulus size.
    ///
    /// 4096 bits is the default; anything below 2048 is rejected by
    /// `RetaileaseConfig::validate`, so this never has to guard against it.
    pub fn generate(name: impl Into<String>, bits: usize) -> LicenseResult<Self> {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| LicenseError::EncryptionError(format!("key generation failed: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_key_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| LicenseError::EncryptionError(format!("PEM encoding failed: {e}")))?
            .to_string();
        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| LicenseError::EncryptionError(format!("PEM encoding failed: {e}")))?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            private_key_pem,
            public_key_pem,
            is_active: true,
            created_at: Utc::now().naive_utc(),
        })
    }

    pub fn private_key(&self) -> LicenseResult<RsaPrivateKey> {
        RsaPrivateKey::from_pkcs8_pem(&self.private_key_pem)
            .map_err(|e| LicenseError::DecryptionError(format!("invalid private key PEM: {e}")))
    }

    pub fn public_key(&self) -> LicenseResult<RsaPublicKey> {
        RsaPublicKey::from_public_key_pem(&self.public_key_pem)
            .map_err(|e| LicenseError::DecryptionError(format!("invalid public key PEM: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_valid_pem_pair() {
        let kp = KeyPair::generate("test", 2048).expect("key generation");
        assert!(kp.private_key_pem.contains("PRIVATE KEY"));
        assert!(kp.public_key_pem.contains("PUBLIC KEY"));
        assert!(kp.is_active);
    }

    #[test]
    fn round_trips_through_pem() {
        let kp = KeyPair::generate("test", 2048).expect("key generation");
        let priv_key = kp.private_key().expect("parse private key");
        let pub_key = kp.public_key().expect("parse public key");
        assert_eq!(RsaPublicKey::from(&priv_key), pub_key);
    }
}
