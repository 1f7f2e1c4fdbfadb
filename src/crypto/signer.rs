//! License code signing and verification.
//!
//! Wire format (see `SPEC_FULL.md` §6.1):
//!
//! ```text
//! REP-<8 hex checksum>-<base64(envelope)>
//! envelope = {"p": base64(payload_json), "s": base64(signature), "v": 1}
//! payload_json = canonical JSON, sorted keys, no extra whitespace
//! signature = RSA-PSS over payload_json bytes, MGF1-SHA256, SHA-256, salt = PSS max length
//! ```
//!
//! The checksum prefix is advisory only — it lets a human or a log line
//! sanity-check a code at a glance, but verification never trusts it.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::{NaiveDateTime, Utc};
use rand::rngs::OsRng;
use rsa::pss::{SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{LicenseError, LicenseResult};

const ENVELOPE_VERSION: u8 = 1;
const CODE_PREFIX: &str = "REP";

/// The fields that go into a signed license code. Field order here is
/// cosmetic; serialization always re-sorts keys (see [`LicensePayload::canonical_json`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LicensePayload {
    pub lid: String,
    pub cname: String,
    pub cemail: String,
    pub ltype: String,
    pub vfrom: NaiveDateTime,
    pub vuntil: NaiveDateTime,
    pub maxact: u32,
    pub iat: NaiveDateTime,
}

impl LicensePayload {
    /// Compact JSON with lexicographically sorted keys — the exact bytes that get signed.
    fn canonical_json(&self) -> LicenseResult<String> {
        let value = serde_json::to_value(self)
            .map_err(|e| LicenseError::EncryptionError(format!("payload encoding failed: {e}")))?;
        let sorted = sort_json_keys(value);
        serde_json::to_string(&sorted)
            .map_err(|e| LicenseError::EncryptionError(format!("payload encoding failed: {e}")))
    }
}

fn sort_json_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            for k in keys {
                sorted.insert(k.clone(), sort_json_keys(map[&k].clone()));
            }
            serde_json::Value::Object(sorted)
        }
        other => other,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    p: String,
    s: String,
    v: u8,
}

/// The result of a successful [`LicenseVerifier::verify`] call: the decoded
/// payload, plus whether it currently falls inside its validity window.
#[derive(Debug, Clone)]
pub struct VerifiedLicense {
    pub payload: LicensePayload,
}

/// Maximum PSS salt length for a given key: `emLen - hLen - 2`.
fn max_salt_len(public_key: &RsaPublicKey) -> usize {
    let em_len = public_key.size();
    em_len.saturating_sub(32).saturating_sub(2)
}

pub struct LicenseSigner;

impl LicenseSigner {
    /// Sign a payload, producing the full `REP-...` transport string.
    pub fn sign(payload: &LicensePayload, private_key: &RsaPrivateKey) -> LicenseResult<String> {
        let payload_json = payload.canonical_json()?;
        let public_key = RsaPublicKey::from(private_key);
        let salt_len = max_salt_len(&public_key);

        let signing_key = SigningKey::<Sha256>::new_with_salt_len(private_key.clone(), salt_len);
        let mut rng = OsRng;
        let signature = signing_key.sign_with_rng(&mut rng, payload_json.as_bytes());

        let envelope = Envelope {
            p: B64.encode(payload_json.as_bytes()),
            s: B64.encode(signature.to_bytes()),
            v: ENVELOPE_VERSION,
        };

        let envelope_json = serde_json::to_string(&envelope)
            .map_err(|e| LicenseError::EncryptionError(format!("envelope encoding failed: {e}")))?;
        let envelope_b64 = B64.encode(envelope_json.as_bytes());

        let mut hasher = Sha256::new();
        hasher.update(envelope_b64.as_bytes());
        let checksum = hex::encode_upper(hasher.finalize());
        let checksum = &checksum[..8];

        Ok(format!("{CODE_PREFIX}-{checksum}-{envelope_b64}"))
    }
}

pub struct LicenseVerifier;

impl LicenseVerifier {
    /// Verify a `REP-...` code against a public key, returning the decoded payload.
    ///
    /// The checksum prefix (if present) is stripped but never consulted for
    /// correctness — only the signature determines validity.
    pub fn verify(code: &str, public_key: &RsaPublicKey) -> LicenseResult<VerifiedLicense> {
        let envelope_b64 = strip_prefix(code);

        let envelope_json = B64
            .decode(envelope_b64)
            .map_err(|e| LicenseError::MalformedCode(format!("invalid base64 envelope: {e}")))?;
        let envelope: Envelope = serde_json::from_slice(&envelope_json)
            .map_err(|e| LicenseError::MalformedCode(format!("invalid envelope JSON: {e}")))?;

        if envelope.v != ENVELOPE_VERSION {
            return Err(LicenseError::MalformedCode(format!(
                "unsupported envelope version {}",
                envelope.v
            )));
        }

        let payload_bytes = B64
            .decode(&envelope.p)
            .map_err(|e| LicenseError::MalformedCode(format!("invalid base64 payload: {e}")))?;
        let signature_bytes = B64
            .decode(&envelope.s)
            .map_err(|e| LicenseError::MalformedCode(format!("invalid base64 signature: {e}")))?;

        let salt_len = max_salt_len(public_key);
        let verifying_key = VerifyingKey::<Sha256>::new_with_salt_len(public_key.clone(), salt_len);
        let signature = rsa::pss::Signature::try_from(signature_bytes.as_slice())
            .map_err(|e| LicenseError::MalformedCode(format!("invalid signature encoding: {e}")))?;

        verifying_key
            .verify(&payload_bytes, &signature)
            .map_err(|_| LicenseError::InvalidLicense("signature verification failed".into()))?;

        let payload: LicensePayload = serde_json::from_slice(&payload_bytes)
            .map_err(|e| LicenseError::MalformedCode(format!("invalid payload JSON: {e}")))?;

        let now = Utc::now().naive_utc();
        if now < payload.vfrom {
            return Err(LicenseError::NotYetValid);
        }
        if now > payload.vuntil {
            return Err(LicenseError::Expired);
        }

        Ok(VerifiedLicense { payload })
    }
}

fn strip_prefix(code: &str) -> &str {
    let code = code.trim();
    if let Some(rest) = code.strip_prefix(&format!("{CODE_PREFIX}-")) {
        if let Some((_checksum, envelope)) = rest.split_once('-') {
            return envelope;
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key_store::KeyPair;
    use chrono::Duration;

    fn sample_payload() -> LicensePayload {
        let now = Utc::now().naive_utc();
        LicensePayload {
            lid: "lic_1".into(),
            cname: "Acme Retail".into(),
            cemail: "owner@acme.test".into(),
            ltype: "professional".into(),
            vfrom: now - Duration::days(1),
            vuntil: now + Duration::days(365),
            maxact: 3,
            iat: now,
        }
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let kp = KeyPair::generate("test", 2048).unwrap();
        let payload = sample_payload();
        let code = LicenseSigner::sign(&payload, &kp.private_key().unwrap()).unwrap();
        assert!(code.starts_with("REP-"));

        let verified = LicenseVerifier::verify(&code, &kp.public_key().unwrap()).unwrap();
        assert_eq!(verified.payload, payload);
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let kp = KeyPair::generate("test", 2048).unwrap();
        let other = KeyPair::generate("other", 2048).unwrap();
        let payload = sample_payload();
        let code = LicenseSigner::sign(&payload, &kp.private_key().unwrap()).unwrap();

        let result = LicenseVerifier::verify(&code, &other.public_key().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn verify_rejects_tampered_payload() {
        let kp = KeyPair::generate("test", 2048).unwrap();
        let payload = sample_payload();
        let mut code = LicenseSigner::sign(&payload, &kp.private_key().unwrap()).unwrap();
        let last = code.pop().unwrap();
        code.push(if last == 'A' { 'B' } else { 'A' });

        let result = LicenseVerifier::verify(&code, &kp.public_key().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn verify_rejects_expired_payload() {
        let kp = KeyPair::generate("test", 2048).unwrap();
        let mut payload = sample_payload();
        let now = Utc::now().naive_utc();
        payload.vfrom = now - Duration::days(400);
        payload.vuntil = now - Duration::days(1);
        let code = LicenseSigner::sign(&payload, &kp.private_key().unwrap()).unwrap();

        let result = LicenseVerifier::verify(&code, &kp.public_key().unwrap());
        assert!(matches!(result, Err(LicenseError::Expired)));
    }

    #[test]
    fn checksum_prefix_is_advisory_only() {
        let kp = KeyPair::generate("test", 2048).unwrap();
        let payload = sample_payload();
        let code = LicenseSigner::sign(&payload, &kp.private_key().unwrap()).unwrap();
        let parts: Vec<&str> = code.splitn(3, '-').collect();
        let mangled = format!("{}-{}-{}", parts[0], "00000000", parts[2]);

        // Wrong checksum does not affect verification — only the signature does.
        let result = LicenseVerifier::verify(&mangled, &kp.public_key().unwrap());
        assert!(result.is_ok());
    }
}
