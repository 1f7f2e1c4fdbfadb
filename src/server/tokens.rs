//! Opaque bearer-token authentication for token-gated routes.
//!
//! Tokens are 32 cryptographically random bytes, hex-encoded (64 chars) and
//! stored raw in the `api_tokens` table — they're already high-entropy
//! capability tokens, not passwords, so there's nothing to hash (contrast
//! `License.license_code`, which is a signed, independently-verifiable
//! artifact).

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use chrono::Utc;
use rand::RngCore;
use std::sync::Arc;
use tracing::warn;

use crate::errors::LicenseError;
use crate::server::api_error::ApiError;
use crate::server::database::{ApiToken, Database};

/// Generate a fresh 64-char lowercase hex token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub struct TokenAuthenticator {
    db: Arc<Database>,
}

impl TokenAuthenticator {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Get-or-create the token for a (license, counter) pair, re-enabling
    /// and regenerating bytes if the existing row had been logged out.
    pub async fn get_or_create(
        &self,
        license_id: &str,
        counter_id: Option<&str>,
    ) -> Result<String, LicenseError> {
        if let Some(mut existing) = self.db.get_token_by_license_counter(license_id, counter_id).await? {
            if !existing.is_active {
                existing.token = generate_token();
                existing.is_active = true;
                self.db.upsert_token(&existing).await?;
            }
            return Ok(existing.token);
        }

        let token = ApiToken {
            id: uuid::Uuid::new_v4().to_string(),
            token: generate_token(),
            license_id: license_id.to_string(),
            counter_id: counter_id.map(str::to_string),
            name: None,
            is_active: true,
            created_at: Utc::now().naive_utc(),
            last_used_at: None,
            expires_at: None,
        };
        self.db.upsert_token(&token).await?;
        Ok(token.token)
    }

    pub async fn authenticate(&self, raw_token: &str) -> Result<ApiToken, LicenseError> {
        let token = self
            .db
            .get_token(raw_token)
            .await?
            .ok_or(LicenseError::InvalidToken)?;

        let now = Utc::now().naive_utc();
        if !token.is_valid(now) {
            return Err(if token.is_active {
                LicenseError::TokenExpired
            } else {
                LicenseError::InvalidToken
            });
        }

        self.db.touch_token_last_used(raw_token).await?;
        Ok(token)
    }

    pub async fn logout(&self, raw_token: &str) -> Result<(), LicenseError> {
        let mut token = self
            .db
            .get_token(raw_token)
            .await?
            .ok_or(LicenseError::InvalidToken)?;
        token.is_active = false;
        self.db.upsert_token(&token).await?;
        Ok(())
    }
}

/// Axum extractor requiring a valid `Authorization: Bearer <token>` header.
///
/// Use in a handler signature: `async fn status(caller: AuthenticatedCaller, ...)`.
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller {
    pub token: ApiToken,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedCaller
where
    S: Send + Sync,
    Arc<Database>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .ok_or(LicenseError::AuthRequired)?
            .to_str()
            .map_err(|_| LicenseError::InvalidToken)?;

        let raw_token = header.strip_prefix("Bearer ").ok_or(LicenseError::InvalidToken)?;

        let db = Arc::<Database>::from_ref(state);
        let authenticator = TokenAuthenticator::new(db);
        match authenticator.authenticate(raw_token).await {
            Ok(token) => Ok(AuthenticatedCaller { token }),
            Err(e) => {
                warn!("token authentication failed: {e}");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_token_is_64_lowercase_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
    }

    #[test]
    fn api_token_is_valid_respects_active_flag_and_expiry() {
        let now = Utc::now().naive_utc();
        let mut token = ApiToken {
            id: "t1".into(),
            token: generate_token(),
            license_id: "lic_1".into(),
            counter_id: None,
            name: None,
            is_active: true,
            created_at: now,
            last_used_at: None,
            expires_at: None,
        };
        assert!(token.is_valid(now));

        token.is_active = false;
        assert!(!token.is_valid(now));

        token.is_active = true;
        token.expires_at = Some(now - chrono::Duration::minutes(1));
        assert!(!token.is_valid(now));
    }
}
