//! Error taxonomy for the licensing service.
//!
//! Every fallible operation in this crate returns [`LicenseResult<T>`]. The
//! HTTP surface (`server::api_error`) maps each variant onto a JSON error
//! envelope and status code; callers that only care about the domain outcome
//! (e.g. background jobs) can match on the enum directly.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type LicenseResult<T> = Result<T, LicenseError>;

#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("invalid license: {0}")]
    InvalidLicense(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("encryption error: {0}")]
    EncryptionError(String),

    #[error("decryption error: {0}")]
    DecryptionError(String),

    #[error("keyring error: {0}")]
    KeyringError(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("unknown error")]
    UnknownError,

    #[error("license not found")]
    LicenseNotFound,

    #[error("license has been revoked")]
    Revoked,

    #[error("license is suspended")]
    Suspended,

    #[error("license has expired")]
    Expired,

    #[error("license is not yet valid")]
    NotYetValid,

    #[error("license code is malformed: {0}")]
    MalformedCode(String),

    #[error("maximum activations reached")]
    MaxActivations,

    #[error("device has been deactivated")]
    DeviceDeactivated,

    #[error("activation not found")]
    ActivationNotFound,

    #[error("business not found")]
    BusinessNotFound,

    #[error("counter not found")]
    CounterNotFound,

    #[error("backup not found")]
    BackupNotFound,

    #[error("no file provided")]
    NoFile,

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("upload error: {0}")]
    UploadError(String),

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("authentication required")]
    AuthRequired,

    #[error("invalid token")]
    InvalidToken,

    #[error("token has expired")]
    TokenExpired,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("no active signing key")]
    NoActiveKey,

    #[error("missing required parameter: {0}")]
    MissingParams(String),
}

impl LicenseError {
    /// Stable machine-readable code, independent of HTTP framing.
    pub fn code(&self) -> &'static str {
        match self {
            LicenseError::InvalidLicense(_) => "INVALID_LICENSE",
            LicenseError::ConfigError(_) => "CONFIG_ERROR",
            LicenseError::NetworkError(_) => "NETWORK_ERROR",
            LicenseError::StorageError(_) => "SERVER_ERROR",
            LicenseError::EncryptionError(_) | LicenseError::DecryptionError(_) => "CRYPTO_ERROR",
            LicenseError::KeyringError(_) => "CRYPTO_ERROR",
            LicenseError::ServerError(_) => "SERVER_ERROR",
            LicenseError::UnknownError => "SERVER_ERROR",
            LicenseError::LicenseNotFound => "LICENSE_NOT_FOUND",
            LicenseError::Revoked => "REVOKED",
            LicenseError::Suspended => "SUSPENDED",
            LicenseError::Expired => "EXPIRED",
            LicenseError::NotYetValid => "NOT_YET_VALID",
            LicenseError::MalformedCode(_) => "MALFORMED_CODE",
            LicenseError::MaxActivations => "MAX_ACTIVATIONS",
            LicenseError::DeviceDeactivated => "DEVICE_DEACTIVATED",
            LicenseError::ActivationNotFound => "ACTIVATION_NOT_FOUND",
            LicenseError::BusinessNotFound => "BUSINESS_NOT_FOUND",
            LicenseError::CounterNotFound => "COUNTER_NOT_FOUND",
            LicenseError::BackupNotFound => "BACKUP_NOT_FOUND",
            LicenseError::NoFile => "NO_FILE",
            LicenseError::ChecksumMismatch => "CHECKSUM_MISMATCH",
            LicenseError::UploadError(_) => "UPLOAD_ERROR",
            LicenseError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            LicenseError::AuthRequired => "AUTH_REQUIRED",
            LicenseError::InvalidToken => "INVALID_TOKEN",
            LicenseError::TokenExpired => "TOKEN_EXPIRED",
            LicenseError::Unauthorized(_) => "UNAUTHORIZED",
            LicenseError::NoActiveKey => "NO_ACTIVE_KEY",
            LicenseError::MissingParams(_) => "MISSING_PARAMS",
        }
    }
}

impl From<sqlx::Error> for LicenseError {
    fn from(err: sqlx::Error) -> Self {
        LicenseError::StorageError(err.to_string())
    }
}

impl From<std::io::Error> for LicenseError {
    fn from(err: std::io::Error) -> Self {
        LicenseError::StorageError(err.to_string())
    }
}

impl From<config::ConfigError> for LicenseError {
    fn from(err: config::ConfigError) -> Self {
        LicenseError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_stable_for_storage_variants() {
        assert_eq!(
            LicenseError::StorageError("x".into()).code(),
            "SERVER_ERROR"
        );
        assert_eq!(LicenseError::ServerError("x".into()).code(), "SERVER_ERROR");
    }

    #[test]
    fn code_distinguishes_license_states() {
        assert_eq!(LicenseError::Revoked.code(), "REVOKED");
        assert_eq!(LicenseError::Suspended.code(), "SUSPENDED");
        assert_eq!(LicenseError::Expired.code(), "EXPIRED");
    }

    #[test]
    fn sqlx_error_maps_to_storage_error() {
        let err: LicenseError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, LicenseError::StorageError(_)));
    }
}
