//! Standardized API error responses for every RetailEase licensing endpoint.
//!
//! # Response Format
//!
//! ```json
//! {
//!   "error": {
//!     "code": "LICENSE_NOT_FOUND",
//!     "message": "The requested license does not exist",
//!     "details": null
//!   }
//! }
//! ```
//!
//! The `details` field is optional and may carry additional context (e.g.
//! which field failed validation).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::errors::LicenseError;

/// Machine-readable error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // === License state (4xx) ===
    LicenseNotFound,
    Expired,
    Revoked,
    Suspended,
    NotYetValid,
    MalformedCode,

    // === Activation (4xx) ===
    MaxActivations,
    DeviceDeactivated,
    ActivationNotFound,

    // === Tenant (4xx) ===
    BusinessNotFound,
    CounterNotFound,

    // === Backup (4xx) ===
    BackupNotFound,
    NoFile,
    ChecksumMismatch,
    PayloadTooLarge,
    UploadError,

    // === Validation (400) ===
    InvalidRequest,
    MissingParams,

    // === Auth (401/403) ===
    AuthRequired,
    InvalidToken,
    TokenExpired,
    Unauthorized,

    // === Resource (404) ===
    NotFound,

    // === Server (5xx) ===
    ServerError,
    ConfigError,
    CryptoError,
    NetworkError,
    NoActiveKey,
    InternalError,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequest | ErrorCode::MissingParams => StatusCode::BAD_REQUEST,

            ErrorCode::AuthRequired | ErrorCode::InvalidToken | ErrorCode::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }

            ErrorCode::Expired
            | ErrorCode::Revoked
            | ErrorCode::Suspended
            | ErrorCode::NotYetValid
            | ErrorCode::MaxActivations
            | ErrorCode::DeviceDeactivated
            | ErrorCode::Unauthorized => StatusCode::FORBIDDEN,

            ErrorCode::LicenseNotFound
            | ErrorCode::ActivationNotFound
            | ErrorCode::BusinessNotFound
            | ErrorCode::CounterNotFound
            | ErrorCode::BackupNotFound
            | ErrorCode::NotFound => StatusCode::NOT_FOUND,

            ErrorCode::ChecksumMismatch | ErrorCode::MalformedCode => StatusCode::CONFLICT,

            ErrorCode::NoFile => StatusCode::BAD_REQUEST,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::UploadError => StatusCode::UNPROCESSABLE_ENTITY,

            ErrorCode::ServerError
            | ErrorCode::ConfigError
            | ErrorCode::CryptoError
            | ErrorCode::NoActiveKey
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,

            ErrorCode::NetworkError => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::LicenseNotFound => "The requested license does not exist",
            ErrorCode::Expired => "License has expired",
            ErrorCode::Revoked => "License has been revoked",
            ErrorCode::Suspended => "License is temporarily suspended",
            ErrorCode::NotYetValid => "License is not yet valid",
            ErrorCode::MalformedCode => "License code is malformed",
            ErrorCode::MaxActivations => "Maximum number of activations reached",
            ErrorCode::DeviceDeactivated => "This device has been deactivated",
            ErrorCode::ActivationNotFound => "Activation not found",
            ErrorCode::BusinessNotFound => "Business not found",
            ErrorCode::CounterNotFound => "Counter not found",
            ErrorCode::BackupNotFound => "Backup not found",
            ErrorCode::NoFile => "No file was provided",
            ErrorCode::ChecksumMismatch => "Uploaded file checksum does not match",
            ErrorCode::PayloadTooLarge => "Upload exceeds the maximum allowed size",
            ErrorCode::UploadError => "Backup upload could not be processed",
            ErrorCode::InvalidRequest => "Request payload is invalid",
            ErrorCode::MissingParams => "A required parameter is missing",
            ErrorCode::AuthRequired => "Authentication is required",
            ErrorCode::InvalidToken => "Authentication token is invalid",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::Unauthorized => "Not authorized for this operation",
            ErrorCode::NotFound => "The requested resource was not found",
            ErrorCode::ServerError => "An internal server error occurred",
            ErrorCode::ConfigError => "Server configuration error",
            ErrorCode::CryptoError => "Cryptographic operation failed",
            ErrorCode::NetworkError => "Failed to communicate with an external service",
            ErrorCode::NoActiveKey => "No active signing key is configured",
            ErrorCode::InternalError => "An unexpected error occurred",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ApiError {
    pub error: ErrorBody,
}

impl ApiError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: code.default_message().to_string(),
                details: None,
            },
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn missing_param(name: &str) -> Self {
        Self::with_details(
            ErrorCode::MissingParams,
            format!("required parameter '{name}' is missing"),
            serde_json::json!({ "field": name }),
        )
    }

    pub fn status_code(&self) -> StatusCode {
        self.error.code.status_code()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error.code.default_message(), self.error.message)
    }
}

impl std::error::Error for ApiError {}

impl From<LicenseError> for ApiError {
    fn from(err: LicenseError) -> Self {
        let code = match &err {
            LicenseError::LicenseNotFound => ErrorCode::LicenseNotFound,
            LicenseError::Expired => ErrorCode::Expired,
            LicenseError::Revoked => ErrorCode::Revoked,
            LicenseError::Suspended => ErrorCode::Suspended,
            LicenseError::NotYetValid => ErrorCode::NotYetValid,
            LicenseError::MalformedCode(_) | LicenseError::InvalidLicense(_) => ErrorCode::MalformedCode,
            LicenseError::MaxActivations => ErrorCode::MaxActivations,
            LicenseError::DeviceDeactivated => ErrorCode::DeviceDeactivated,
            LicenseError::ActivationNotFound => ErrorCode::ActivationNotFound,
            LicenseError::BusinessNotFound => ErrorCode::BusinessNotFound,
            LicenseError::CounterNotFound => ErrorCode::CounterNotFound,
            LicenseError::BackupNotFound => ErrorCode::BackupNotFound,
            LicenseError::NoFile => ErrorCode::NoFile,
            LicenseError::ChecksumMismatch => ErrorCode::ChecksumMismatch,
            LicenseError::UploadError(_) => ErrorCode::UploadError,
            LicenseError::PayloadTooLarge => ErrorCode::PayloadTooLarge,
            LicenseError::AuthRequired => ErrorCode::AuthRequired,
            LicenseError::InvalidToken => ErrorCode::InvalidToken,
            LicenseError::TokenExpired => ErrorCode::TokenExpired,
            LicenseError::Unauthorized(_) => ErrorCode::Unauthorized,
            LicenseError::NoActiveKey => ErrorCode::NoActiveKey,
            LicenseError::MissingParams(_) => ErrorCode::MissingParams,
            LicenseError::ConfigError(_) => ErrorCode::ConfigError,
            LicenseError::NetworkError(_) => ErrorCode::NetworkError,
            LicenseError::StorageError(_) | LicenseError::ServerError(_) => ErrorCode::ServerError,
            LicenseError::EncryptionError(_) | LicenseError::DecryptionError(_) | LicenseError::KeyringError(_) => {
                ErrorCode::CryptoError
            }
            LicenseError::UnknownError => ErrorCode::InternalError,
        };
        ApiError::with_message(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_status_mapping() {
        assert_eq!(ErrorCode::LicenseNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::InvalidRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::AuthRequired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Expired.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::ServerError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn api_error_serialization() {
        let err = ApiError::new(ErrorCode::LicenseNotFound);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("LICENSE_NOT_FOUND"));
        assert!(json.contains("message"));
    }

    #[test]
    fn license_error_conversion_preserves_code() {
        let api_err: ApiError = LicenseError::Revoked.into();
        assert_eq!(api_err.error.code, ErrorCode::Revoked);
    }

    #[test]
    fn missing_param_carries_field_detail() {
        let err = ApiError::missing_param("machine_id");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("machine_id"));
    }
}
