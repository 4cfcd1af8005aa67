//! API-facing error handling for AssetDesk.
//!
//! This module provides:
//! - Stable, machine-readable error codes for API responses
//! - HTTP status code mapping
//! - User-facing messages kept apart from internal detail
//! - Logging by severity and an error counter
//!
//! Domain errors (`MatrixError`, `UnknownEntityType`, `FieldPermissionDenied`)
//! are defined next to the code that raises them and convert into
//! [`DeskError`] at the HTTP boundary.
//!
//! # Usage
//!
//! ```rust,ignore
//! use assetdesk_core::error::{DeskError, Result};
//!
//! async fn update_ticket(...) -> Result<Json<Record>> {
//!     let patch = policy.project_for_write(actor.role, EntityType::Ticket, body)?;
//!     ...
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

use crate::rbac::{FieldPermissionDenied, MatrixError, UnknownEntityType};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

pub type Result<T> = std::result::Result<T, DeskError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes for API responses.
///
/// These codes are stable; clients may branch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Access Control Errors (1000-1099)
    FieldPermissionDenied,
    UnknownEntityType,

    // Serialization Errors (2200-2299)
    SerializationError,
    DeserializationError,
    InvalidJson,

    // Authentication/Authorization (4000-4099)
    Unauthorized,
    Forbidden,
    InvalidToken,
    TokenExpired,

    // Validation Errors (4100-4199)
    ValidationError,
    RecordNotFound,

    // Configuration Errors (5000-5099)
    ConfigurationError,

    // Internal Errors (9000-9099)
    InternalError,
}

impl ErrorCode {
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::FieldPermissionDenied => 1000,
            Self::UnknownEntityType => 1001,

            Self::SerializationError => 2200,
            Self::DeserializationError => 2201,
            Self::InvalidJson => 2202,

            Self::Unauthorized => 4000,
            Self::Forbidden => 4001,
            Self::InvalidToken => 4002,
            Self::TokenExpired => 4003,

            Self::ValidationError => 4100,
            Self::RecordNotFound => 4102,

            Self::ConfigurationError => 5000,

            Self::InternalError => 9000,
        }
    }

    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::InvalidToken | Self::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden | Self::FieldPermissionDenied => StatusCode::FORBIDDEN,

            Self::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DeserializationError | Self::InvalidJson => StatusCode::BAD_REQUEST,
            Self::RecordNotFound => StatusCode::NOT_FOUND,

            // An unknown entity type is a caller bug, not a client mistake.
            Self::UnknownEntityType
            | Self::SerializationError
            | Self::ConfigurationError
            | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "access",
            2200..=2299 => "serialization",
            4000..=4099 => "authentication",
            4100..=4199 => "validation",
            5000..=5099 => "configuration",
            9000..=9099 => "internal",
            _ => "unknown",
        }
    }

    /// Wire name, as serialized.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FieldPermissionDenied => "FIELD_PERMISSION_DENIED",
            Self::UnknownEntityType => "UNKNOWN_ENTITY_TYPE",
            Self::SerializationError => "SERIALIZATION_ERROR",
            Self::DeserializationError => "DESERIALIZATION_ERROR",
            Self::InvalidJson => "INVALID_JSON",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Client errors (bad input, denied fields)
    Low,
    /// Authentication failures
    Medium,
    /// Bugs in calling code
    High,
    /// The process cannot serve correctly
    Critical,
}

impl ErrorSeverity {
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::FieldPermissionDenied
            | ErrorCode::ValidationError
            | ErrorCode::RecordNotFound
            | ErrorCode::DeserializationError
            | ErrorCode::InvalidJson => Self::Low,

            ErrorCode::Unauthorized
            | ErrorCode::Forbidden
            | ErrorCode::InvalidToken
            | ErrorCode::TokenExpired => Self::Medium,

            ErrorCode::UnknownEntityType
            | ErrorCode::SerializationError
            | ErrorCode::InternalError => Self::High,

            ErrorCode::ConfigurationError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Entity type the error refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Fields rejected by the permission matrix
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_empty() && self.entity_type.is_none() && self.fields.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The API-facing error type.
#[derive(Error, Debug)]
pub struct DeskError {
    /// Machine-readable error code
    code: ErrorCode,

    /// Message safe to expose to clients
    user_message: Cow<'static, str>,

    /// Detail for logs only
    internal_message: Option<String>,

    details: ErrorDetails,

    /// Correlates the response body with the `X-Request-ID` header
    request_id: Option<String>,

    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for DeskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl DeskError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            request_id: None,
            source: None,
        };
        error.record_metrics();
        error
    }

    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Internal error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::InternalError,
            "An internal error occurred",
            message,
        )
    }

    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let entity_type = entity_type.into();
        let entity_id = entity_id.into();
        Self::new(
            ErrorCode::RecordNotFound,
            format!("{} not found: {}", entity_type, entity_id),
        )
        .with_details(
            ErrorDetails::new()
                .with_entity(entity_type)
                .with_context("id", entity_id),
        )
    }

    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::with_internal(
            ErrorCode::ConfigurationError,
            "Access control is misconfigured",
            message,
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    /// Attach the request ID. Empty IDs are ignored.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        if !request_id.is_empty() {
            self.request_id = Some(request_id);
        }
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.as_str();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    request_id = ?self.request_id,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    details = ?self.details,
                    "Low severity error"
                );
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metrics
    // ─────────────────────────────────────────────────────────────────────────

    fn record_metrics(&self) {
        counter!(
            "assetdesk_errors_total",
            "code" => self.code.as_str(),
            "category" => self.code.category(),
            "severity" => format!("{:?}", self.severity()).to_lowercase(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error response for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false for errors
    pub success: bool,

    pub error: ErrorInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,

    pub numeric_code: u32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,

    /// Request ID for tracking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&DeskError> for ErrorResponse {
    fn from(error: &DeskError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                message: error.user_message.to_string(),
                details: if error.details.is_empty() {
                    None
                } else {
                    Some(error.details.clone())
                },
                request_id: error.request_id.clone(),
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Integration
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for DeskError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════════════════

impl From<FieldPermissionDenied> for DeskError {
    fn from(denied: FieldPermissionDenied) -> Self {
        counter!(
            "assetdesk_field_denials_total",
            "role" => denied.role.as_str(),
            "entity" => denied.entity.as_str(),
        )
        .increment(1);

        Self::new(ErrorCode::FieldPermissionDenied, denied.user_message()).with_details(
            ErrorDetails::new()
                .with_entity(denied.entity.as_str())
                .with_fields(denied.fields.clone()),
        )
    }
}

impl From<UnknownEntityType> for DeskError {
    fn from(error: UnknownEntityType) -> Self {
        Self::with_internal(
            ErrorCode::UnknownEntityType,
            "An internal error occurred",
            error.to_string(),
        )
        .with_source(error)
    }
}

impl From<MatrixError> for DeskError {
    fn from(error: MatrixError) -> Self {
        Self::configuration(error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for DeskError {
    fn from(error: serde_json::Error) -> Self {
        let code = if error.is_syntax() || error.is_data() {
            ErrorCode::DeserializationError
        } else if error.is_eof() {
            ErrorCode::InvalidJson
        } else {
            ErrorCode::SerializationError
        };

        Self::with_internal(code, "Failed to process JSON data", error.to_string())
            .with_source(error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
