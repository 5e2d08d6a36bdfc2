//! Gateway-wide error taxonomy.
//!
//! A single [`GatewayError`] enum realizes every error kind from the
//! error-handling design: it self-logs at construction the same way
//! [`crate::error::LlmError`] does, and implements axum's `IntoResponse`
//! to serialize the `{error: {message, type, code, details?}}` envelope.

use crate::logging::{log_error, log_warn};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        retry_after_secs: u64,
        limit: u32,
        remaining: u32,
        reset_at: i64,
    },

    #[error("quota exceeded")]
    QuotaExceeded { limit: u64, reset_at: i64 },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("upstream provider error: {message}")]
    ProviderError { message: String, status: u16 },

    #[error("upstream provider timed out")]
    ProviderTimeout,

    #[error("upstream provider rate limited")]
    ProviderRateLimited { retry_after_secs: Option<u64> },

    #[error("upstream unreachable: {message}")]
    UpstreamUnreachable { message: String },

    #[error("bad upstream response: {message}")]
    BadUpstreamResponse { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(error_type = "unauthorized", message = %message, "request rejected");
        Self::Unauthorized { message }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(error_type = "invalid_request", message = %message, "request failed validation");
        Self::InvalidRequest { message }
    }

    pub fn rate_limited(retry_after_secs: u64, limit: u32, remaining: u32, reset_at: i64) -> Self {
        log_warn!(
            error_type = "rate_limited",
            retry_after_secs,
            limit,
            remaining,
            "request rate limited"
        );
        Self::RateLimited {
            retry_after_secs,
            limit,
            remaining,
            reset_at,
        }
    }

    pub fn quota_exceeded(limit: u64, reset_at: i64) -> Self {
        log_warn!(error_type = "quota_exceeded", limit, "monthly quota exceeded");
        Self::QuotaExceeded { limit, reset_at }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn provider_error(message: impl Into<String>, status: u16) -> Self {
        let message = message.into();
        log_error!(error_type = "provider_error", status, message = %message, "upstream provider returned an error");
        Self::ProviderError { message, status }
    }

    pub fn upstream_unreachable(message: impl Into<String>) -> Self {
        let message = message.into();
        log_error!(error_type = "upstream_unreachable", message = %message, "upstream provider unreachable");
        Self::UpstreamUnreachable { message }
    }

    pub fn bad_upstream_response(message: impl Into<String>) -> Self {
        let message = message.into();
        log_error!(error_type = "bad_upstream_response", message = %message, "upstream response could not be parsed");
        Self::BadUpstreamResponse { message }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        log_error!(error_type = "internal", message = %message, "internal gateway error");
        Self::Internal { message }
    }

    /// Machine-readable error type string for the response envelope.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::Forbidden { .. } => "forbidden",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::RateLimited { .. } => "rate_limited",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::NotFound { .. } => "not_found",
            Self::ProviderError { .. } => "provider_error",
            Self::ProviderTimeout => "provider_timeout",
            Self::ProviderRateLimited { .. } => "provider_rate_limited",
            Self::UpstreamUnreachable { .. } => "upstream_unreachable",
            Self::BadUpstreamResponse { .. } => "bad_upstream_response",
            Self::Internal { .. } => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::ProviderError { .. } => StatusCode::BAD_GATEWAY,
            Self::ProviderTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::ProviderRateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamUnreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadUpstreamResponse { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::RateLimited {
                limit,
                remaining,
                reset_at,
                retry_after_secs,
            } => Some(serde_json::json!({
                "limit": limit,
                "remaining": remaining,
                "resetAt": reset_at,
                "retryAfter": retry_after_secs,
            })),
            Self::QuotaExceeded { limit, reset_at } => Some(serde_json::json!({
                "limit": limit,
                "resetAt": reset_at,
            })),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorEnvelope,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    message: String,
    #[serde(rename = "type")]
    error_type: &'static str,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> AxumResponse {
        let status = self.status_code();
        let body = ErrorBody {
            error: ErrorEnvelope {
                message: self.to_string(),
                error_type: self.error_type(),
                code: status.as_u16(),
                details: self.details(),
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Self::RateLimited {
            retry_after_secs, ..
        } = &self
        {
            if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

impl From<crate::error::LlmError> for GatewayError {
    fn from(err: crate::error::LlmError) -> Self {
        use crate::error::LlmError;
        match err {
            LlmError::RateLimitExceeded {
                retry_after_seconds,
            } => Self::ProviderRateLimited {
                retry_after_secs: Some(retry_after_seconds),
            },
            LlmError::Timeout { .. } => Self::ProviderTimeout,
            LlmError::RequestFailed { message, .. } => Self::upstream_unreachable(message),
            LlmError::ResponseParsingError { message } => Self::bad_upstream_response(message),
            LlmError::AuthenticationFailed { message } => Self::provider_error(message, 401),
            other => Self::provider_error(other.to_string(), 502),
        }
    }
}
