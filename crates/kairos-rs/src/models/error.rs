//! Gateway-level error types.
//!
//! These map the error-kind table from the proxy's error handling design:
//! every variant below corresponds to a point where the director, transport,
//! or response modifier can fail. `GatewayError` backs the ambient
//! health/metrics/reload endpoints directly via [`actix_web::error::ResponseError`];
//! on the proxied request path itself, failures are turned into synthesized
//! HTML pages by [`crate::transport`] rather than surfaced as JSON, so most
//! variants here are consumed as plain `Display` values inside log lines and
//! only reach `error_response` when raised outside the proxy pipeline
//! (config loading, the management API).

use actix_web::HttpResponse;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no backend found for host {host}")]
    RouteNotFound { host: String },

    #[error("method {method} not allowed for host {host}")]
    MethodNotAllowed { method: String, host: String },

    #[error("backend {backend} is under maintenance")]
    Maintenance { backend: String },

    #[error("upstream error for backend {backend}: {message} (status {status:?})")]
    Upstream {
        backend: String,
        message: String,
        status: Option<u16>,
    },

    #[error("request to backend {backend} timed out after {timeout_ms}ms")]
    Timeout { backend: String, timeout_ms: u64 },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl actix_web::error::ResponseError for GatewayError {
    fn error_response(&self) -> HttpResponse {
        let error_message = self.to_string();
        match self {
            GatewayError::RouteNotFound { .. } => HttpResponse::ServiceUnavailable().json(json!({
                "error": error_message,
                "type": "route_not_found"
            })),
            GatewayError::MethodNotAllowed { .. } => {
                HttpResponse::MethodNotAllowed().json(json!({
                    "error": error_message,
                    "type": "method_not_allowed"
                }))
            }
            GatewayError::Maintenance { .. } => HttpResponse::ServiceUnavailable().json(json!({
                "error": error_message,
                "type": "maintenance"
            })),
            GatewayError::Upstream { .. } => HttpResponse::BadGateway().json(json!({
                "error": error_message,
                "type": "upstream"
            })),
            GatewayError::Timeout { .. } => HttpResponse::GatewayTimeout().json(json!({
                "error": error_message,
                "type": "timeout"
            })),
            GatewayError::Config { .. } => HttpResponse::BadRequest().json(json!({
                "error": error_message,
                "type": "config"
            })),
            GatewayError::Internal(_) => HttpResponse::InternalServerError().json(json!({
                "error": error_message,
                "type": "internal"
            })),
        }
    }
}
