use crate::domain::payment::{ErrorEnvelope, ErrorPayload};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Failure kinds surfaced by the orchestration core.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("signature error: {0}")]
    Signature(String),
    #[error("{0}")]
    Ledger(String),
    #[error("{0}")]
    InvalidSplit(String),
    #[error("payment failed, please call support team payment")]
    Exhausted,
    #[error("{0}")]
    Accepted(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::Validation(_) | PaymentError::InvalidSplit(_) => StatusCode::BAD_REQUEST,
            PaymentError::Auth(_) | PaymentError::Signature(_) => StatusCode::UNAUTHORIZED,
            PaymentError::Forbidden(_) => StatusCode::FORBIDDEN,
            PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::Gateway(_) => StatusCode::BAD_GATEWAY,
            PaymentError::Ledger(_) => StatusCode::PAYMENT_REQUIRED,
            PaymentError::Accepted(_) => StatusCode::ACCEPTED,
            PaymentError::Exhausted | PaymentError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::Validation(_) => "VALIDATION_ERROR",
            PaymentError::Auth(_) => "UNAUTHORIZED",
            PaymentError::Forbidden(_) => "FORBIDDEN",
            PaymentError::NotFound(_) => "NOT_FOUND",
            PaymentError::Gateway(_) => "GATEWAY_ERROR",
            PaymentError::Signature(_) => "SIGNATURE_ERROR",
            PaymentError::Ledger(_) => "INSUFFICIENT_BALANCE",
            PaymentError::InvalidSplit(_) => "INVALID_SPLIT",
            PaymentError::Exhausted => "PAYMENT_EXHAUSTED",
            PaymentError::Accepted(_) => "ACCEPTED",
            PaymentError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn into_response_parts(self) -> (StatusCode, ErrorEnvelope) {
        let status = self.status_code();
        let details = match &self {
            PaymentError::Gateway(inner) => Some(inner.kind().to_string()),
            _ => None,
        };
        (
            status,
            ErrorEnvelope {
                error: ErrorPayload {
                    code: self.code().to_string(),
                    message: self.to_string(),
                    details,
                },
            },
        )
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for PaymentError {
    fn from(e: anyhow::Error) -> Self {
        PaymentError::Internal(e.to_string())
    }
}

impl From<sqlx::Error> for PaymentError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => PaymentError::NotFound("record".to_string()),
            other => PaymentError::Internal(other.to_string()),
        }
    }
}

/// Per-attempt adapter failure. The orchestrator treats every variant as
/// "try the next configuration".
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("aggregator answered HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("aggregator call timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("aggregator rejected request with code {code}: {message}")]
    Rejected { code: String, message: String },
    #[error("malformed aggregator response: {0}")]
    Malformed(String),
    #[error("request signing failed: {0}")]
    Signature(String),
    #[error("status not recognized: {0}")]
    UnsupportedStatus(String),
}

impl GatewayError {
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Http { .. } => "HTTP",
            GatewayError::Timeout => "TIMEOUT",
            GatewayError::Transport(_) => "NETWORK_ERROR",
            GatewayError::Rejected { .. } => "REJECTED",
            GatewayError::Malformed(_) => "MALFORMED",
            GatewayError::Signature(_) => "SIGNATURE",
            GatewayError::UnsupportedStatus(_) => "UNSUPPORTED_STATUS",
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else if e.is_decode() {
            GatewayError::Malformed(e.to_string())
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Malformed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_are_payment_required() {
        let e = PaymentError::Ledger("balance is not enough".to_string());
        assert_eq!(e.status_code(), StatusCode::PAYMENT_REQUIRED);
        let (status, env) = e.into_response_parts();
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(env.error.code, "INSUFFICIENT_BALANCE");
    }

    #[test]
    fn exhausted_is_internal_with_support_message() {
        let (status, env) = PaymentError::Exhausted.into_response_parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(env.error.message, "payment failed, please call support team payment");
    }
}
