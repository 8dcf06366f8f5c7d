//! Error types for the API.
//!
//! Every failure leaves the server as
//! `{"error": {"kind", "code", "message", "lineIndex"?}}`.
//!
//! ## Status Mapping
//! ```text
//! VALIDATION_ERROR      400
//! AUTHORIZATION_ERROR   403   (401 for UNAUTHENTICATED)
//! NOT_FOUND             404
//! INVENTORY_ERROR       409
//! PRICING_ERROR         422
//! SERVER_ERROR          500   (503 for CHECKOUT_TIMEOUT)
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tally_core::{CheckoutError, ErrorKind, ValidationError};
use tally_db::DbError;
use tracing::error;

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Shorthand for a `MALFORMED_REQUEST` validation failure.
    pub fn malformed(reason: impl Into<String>) -> Self {
        ApiError::Checkout(
            ValidationError::Malformed {
                reason: reason.into(),
            }
            .into(),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Checkout(e) => e.kind(),
            ApiError::Unauthenticated(_) => ErrorKind::Authorization,
            ApiError::OrderNotFound(_) => ErrorKind::NotFound,
            ApiError::Database(_) | ApiError::Internal(_) => ErrorKind::Server,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Checkout(e) => e.code(),
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Checkout(CheckoutError::Timeout { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            _ => match self.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Authorization => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Inventory => StatusCode::CONFLICT,
                ErrorKind::Pricing => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Server => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn line_index(&self) -> Option<usize> {
        match self {
            ApiError::Checkout(e) => e.line_index(),
            _ => None,
        }
    }

    /// Persistence details stay in the log.
    fn public_message(&self) -> String {
        match self {
            ApiError::Checkout(CheckoutError::Database(_)) | ApiError::Database(_) => {
                "a database error occurred, the request can be retried".to_string()
            }
            ApiError::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::malformed(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::malformed(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    kind: ErrorKind,
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    line_index: Option<usize>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                code: self.code(),
                message: self.public_message(),
                line_index: self.line_index(),
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{LineError, PricingError, Quantity};

    #[test]
    fn test_status_mapping() {
        let stock = ApiError::from(CheckoutError::at_line(
            2,
            LineError::InsufficientStock {
                product: "Cola".to_string(),
                available: Some(Quantity::from_units(1)),
                requested: Quantity::from_units(3),
            },
        ));
        assert_eq!(stock.status(), StatusCode::CONFLICT);
        assert_eq!(stock.line_index(), Some(2));

        let pricing = ApiError::from(CheckoutError::at_line(0, PricingError::AmountOverflow));
        assert_eq!(pricing.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let denied = ApiError::from(CheckoutError::AccessDenied {
            store_id: "s".to_string(),
            user_id: "u".to_string(),
        });
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        assert_eq!(
            ApiError::Unauthenticated("no token".to_string()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(CheckoutError::Timeout { timeout_ms: 10 }).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ApiError::malformed("bad json").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::malformed("bad json").code(), "MALFORMED_REQUEST");
    }

    #[test]
    fn test_database_details_are_not_exposed() {
        let err = ApiError::from(CheckoutError::Database("disk I/O error at page 7".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("page 7"));
    }
}
