//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use serde_json::{Value, json};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout pipeline error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Checkout(err) => checkout_status(err),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::Validation(_) => StatusCode::BAD_REQUEST,
        CheckoutError::NotFound(_) => StatusCode::NOT_FOUND,
        CheckoutError::InsufficientStock { .. } => StatusCode::CONFLICT,
        CheckoutError::CustomerBlocked => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::counter!("api_errors_total", "status" => status.as_str().to_string()).increment(1);
        let body = match self {
            ApiError::NotFound(msg) => error_body("not_found", msg),
            ApiError::BadRequest(msg) => error_body("validation_error", msg),
            ApiError::Checkout(err) => checkout_body(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                error_body("internal_error", "internal server error")
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

fn error_body(kind: &str, message: impl Into<String>) -> Value {
    json!({ "kind": kind, "error": message.into() })
}

fn checkout_body(err: CheckoutError) -> Value {
    let kind = err.kind();
    let message = err.to_string();
    match err {
        CheckoutError::InsufficientStock {
            product_id,
            available,
            requested,
        } => json!({
            "kind": kind,
            "error": message,
            "productId": product_id,
            "available": available,
            "requested": requested,
        }),
        err if checkout_status(&err) == StatusCode::INTERNAL_SERVER_ERROR => {
            tracing::error!(error = %err, "checkout failed");
            error_body(kind, "internal server error")
        }
        _ => error_body(kind, message),
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use common::DocumentId;

    use super::*;

    async fn body_of(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_conflict_with_details() {
        let product_id = DocumentId::new();
        let (status, body) = body_of(ApiError::from(CheckoutError::InsufficientStock {
            product_id,
            available: 2,
            requested: 5,
        }))
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "insufficient_stock");
        assert_eq!(body["available"], 2);
        assert_eq!(body["requested"], 5);
        assert_eq!(body["productId"], product_id.to_string());
    }

    #[test]
    fn test_taxonomy_statuses() {
        let cases = [
            (CheckoutError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (CheckoutError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (CheckoutError::CustomerBlocked, StatusCode::FORBIDDEN),
            (
                CheckoutError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[tokio::test]
    async fn test_internal_details_are_not_exposed() {
        let (status, body) = body_of(ApiError::from(CheckoutError::Store(
            StoreError::Unavailable("orders".into()),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["kind"], "internal_error");
        assert_eq!(body["error"], "internal server error");
    }
}
