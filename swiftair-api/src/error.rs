use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use swiftair_core::StoreError;
use swiftair_ledger::LedgerError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    AuthenticationError(String),

    #[error("{0}")]
    AuthorizationError(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    NotFoundError(String),

    #[error("{0}")]
    ConflictError(String),

    #[error("Insufficient balance")]
    InsufficientFunds { required: i64, balance: i64 },

    #[error("Not enough seats. Only {available} available.")]
    InsufficientSeats { available: i32 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::AuthenticationError(msg) => {
                (StatusCode::UNAUTHORIZED, json!({ "error": msg }))
            }
            ApiError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::NotFoundError(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::ConflictError(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            ApiError::InsufficientFunds { required, balance } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Insufficient balance",
                    "required": required,
                    "balance": balance,
                }),
            ),
            ApiError::InsufficientSeats { available } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": format!("Not enough seats. Only {available} available."),
                    "available": available,
                }),
            ),
            ApiError::Internal(err) => {
                tracing::error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Validation(msg) => ApiError::ValidationError(msg),
            LedgerError::Forbidden(msg) => ApiError::AuthorizationError(msg),
            LedgerError::FlightNotFound => ApiError::NotFoundError("Flight not found".to_string()),
            LedgerError::BookingNotFound => {
                ApiError::NotFoundError("Booking not found".to_string())
            }
            LedgerError::UserNotFound => ApiError::NotFoundError("User not found".to_string()),
            LedgerError::InsufficientFunds { required, balance } => {
                ApiError::InsufficientFunds { required, balance }
            }
            LedgerError::InsufficientSeats { available } => {
                ApiError::InsufficientSeats { available }
            }
            LedgerError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFoundError("Not found".to_string()),
            StoreError::Conflict => {
                ApiError::ConflictError("Concurrent update conflict, please retry".to_string())
            }
            StoreError::Duplicate(what) => ApiError::ConflictError(format!("{what} already exists")),
            StoreError::Backend(msg) => ApiError::Internal(anyhow::anyhow!(msg)),
        }
    }
}
