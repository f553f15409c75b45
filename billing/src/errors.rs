use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Faults the subscription flow does not recover from.
///
/// Gateway rejections (a response carrying `errors`) are not represented
/// here; they travel as data inside [`crate::SubscriptionOutcome`].
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Gateway error: {0}")]
    Gateway(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, BillingError>;

impl BillingError {
    fn label(&self) -> &'static str {
        match self {
            BillingError::InternalError(_) => "Internal server error",
            BillingError::BadRequest(_) => "Bad request",
            BillingError::NotFound(_) => "Not found",
            BillingError::DatabaseError(_) => "Database error",
            BillingError::Transport(_) | BillingError::Gateway(_) => "Payment processing error",
            BillingError::Config(_) => "Configuration error",
            BillingError::ValidationError(_) => "Validation error",
        }
    }
}

impl ResponseError for BillingError {
    fn status_code(&self) -> StatusCode {
        match self {
            BillingError::BadRequest(_) | BillingError::ValidationError(_) => {
                StatusCode::BAD_REQUEST
            }
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::Transport(_) | BillingError::Gateway(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.label(),
            "message": self.to_string()
        }))
    }
}
