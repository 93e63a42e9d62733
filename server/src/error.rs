use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid {0}")]
    InvalidField(&'static str),

    #[error("Invalid OTP")]
    OtpMismatch,

    #[error("OTP not found or expired")]
    OtpNotFound,

    #[error("OTP expired")]
    OtpExpired,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Campaign not found")]
    CampaignNotFound,

    #[error("Comment not found")]
    CommentNotFound,

    #[error("Campaign counter document does not exist")]
    CounterMissing,

    #[error("Malformed {0} record")]
    MalformedRecord(&'static str),

    #[error("{0} is not configured")]
    FeatureDisabled(&'static str),

    #[error("Validation failed")]
    ModerationFailed,

    #[error("Storage error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("Failed to send OTP")]
    MailDispatch(#[from] lettre::transport::smtp::Error),

    #[error("Invalid email address")]
    MailAddress(#[from] lettre::address::AddressError),

    #[error("Failed to compose email")]
    MailCompose(#[from] lettre::error::Error),

    #[error("Search error: {0}")]
    Search(#[from] meilisearch_sdk::errors::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] serde_json::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MissingField(_)
            | AppError::InvalidField(_)
            | AppError::OtpMismatch
            | AppError::MailAddress(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::OtpNotFound | AppError::CampaignNotFound | AppError::CommentNotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::OtpExpired => StatusCode::GONE,
            AppError::FeatureDisabled(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::CounterMissing
            | AppError::MalformedRecord(_)
            | AppError::ModerationFailed
            | AppError::Store(_)
            | AppError::MailDispatch(_)
            | AppError::MailCompose(_)
            | AppError::Search(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("{self}");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
