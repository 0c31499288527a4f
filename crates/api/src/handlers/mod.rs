pub mod admin;
pub mod metrics;
pub mod redirect;
pub mod reveal;

pub use admin::{
    admin_stats_handler, list_config_handler, update_config_handler, verify_provider_handler,
};
pub use metrics::metrics_handler;
pub use redirect::redirect_handler;
pub use reveal::reveal_contact_handler;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use fixit_domain::model::{ConfigKeyError, ProviderIdError};
use fixit_domain::services::{AuthError, SettlementError};
use fixit_domain::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Internal(&'static str),
}

impl From<ProviderIdError> for ApiError {
    fn from(err: ProviderIdError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ConfigKeyError> for ApiError {
    fn from(err: ConfigKeyError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl ApiError {
    /// Client-facing message. Server-side failures stay generic; their detail
    /// goes to the log only.
    fn public_message(&self) -> String {
        match self {
            ApiError::BadRequest(message) => message.clone(),
            ApiError::NotFound(message) => (*message).into(),
            ApiError::Auth(err) => err.to_string(),
            ApiError::Settlement(SettlementError::NotFound) => "Provider not found".into(),
            ApiError::Settlement(SettlementError::InsufficientBalance { .. }) => {
                "Insufficient Balance".into()
            }
            ApiError::Settlement(SettlementError::ConcurrencyConflict) => {
                "Transaction Conflict".into()
            }
            ApiError::Settlement(SettlementError::OutcomeUnknown { .. }) => {
                "Charge outcome unknown, check the balance before retrying".into()
            }
            ApiError::Settlement(_) | ApiError::Storage(_) | ApiError::Internal(_) => {
                "Internal Server Error".into()
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Auth(AuthError::Forbidden(_)) => StatusCode::FORBIDDEN,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Settlement(err) => match err {
                SettlementError::NotFound => StatusCode::NOT_FOUND,
                SettlementError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
                SettlementError::ConcurrencyConflict => StatusCode::CONFLICT,
                SettlementError::OutcomeUnknown { .. } => StatusCode::GATEWAY_TIMEOUT,
                SettlementError::InvalidCost(_)
                | SettlementError::Timeout { .. }
                | SettlementError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }
        HttpResponse::build(status).json(ErrorBody {
            error: self.public_message(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
