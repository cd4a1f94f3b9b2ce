use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use std::collections::HashMap;

pub type Result<T, E = LoyaltyError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum LoyaltyError {
    /// Malformed input from the caller (missing phone, bad amount, ...).
    #[error("{0}")]
    InvalidRequest(String),

    /// Unknown, already consumed, or owned by someone else. Deliberately one variant.
    #[error("invalid or consumed code")]
    CodeRejected,

    /// An external collaborator was selected but never set up.
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    #[error("attestation service error: {0}")]
    Remote(#[from] reqwest::Error),

    #[error("attestation service returned {status}: {body}")]
    RemoteStatus { status: u16, body: String },
}

impl LoyaltyError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        LoyaltyError::InvalidRequest(msg.into())
    }
}

impl ResponseError for LoyaltyError {
    fn status_code(&self) -> StatusCode {
        match self {
            LoyaltyError::InvalidRequest(_) | LoyaltyError::CodeRejected => StatusCode::BAD_REQUEST,
            LoyaltyError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            LoyaltyError::Remote(_) | LoyaltyError::RemoteStatus { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(HashMap::from([("error", self.to_string())]))
    }
}
