use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use roster_db::is_unique_violation;
use roster_paging::PageError;
use roster_types::api::ErrorResponse;

/// Every way a handler can fail, rendered as `{ "error": true, "message" }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("invalid credentials")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Page(e) => match e {
                PageError::InvalidCursor(_) | PageError::InvalidPageSize(_) => {
                    StatusCode::BAD_REQUEST
                }
                PageError::NoMoreResults => StatusCode::NOT_FOUND,
                PageError::StoreTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                PageError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Page(PageError::NoMoreResults) => "there are no more records".into(),
            Self::Page(PageError::StoreTimeout(_)) => "timed out reading records".into(),
            Self::Page(PageError::StoreUnavailable(_)) => "could not read records".into(),
            // Details stay in the log.
            Self::Internal(_) => "internal error".into(),
            other => other.to_string(),
        }
    }

    /// Maps a UNIQUE violation to `Conflict(message)`, anything else to `Internal`.
    pub fn conflict_on_unique(message: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |e| {
            if is_unique_violation(&e) {
                Self::Conflict(message)
            } else {
                Self::Internal(e)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(e) => error!("Internal error: {:#}", e),
            Self::Page(e @ (PageError::StoreTimeout(_) | PageError::StoreUnavailable(_))) => {
                error!("Listing failed: {}", e)
            }
            _ => {}
        }

        let status = self.status();
        let body = Json(ErrorResponse {
            error: true,
            message: self.message(),
        });

        if let Self::Unauthorized = self {
            return (
                status,
                [(header::WWW_AUTHENTICATE, r#"Basic realm="roster""#)],
                body,
            )
                .into_response();
        }
        (status, body).into_response()
    }
}
