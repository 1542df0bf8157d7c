// SPDX-License-Identifier: MIT
//! Crate-wide error taxonomy.
//!
//! Domain errors are returned as values up to the request pipeline, which
//! converts them into JSON error responses. Anything wrapped in `Internal`
//! is logged with its full error chain server-side; the client only ever
//! sees a generic message for those.

use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad input: invalid draft, out-of-range points, malformed geometry.
    #[error("{0}")]
    Validation(String),

    /// Permission denial: requester is not a member / not the assignee.
    #[error("{0}")]
    Authorization(String),

    /// Missing, malformed or cryptographically invalid bearer token.
    /// The message is fixed so probing clients learn nothing about why
    /// verification failed.
    #[error("no valid authentication token found")]
    Authentication,

    /// Unknown task or project.
    #[error("{0} not found")]
    NotFound(String),

    /// Storage failure, commit failure or any other unexpected fault.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::Internal(anyhow::anyhow!(msg.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Authorization(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the client. Internal faults are masked.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Authorization("denied".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Authentication.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::NotFound("task 1".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::internal("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_message_is_masked() {
        let err = ApiError::internal("connection pool exhausted");
        assert_eq!(err.public_message(), "internal server error");
    }

    #[test]
    fn test_not_found_message() {
        let err = ApiError::NotFound("task abc".into());
        assert_eq!(err.public_message(), "task abc not found");
    }

    #[test]
    fn test_authentication_message_is_fixed() {
        assert_eq!(
            ApiError::Authentication.public_message(),
            "no valid authentication token found"
        );
    }
}
