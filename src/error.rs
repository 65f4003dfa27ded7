//! Request-level error taxonomy and its HTTP mapping.
//!
//! Every fallible store and handler returns [`Error`]; the status code and
//! JSON body are decided in one place (`impl IntoResponse`). Internal causes
//! are logged server-side and never serialized into a response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request payload failed validation. The message is safe to show
    /// to the caller.
    #[error("{0}")]
    InvalidInput(String),

    /// Username or email collided with an existing account. Which of the
    /// two collided is deliberately not reported.
    #[error("username or email already in use")]
    DuplicateIdentity,

    /// Unknown identifier or wrong password — the two cases share one
    /// message and one status. Stays 400: the web client treats 401 as
    /// "session expired", not "login failed".
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed, tampered, or expired bearer token, or the
    /// token's account no longer exists.
    #[error("authentication required")]
    Unauthenticated,

    /// Storage or crypto failure. The client sees a generic body.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidInput(_) | Error::DuplicateIdentity | Error::InvalidCredentials => {
                StatusCode::BAD_REQUEST
            }
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            Error::Internal(err) => {
                tracing::error!("internal error: {err:#}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
