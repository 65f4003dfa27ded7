//! Bearer-token guard for protected routes.

use crate::auth::store::Account;
use crate::error::{Error, Result};
use crate::gateway::AppState;
use axum::http::{header, HeaderMap};

/// Pull the token out of an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Resolve the request's bearer token to a live account.
///
/// Missing header, malformed token, bad signature, expiry, and a token whose
/// account no longer exists all collapse to `Unauthenticated`. Only store
/// failures stay `Internal`.
pub fn require_account(state: &AppState, headers: &HeaderMap) -> Result<Account> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(Error::Unauthenticated);
    };

    let claims = state.tokens.verify(token).map_err(|err| {
        tracing::debug!("token rejected: {err}");
        Error::Unauthenticated
    })?;

    match state.accounts.find_by_id(&claims.sub)? {
        Some(account) => Ok(account),
        None => Err(Error::Unauthenticated),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
