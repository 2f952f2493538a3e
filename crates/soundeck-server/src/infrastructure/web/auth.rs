//! Shared-credential authentication for HTTP routes and the session endpoint.
//!
//! A client presents the credential either as `Authorization: Bearer <token>`
//! or, for WebSocket clients that cannot set headers, as `?token=<token>`.
//! The header wins when both are present.  Comparison runs in time
//! independent of where the first differing byte is.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use thiserror::Error;

/// Why a request was not authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing credential")]
    Missing,
    #[error("invalid credential")]
    Invalid,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut response = (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "detail": self.to_string() })),
        )
            .into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        response
    }
}

/// Query string carrying the credential.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Picks the credential a request presents, if any.
pub fn presented_credential<'a>(headers: &'a HeaderMap, query: &'a TokenQuery) -> Option<&'a str> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    from_header.or_else(|| query.token.as_deref().filter(|t| !t.is_empty()))
}

/// Checks a presented credential against the stored one.
///
/// With no stored credential every request is rejected.
///
/// # Errors
///
/// [`AuthError::Missing`] or [`AuthError::Invalid`].
pub fn verify(expected: Option<&str>, presented: Option<&str>) -> Result<(), AuthError> {
    let presented = presented.ok_or(AuthError::Missing)?;
    match expected {
        Some(expected) if constant_time_eq(expected.as_bytes(), presented.as_bytes()) => Ok(()),
        _ => Err(AuthError::Invalid),
    }
}

/// Byte equality whose running time depends only on the lengths.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
