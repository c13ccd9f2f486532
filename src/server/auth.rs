//! User identity extraction from transport metadata.
//!
//! Commands and stream bindings carry the user id either as a `user` query
//! parameter (the WebSocket-friendly spot, like token-in-query auth) or an
//! `X-User` header. Missing or empty means `Unauthenticated`.

use axum::http::HeaderMap;

use crate::error::ExchangeError;

pub const USER_HEADER: &str = "x-user";

pub fn user_from_parts(query: Option<&str>, headers: &HeaderMap) -> Result<String, ExchangeError> {
    let from_query = query.and_then(|q| {
        q.split('&')
            .find(|pair| pair.starts_with("user="))
            .and_then(|pair| pair.split('=').nth(1))
            .map(|u| u.to_string())
    });

    let from_header = headers
        .get(USER_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|u| u.to_string());

    match from_query.or(from_header) {
        Some(user) if !user.is_empty() => Ok(user),
        _ => Err(ExchangeError::Unauthenticated),
    }
}
