//! `AuthUser` extractor: validates the caller's JWT access token.

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::Deserialize;

use beacon_core::error::AppError;

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Token subject; presence and direct delivery key on it.
    pub user_id: String,
    /// Display name.
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Bearer token from the `Authorization` header, else the `token` query
/// parameter. Browsers cannot set headers on a WebSocket upgrade.
fn bearer_token(parts: &Parts) -> Result<String, AppError> {
    if let Some(header) = parts.headers.get(AUTHORIZATION) {
        let value = header
            .to_str()
            .map_err(|_| AppError::unauthorized("Invalid Authorization header"))?;
        return value
            .strip_prefix("Bearer ")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("Invalid Authorization header format"));
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing access token"))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.jwt_decoder.decode_access_token(&token)?;

        Ok(AuthUser {
            user_id: claims.sub,
            username: claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_header_wins_over_query() {
        let p = parts(
            Request::get("/ws/html?token=from-query").header(AUTHORIZATION, "Bearer from-header"),
        );
        assert_eq!(bearer_token(&p).unwrap(), "from-header");
    }

    #[test]
    fn test_query_fallback() {
        let p = parts(Request::get("/ws/html?client_id=c1&token=abc"));
        assert_eq!(bearer_token(&p).unwrap(), "abc");
    }

    #[test]
    fn test_missing_or_malformed() {
        assert!(bearer_token(&parts(Request::get("/presence"))).is_err());
        let p = parts(Request::get("/presence").header(AUTHORIZATION, "Basic abc"));
        assert_eq!(bearer_token(&p).unwrap_err().code(), "UNAUTHORIZED");
    }
}
