// src/auth/gate.rs
use super::{Claims, TokenError, TokenService};
use crate::error::ApiError;
use log::debug;
use std::sync::Arc;
use warp::http::header::{HeaderMap, AUTHORIZATION};
use warp::{Filter, Rejection};

const BEARER_PREFIX: &str = "Bearer ";

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix(BEARER_PREFIX)?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

pub fn authorize(tokens: &TokenService, header: Option<&str>) -> Result<Claims, ApiError> {
    let token = bearer_token(header).ok_or(ApiError::MissingToken)?;
    tokens.verify(token).map_err(|e| {
        match &e {
            TokenError::Expired => debug!("Rejected expired token"),
            other => debug!("Rejected token: {}", other),
        }
        ApiError::InvalidToken
    })
}

/// Guards a route: yields the verified claims or rejects before anything
/// downstream runs.
pub fn with_auth(
    tokens: Arc<TokenService>,
) -> impl Filter<Extract = (Claims,), Error = Rejection> + Clone {
    // Raw header map: a value that is not visible ASCII counts as no token.
    warp::header::headers_cloned().and_then(move |headers: HeaderMap| {
        let tokens = tokens.clone();
        async move {
            let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
            authorize(&tokens, header).map_err(warp::reject::custom)
        }
    })
}
