//! Owner extraction from the `Authorization` header.
//!
//! The bearer token is taken as an opaque owner id. Every row and reminder
//! is scoped to it; nothing is verified.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};

use crate::AppState;

/// Owner of the rows touched by a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

impl Owner {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequestParts<AppState> for Owner {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match auth_header {
            Some(header) => match header.strip_prefix("Bearer ") {
                Some(token) if !token.trim().is_empty() => Ok(Owner(token.trim().to_string())),
                Some(_) => Err((StatusCode::UNAUTHORIZED, "Empty bearer token")),
                None => Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid authorization header format",
                )),
            },
            None => Err((StatusCode::UNAUTHORIZED, "Missing authorization header")),
        }
    }
}
