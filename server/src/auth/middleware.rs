//! Bearer token extraction.
//!
//! With `AUTH_SECRET` set, every request must carry it as a bearer token.
//! Without it the service is open, which is only meant for local runs.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::AppState;

/// Proof that a request passed the token check.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser;

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(secret) = state.config.auth_secret.as_deref() else {
            return Ok(AuthUser);
        };

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        if token.is_empty() || token != secret {
            tracing::debug!("Rejected bearer token");
            return Err(AppError::Unauthorized);
        }

        Ok(AuthUser)
    }
}
