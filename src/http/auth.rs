//! Request authentication (§6: every `/chat`, `/documents`, session, and
//! admin endpoint requires a bearer token resolving to a user id). The HTTP
//! layer only depends on the `TokenVerifier` trait; swapping the fixed-token
//! `StaticTokenVerifier` below for a real identity provider never touches a
//! handler.

use crate::error::{Error, Result};
use crate::http::AppState;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, bearer_token: &str) -> Result<Uuid>;
}

/// Accepts `dev:{uuid}` bearer tokens and nothing else. Only ever wired up
/// when no real identity provider is configured; never the verifier a
/// production-shaped `Settings` would select.
pub struct StaticTokenVerifier;

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, bearer_token: &str) -> Result<Uuid> {
        let raw = bearer_token
            .strip_prefix("dev:")
            .ok_or_else(|| Error::auth("unrecognized bearer token format"))?;
        Uuid::parse_str(raw).map_err(|_| Error::auth("bearer token does not encode a valid user id"))
    }
}

/// The authenticated caller, extracted from `Authorization: Bearer <token>`.
pub struct AuthUser {
    pub user_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::auth("missing Authorization header"))?;
        let token = header.strip_prefix("Bearer ").ok_or_else(|| Error::auth("expected a Bearer token"))?;
        let user_id = state.token_verifier.verify(token).await?;
        Ok(AuthUser { user_id })
    }
}

pub fn default_verifier() -> Arc<dyn TokenVerifier> {
    Arc::new(StaticTokenVerifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dev_token_parses_embedded_uuid() {
        let id = Uuid::new_v4();
        let verifier = StaticTokenVerifier;
        let resolved = verifier.verify(&format!("dev:{id}")).await.unwrap();
        assert_eq!(resolved, id);
    }

    #[tokio::test]
    async fn malformed_token_is_rejected() {
        let verifier = StaticTokenVerifier;
        assert!(verifier.verify("not-a-token").await.is_err());
    }
}
