//! Caller identity.
//!
//! Sessions are owned by the layer in front of the gateway; this module only
//! turns what that layer attached to the request into a user id.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::GatewayError;

use super::{ApiError, AppState};

/// Resolves the authenticated user id of a request.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Option<String>;
}

/// Trusts a header set by an upstream session middleware.
#[derive(Debug, Clone)]
pub struct TrustedHeaderAuthenticator {
    header: String,
}

impl TrustedHeaderAuthenticator {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }
}

impl Authenticator for TrustedHeaderAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(self.header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    }
}

/// Extractor for the authenticated caller; rejects with 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        state
            .auth
            .authenticate(&parts.headers)
            .map(Caller)
            .ok_or_else(|| ApiError::from(GatewayError::Unauthenticated))
    }
}
