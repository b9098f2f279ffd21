//! Admin API key authentication
//!
//! Requests must carry `Authorization: Bearer <key>`. Unknown or missing keys
//! are rejected with 401; a known key without the `admin` role gets 403.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ApiKey;
use crate::error::AppError;

/// Role required for the admin routes.
pub const ADMIN_ROLE: &str = "admin";

/// Shared state for authentication
#[derive(Clone, Default)]
pub struct AuthState {
    roles_by_key: Arc<HashMap<String, String>>,
}

impl AuthState {
    pub fn new(api_keys: &[ApiKey]) -> Self {
        Self {
            roles_by_key: Arc::new(
                api_keys
                    .iter()
                    .map(|k| (k.key.clone(), k.role.clone()))
                    .collect(),
            ),
        }
    }

    /// Role granted to `key`, if the key is known.
    pub fn role_for(&self, key: &str) -> Option<&str> {
        self.roles_by_key.get(key).map(String::as_str)
    }
}

fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

/// Middleware admitting only keys with the admin role
pub async fn require_admin(
    State(auth): State<AuthState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(key) = bearer_token(&request) else {
        return AppError::Unauthorized("Missing bearer token".to_string()).into_response();
    };

    match auth.role_for(key) {
        Some(ADMIN_ROLE) => next.run(request).await,
        Some(role) => {
            tracing::warn!(role, "Non-admin key rejected");
            AppError::Forbidden("Admin role required".to_string()).into_response()
        }
        None => AppError::Unauthorized("Invalid API key".to_string()).into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn key(key: &str, role: &str) -> ApiKey {
        ApiKey {
            key: key.to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn test_role_lookup() {
        let auth = AuthState::new(&[key("secret123", "admin"), key("view", "viewer")]);
        assert_eq!(auth.role_for("secret123"), Some("admin"));
        assert_eq!(auth.role_for("view"), Some("viewer"));
        assert_eq!(auth.role_for("wrong"), None);
    }

    #[test]
    fn test_empty_state_knows_no_keys() {
        let auth = AuthState::default();
        assert_eq!(auth.role_for("anything"), None);
    }

    #[test]
    fn test_bearer_token_parsing() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer  abc ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), Some("abc"));

        let raw = Request::builder()
            .header(header::AUTHORIZATION, "abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&raw), None);
    }
}
