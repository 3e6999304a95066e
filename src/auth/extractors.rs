use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::{
    auth::{claims::Claims, jwt::JwtKeys},
    config::AuthMode,
    error::{AppError, AppResult},
    state::AppState,
};

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Who passed the guard.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    /// Bearer-token deployments: the decoded claims.
    User(Claims),
    /// Shared-secret deployments carry no identity.
    Admin,
}

/// Guards a handler. Rejects with 401 before the handler body runs.
pub struct AuthUser(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = match &state.config.auth_mode {
            AuthMode::Bearer => check_bearer(&parts.headers, &state.jwt),
            AuthMode::SharedSecret(secret) => check_shared_secret(&parts.headers, secret.as_deref()),
        }?;
        Ok(AuthUser(principal))
    }
}

pub(crate) fn check_bearer(headers: &HeaderMap, keys: &JwtKeys) -> AppResult<Principal> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

    let token = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

    match keys.verify(token) {
        Ok(claims) => Ok(Principal::User(claims)),
        Err(e) => {
            warn!(error = %e, "invalid or expired token");
            Err(AppError::Unauthorized("Invalid or expired token".into()))
        }
    }
}

/// Fails closed: with no configured secret nothing gets through.
pub(crate) fn check_shared_secret(headers: &HeaderMap, configured: Option<&str>) -> AppResult<Principal> {
    let Some(expected) = configured else {
        warn!("ADMIN_SECRET not set, rejecting request");
        return Err(AppError::Unauthorized("Admin secret not configured".into()));
    };

    let provided = headers
        .get(ADMIN_SECRET_HEADER)
        .map(|v| v.as_bytes())
        .unwrap_or_default();

    if bool::from(provided.ct_eq(expected.as_bytes())) {
        Ok(Principal::Admin)
    } else {
        warn!("invalid admin secret");
        Err(AppError::Unauthorized("Invalid Admin Secret".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::User;
    use crate::config::JwtConfig;
    use axum::http::HeaderValue;
    use time::OffsetDateTime;

    fn keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "guard-secret".into(),
            ttl_minutes: 5,
        })
    }

    fn token(keys: &JwtKeys, issued_at: OffsetDateTime) -> String {
        let user = User {
            email: "ada@example.com".into(),
            name: "Ada".into(),
            password_hash: String::new(),
            created_at: issued_at,
        };
        keys.sign_at(&user, issued_at).unwrap()
    }

    fn with_header(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_allows_valid_token_and_exposes_claims() {
        let keys = keys();
        let t = token(&keys, OffsetDateTime::now_utc());
        let headers = with_header("authorization", &format!("Bearer {t}"));
        match check_bearer(&headers, &keys).unwrap() {
            Principal::User(claims) => assert_eq!(claims.email, "ada@example.com"),
            other => panic!("unexpected principal {other:?}"),
        }
    }

    #[test]
    fn bearer_rejects_missing_malformed_and_expired() {
        let keys = keys();
        assert!(matches!(
            check_bearer(&HeaderMap::new(), &keys),
            Err(AppError::Unauthorized(_))
        ));

        let t = token(&keys, OffsetDateTime::now_utc());
        let basic = with_header("authorization", &format!("Basic {t}"));
        assert!(matches!(check_bearer(&basic, &keys), Err(AppError::Unauthorized(_))));

        let empty = with_header("authorization", "Bearer ");
        assert!(matches!(check_bearer(&empty, &keys), Err(AppError::Unauthorized(_))));

        let old = token(&keys, OffsetDateTime::now_utc() - time::Duration::hours(1));
        let expired = with_header("authorization", &format!("Bearer {old}"));
        assert!(matches!(check_bearer(&expired, &keys), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn shared_secret_matches_exactly() {
        let ok = with_header(ADMIN_SECRET_HEADER, "hunter22");
        assert_eq!(check_shared_secret(&ok, Some("hunter22")).unwrap(), Principal::Admin);

        let wrong = with_header(ADMIN_SECRET_HEADER, "hunter2");
        assert!(check_shared_secret(&wrong, Some("hunter22")).is_err());
        assert!(check_shared_secret(&HeaderMap::new(), Some("hunter22")).is_err());
    }

    #[test]
    fn shared_secret_without_configuration_rejects_everything() {
        let headers = with_header(ADMIN_SECRET_HEADER, "anything");
        assert!(matches!(
            check_shared_secret(&headers, None),
            Err(AppError::Unauthorized(_))
        ));
        assert!(check_shared_secret(&HeaderMap::new(), None).is_err());
    }
}
