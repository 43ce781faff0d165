//! Caller identity. The hosted identity provider issues opaque bearer
//! tokens; this module only verifies them and hands handlers a typed user.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::shared::state::AppState;

/// Extract bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|auth| {
            if auth.to_lowercase().starts_with("bearer ") {
                Some(auth[7..].to_string())
            } else {
                None
            }
        })
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdentityClaims {
    /// Subject (user ID)
    pub sub: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated caller as handlers see it.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

impl CurrentUser {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.user_id
        } else {
            &self.name
        }
    }
}

fn unauthorized() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": "Unauthorized"})),
    )
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or_else(unauthorized)?;

        let claims = decode::<IdentityClaims>(
            &token,
            &DecodingKey::from_secret(state.config.auth.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| unauthorized())?
        .claims;

        Ok(CurrentUser {
            user_id: claims.sub,
            name: claims.name,
            email: claims.email,
        })
    }
}

/// Issues an identity token. Used by tests and local tooling; production
/// tokens come from the identity provider.
pub fn mint_identity_token(
    secret: &str,
    user_id: &str,
    name: &str,
    email: &str,
    ttl_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = IdentityClaims {
        sub: user_id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(ttl_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction_handles_casing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(extract_bearer_token(&headers), Some("abc.def.ghi".to_string()));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("bearer lower.case.token"),
        );
        assert_eq!(
            extract_bearer_token(&headers),
            Some("lower.case.token".to_string())
        );
    }

    #[test]
    fn bearer_extraction_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(extract_bearer_token(&headers), None);
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn minted_token_round_trips() {
        let token =
            mint_identity_token("test-secret", "user-1", "Ada", "ada@example.com", 1).unwrap();
        let claims = decode::<IdentityClaims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap()
        .claims;

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.name, "Ada");
        assert_eq!(claims.email, "ada@example.com");
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let token = mint_identity_token("right-secret", "user-1", "", "", 1).unwrap();
        let result = decode::<IdentityClaims>(
            &token,
            &DecodingKey::from_secret(b"wrong-secret"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn display_name_falls_back_to_user_id() {
        let user = CurrentUser {
            user_id: "user-9".to_string(),
            name: String::new(),
            email: String::new(),
        };
        assert_eq!(user.display_name(), "user-9");
    }
}
