use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

use super::StreamError;

const USER_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
const SERVER_TOKEN_TTL_SECS: i64 = 60 * 60;

#[derive(Debug, Serialize)]
struct UserClaims<'a> {
    user_id: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Serialize)]
struct ServerClaims {
    server: bool,
    iat: i64,
    exp: i64,
}

/// Client-side auth token for one user, valid for 24 hours. Signed
/// with the SDK secret the same way the vendor SDK signs its tokens.
pub fn user_token(api_secret: &str, user_id: &str) -> Result<String, StreamError> {
    let now = Utc::now().timestamp();
    let claims = UserClaims {
        user_id,
        iat: now,
        exp: now + USER_TOKEN_TTL_SECS,
    };
    sign(api_secret, &claims)
}

/// Short-lived server-to-server token used on every REST call.
pub fn server_token(api_secret: &str) -> Result<String, StreamError> {
    let now = Utc::now().timestamp();
    let claims = ServerClaims {
        server: true,
        iat: now,
        exp: now + SERVER_TOKEN_TTL_SECS,
    };
    sign(api_secret, &claims)
}

fn sign<C: Serialize>(api_secret: &str, claims: &C) -> Result<String, StreamError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(api_secret.as_bytes()),
    )
    .map_err(|e| StreamError::Token(e.to_string()))
}
