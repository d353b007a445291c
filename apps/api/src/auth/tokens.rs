//! JWT issuance and verification. Access tokens are short-lived; refresh
//! tokens are long-lived and only accepted by the refresh endpoint.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ACCESS_TTL_MINUTES: i64 = 60;
const REFRESH_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub fn issue_pair(
    secret: &str,
    user_id: Uuid,
    username: &str,
) -> Result<TokenPair, jsonwebtoken::errors::Error> {
    Ok(TokenPair {
        access: issue(secret, user_id, username, TokenKind::Access)?,
        refresh: issue(secret, user_id, username, TokenKind::Refresh)?,
    })
}

pub fn issue(
    secret: &str,
    user_id: Uuid,
    username: &str,
    kind: TokenKind,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let ttl = match kind {
        TokenKind::Access => Duration::minutes(ACCESS_TTL_MINUTES),
        TokenKind::Refresh => Duration::days(REFRESH_TTL_DAYS),
    };
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        kind,
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Decodes a token and checks that it is of the expected kind.
/// Returns `None` on any failure — expired, tampered, or wrong kind.
pub fn verify(secret: &str, token: &str, expected: TokenKind) -> Option<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    (data.claims.kind == expected).then_some(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_access_token_roundtrip() {
        let user_id = Uuid::new_v4();
        let token = issue(SECRET, user_id, "alice", TokenKind::Access).unwrap();
        let claims = verify(SECRET, &token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let token = issue(SECRET, Uuid::new_v4(), "alice", TokenKind::Refresh).unwrap();
        assert!(verify(SECRET, &token, TokenKind::Access).is_none());
        assert!(verify(SECRET, &token, TokenKind::Refresh).is_some());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue(SECRET, Uuid::new_v4(), "alice", TokenKind::Access).unwrap();
        assert!(verify("other-secret", &token, TokenKind::Access).is_none());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(verify(SECRET, "not.a.token", TokenKind::Access).is_none());
    }
}
