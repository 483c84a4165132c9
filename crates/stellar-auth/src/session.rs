// Stateless session tokens.
//
// HS256-signed JWT whose payload is the session user `{id, name, email,
// image}` plus `iat`/`exp`. No server-side session store: possession of a
// valid token is sufficient, and the payload is reconstructed from the token
// on every request. Issuance backfills a missing id from the credential
// store so the token always carries the database-canonical user id, never a
// provider-supplied one.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use stellar_auth_core::error::StoreError;
use stellar_auth_core::model::User;

use crate::context::AuthContext;

/// The session payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    /// Canonical user id. Empty until backfilled.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl SessionUser {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
            image: user.avatar_url.clone(),
        }
    }
}

/// Failure while issuing a session token.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Claims carry neither an id nor an email to resolve one from.
    #[error("session claims carry no usable identity")]
    MissingIdentity,
    /// The claimed email resolves to no stored user.
    #[error("no user found for session email")]
    UnknownUser,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    user: SessionUser,
    iat: u64,
    exp: u64,
}

fn sign(user: &SessionUser, secret: &str, expires_in_secs: u64) -> Result<String, SessionError> {
    let now = chrono::Utc::now().timestamp() as u64;
    let claims = Claims {
        user: user.clone(),
        iat: now,
        exp: now + expires_in_secs,
    };

    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());
    jsonwebtoken::encode(&header, &claims, &key).map_err(|e| SessionError::Encoding(e.to_string()))
}

fn decode(token: &str, secret: &str) -> Option<SessionUser> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    let data = jsonwebtoken::decode::<Claims>(token, &key, &validation).ok()?;
    Some(data.claims.user)
}

/// Mint a session token for the given claims.
///
/// When the id is absent the canonical user row is fetched by email and the
/// full payload is rebuilt from it; a transient provider-supplied id never
/// reaches the token.
pub async fn issue_session(ctx: &AuthContext, claims: SessionUser) -> Result<String, SessionError> {
    let mut claims = claims;

    if claims.id.is_empty() {
        let email = claims
            .email
            .as_deref()
            .ok_or(SessionError::MissingIdentity)?
            .to_lowercase();
        let user = ctx
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(SessionError::UnknownUser)?;
        claims = SessionUser::from_user(&user);
    }

    sign(&claims, &ctx.secret, ctx.session_config.expires_in)
}

/// Reconstruct the session payload from a bearer token.
///
/// Returns `None` for invalid, tampered, or expired tokens.
pub fn decode_session(ctx: &AuthContext, token: &str) -> Option<SessionUser> {
    decode(token, &ctx.secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn claims() -> SessionUser {
        SessionUser {
            id: "u-42".into(),
            name: Some("Alice".into()),
            email: Some("alice@example.com".into()),
            image: None,
        }
    }

    #[test]
    fn test_sign_and_decode_roundtrip() {
        let token = sign(&claims(), SECRET, 3600).unwrap();
        let decoded = decode(&token, SECRET).unwrap();
        assert_eq!(decoded, claims());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = sign(&claims(), SECRET, 3600).unwrap();
        assert!(decode(&token, "another-secret-another-secret-00").is_none());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let mut token = sign(&claims(), SECRET, 3600).unwrap();
        token.push('x');
        assert!(decode(&token, SECRET).is_none());
    }

    #[test]
    fn test_payload_uses_camel_case_on_the_wire() {
        let json = serde_json::to_value(claims()).unwrap();
        assert_eq!(json["id"], "u-42");
        assert!(json.get("image").is_some());
    }
}
