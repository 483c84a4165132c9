// Data model for the authentication core.
//
// These are the typed records owned by the credential store. Joined or
// partial rows get their own structs rather than being reshaped ad hoc at
// the call site; every boundary asserts its shape at compile time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A forum user. Created on first OAuth sign-in or explicit signup;
/// never hard-deleted by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque, stable id. Never reused.
    pub id: String,
    /// Unique, stored lowercase.
    pub email: String,
    pub name: String,
    /// Unique when set; 3–30 chars from `[A-Za-z0-9_-]`.
    #[serde(default)]
    pub username: Option<String>,
    /// Absent for OAuth-only accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Fields for creating a user. The store mints the id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
}

/// Partial user update. `None` fields are left untouched; the store bumps
/// `updated_at` on every successful update.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub password_hash: Option<String>,
    pub email_verified: Option<bool>,
}

impl UserUpdate {
    pub fn avatar(url: impl Into<String>) -> Self {
        Self {
            avatar_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn password(hash: impl Into<String>) -> Self {
        Self {
            password_hash: Some(hash.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.username.is_none()
            && self.avatar_url.is_none()
            && self.password_hash.is_none()
            && self.email_verified.is_none()
    }
}

/// OAuth token material attached to a link. Everything is optional —
/// providers differ in what they return, and refresh rotation may clear
/// fields on repeat sign-ins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthTokens {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A confirmed association between a user and an external provider account.
/// At most one per `(user_id, provider, provider_account_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLink {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub provider_account_id: String,
    #[serde(flatten)]
    pub tokens: OAuthTokens,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a confirmed link.
#[derive(Debug, Clone)]
pub struct NewAccountLink {
    pub user_id: String,
    pub provider: String,
    pub provider_account_id: String,
    pub tokens: OAuthTokens,
}

/// A staged, unconfirmed account link awaiting password verification.
///
/// Only created when the target user already has a password set. At most
/// one per `(user_id, provider)`; a repeat sign-in replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAccountLink {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub provider_account_id: String,
    /// Email asserted by the provider at staging time.
    pub provider_email: String,
    #[serde(flatten)]
    pub tokens: OAuthTokens,
    pub created_at: DateTime<Utc>,
    /// Staging TTL; the link is unusable past this instant. Renamed on
    /// the wire to stay distinct from the flattened token expiry.
    #[serde(rename = "expiresAtPending")]
    pub expires_at: DateTime<Utc>,
    /// Set just before the record is deleted, leaving an auditable trail
    /// if deletion is interrupted.
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
}

impl PendingAccountLink {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Fields for staging a pending link.
#[derive(Debug, Clone)]
pub struct NewPendingLink {
    pub user_id: String,
    pub provider: String,
    pub provider_account_id: String,
    pub provider_email: String,
    pub tokens: OAuthTokens,
    pub expires_at: DateTime<Utc>,
}

/// One-time token for the password-setup flow. Upserted per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordSetupToken {
    pub user_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PasswordSetupToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Provider name + link date, as shown on the account settings page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedProvider {
    pub provider: String,
    pub created_at: DateTime<Utc>,
}

/// Check a username against the allowed shape: 3–30 chars, `[A-Za-z0-9_-]`.
pub fn is_valid_username(username: &str) -> bool {
    let len = username.chars().count();
    (3..=30).contains(&len)
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_validation() {
        assert!(is_valid_username("nova_rider"));
        assert!(is_valid_username("a-b"));
        assert!(is_valid_username("x".repeat(30).as_str()));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("x".repeat(31).as_str()));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username("tilde~"));
        assert!(!is_valid_username(""));
    }

    #[test]
    fn test_user_update_is_empty() {
        assert!(UserUpdate::default().is_empty());
        assert!(!UserUpdate::avatar("https://img.example/a.png").is_empty());
        assert!(!UserUpdate::password("$2b$12$hash").is_empty());
    }

    #[test]
    fn test_pending_link_expiry() {
        let now = Utc::now();
        let link = PendingAccountLink {
            id: "pl-1".into(),
            user_id: "u-1".into(),
            provider: "google".into(),
            provider_account_id: "g-123".into(),
            provider_email: "alice@example.com".into(),
            tokens: OAuthTokens::default(),
            created_at: now,
            expires_at: now + chrono::TimeDelta::minutes(15),
            verified_at: None,
        };
        assert!(!link.is_expired(now));
        assert!(link.is_expired(now + chrono::TimeDelta::minutes(15)));
        assert!(link.is_expired(now + chrono::TimeDelta::minutes(16)));
    }

    #[test]
    fn test_pending_link_serde_keeps_expiries_distinct() {
        let now = Utc::now();
        let link = PendingAccountLink {
            id: "pl-1".into(),
            user_id: "u-1".into(),
            provider: "google".into(),
            provider_account_id: "g-123".into(),
            provider_email: "alice@example.com".into(),
            tokens: OAuthTokens {
                expires_at: Some(now + chrono::TimeDelta::hours(1)),
                ..OAuthTokens::default()
            },
            created_at: now,
            expires_at: now + chrono::TimeDelta::minutes(15),
            verified_at: None,
        };
        let json = serde_json::to_value(&link).unwrap();
        assert!(json.get("expiresAt").is_some());
        assert!(json.get("expiresAtPending").is_some());
        assert_ne!(json["expiresAt"], json["expiresAtPending"]);
    }

    #[test]
    fn test_account_link_serde_flattens_tokens() {
        let link = AccountLink {
            id: "al-1".into(),
            user_id: "u-1".into(),
            provider: "google".into(),
            provider_account_id: "g-123".into(),
            tokens: OAuthTokens {
                access_token: Some("at".into()),
                scope: Some("email profile".into()),
                ..OAuthTokens::default()
            },
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["providerAccountId"], "g-123");
        assert_eq!(json["accessToken"], "at");
        assert_eq!(json["scope"], "email profile");
    }
}
