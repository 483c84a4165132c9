// Runtime options for the auth core.
//
// Built once at startup, then resolved into the engine's context. All
// durations are seconds. Defaults mirror the production deployment: 15-minute
// pending-link staging window, 24-hour password-setup tokens, bcrypt cost 12,
// 30-day sessions.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the auth engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthOptions {
    /// Secret used to sign session tokens. Must be at least 32 bytes.
    pub secret: String,
    /// Application name used in outbound mail.
    pub app_name: Option<String>,
    /// Base URL for links embedded in outbound mail.
    pub base_url: Option<String>,
    pub session: SessionOptions,
    pub password: PasswordOptions,
    pub account_linking: AccountLinkingOptions,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            secret: String::new(),
            app_name: None,
            base_url: None,
            session: SessionOptions::default(),
            password: PasswordOptions::default(),
            account_linking: AccountLinkingOptions::default(),
        }
    }
}

impl AuthOptions {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }

    /// Validate invariants that would otherwise fail at request time.
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.len() < 32 {
            return Err("secret must be at least 32 bytes".into());
        }
        if self.password.min_length > self.password.max_length {
            return Err("password.minLength exceeds password.maxLength".into());
        }
        if !(4..=31).contains(&self.password.bcrypt_cost) {
            return Err("password.bcryptCost must be in 4..=31".into());
        }
        Ok(())
    }
}

/// Session token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionOptions {
    /// Token lifetime in seconds (default: 30 days).
    pub expires_in: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            expires_in: 60 * 60 * 24 * 30,
        }
    }
}

/// Password hashing and validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordOptions {
    pub min_length: usize,
    pub max_length: usize,
    /// bcrypt work factor.
    pub bcrypt_cost: u32,
    /// Password-setup token lifetime in seconds (default: 24 hours).
    pub setup_token_expires_in: u64,
}

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            bcrypt_cost: 12,
            setup_token_expires_in: 60 * 60 * 24,
        }
    }
}

/// Account-linking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountLinkingOptions {
    /// Staging window for pending links in seconds (default: 15 minutes).
    pub pending_expires_in: u64,
}

impl Default for AccountLinkingOptions {
    fn default() -> Self {
        Self {
            pending_expires_in: 60 * 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_defaults() {
        let opts = AuthOptions::new(SECRET);
        assert_eq!(opts.account_linking.pending_expires_in, 900);
        assert_eq!(opts.password.bcrypt_cost, 12);
        assert_eq!(opts.password.min_length, 8);
        assert_eq!(opts.password.setup_token_expires_in, 86400);
        assert_eq!(opts.session.expires_in, 2_592_000);
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        assert!(AuthOptions::new("short").validate().is_err());
        assert!(AuthOptions::new(SECRET).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_cost() {
        let mut opts = AuthOptions::new(SECRET);
        opts.password.bcrypt_cost = 2;
        assert!(opts.validate().is_err());
        opts.password.bcrypt_cost = 32;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let opts: AuthOptions = serde_json::from_str(
            r#"{"secret":"0123456789abcdef0123456789abcdef","accountLinking":{"pendingExpiresIn":300}}"#,
        )
        .unwrap();
        assert_eq!(opts.account_linking.pending_expires_in, 300);
        assert_eq!(opts.password.bcrypt_cost, 12);
    }
}
