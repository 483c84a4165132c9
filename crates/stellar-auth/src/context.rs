// Auth context — the fully-resolved configuration shared by every flow.
//
// Created once at startup from `AuthOptions` plus a `CredentialStore`
// backend, then passed around as `Arc<AuthContext>`.

use std::sync::Arc;

use chrono::TimeDelta;

use stellar_auth_core::logger::AuthLogger;
use stellar_auth_core::options::AuthOptions;
use stellar_auth_core::store::CredentialStore;

/// Shared state for request processing.
pub struct AuthContext {
    /// The original configuration.
    pub options: AuthOptions,

    /// Secret for signing session tokens.
    pub secret: String,

    pub session_config: SessionConfig,
    pub password_config: PasswordConfig,
    pub linking_config: LinkingConfig,

    /// The persistence backend.
    pub store: Arc<dyn CredentialStore>,

    pub logger: AuthLogger,
}

// Manual Debug: dyn CredentialStore is not Debug and the secret must not leak.
impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("secret", &"[REDACTED]")
            .field("session_config", &self.session_config)
            .field("password_config", &self.password_config)
            .field("linking_config", &self.linking_config)
            .field("logger", &self.logger)
            .finish()
    }
}

/// Session configuration resolved from options.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Token TTL in seconds.
    pub expires_in: u64,
}

/// Password configuration resolved from options.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub max_length: usize,
    pub bcrypt_cost: u32,
    /// Password-setup token TTL.
    pub setup_token_ttl: TimeDelta,
}

/// Account-linking configuration resolved from options.
#[derive(Debug, Clone)]
pub struct LinkingConfig {
    /// Staging window for pending links.
    pub pending_ttl: TimeDelta,
}

impl AuthContext {
    /// Build a context from options and a store backend.
    pub fn new(options: AuthOptions, store: Arc<dyn CredentialStore>) -> Arc<Self> {
        Self::with_logger(options, store, AuthLogger::default())
    }

    /// Same as `new` but with a caller-provided logger.
    pub fn with_logger(
        options: AuthOptions,
        store: Arc<dyn CredentialStore>,
        logger: AuthLogger,
    ) -> Arc<Self> {
        let secret = options.secret.clone();

        let session_config = SessionConfig {
            expires_in: options.session.expires_in,
        };

        let password_config = PasswordConfig {
            min_length: options.password.min_length,
            max_length: options.password.max_length,
            bcrypt_cost: options.password.bcrypt_cost,
            setup_token_ttl: TimeDelta::seconds(options.password.setup_token_expires_in as i64),
        };

        let linking_config = LinkingConfig {
            pending_ttl: TimeDelta::seconds(options.account_linking.pending_expires_in as i64),
        };

        Arc::new(Self {
            secret,
            session_config,
            password_config,
            linking_config,
            store,
            logger,
            options,
        })
    }
}
