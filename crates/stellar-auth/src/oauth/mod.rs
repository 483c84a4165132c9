// OAuth sign-in: assertion types, the account-link resolver, and the
// pending-link verifier.

use serde::{Deserialize, Serialize};

use stellar_auth_core::model::OAuthTokens;

pub mod pending;
pub mod resolver;

pub use pending::{verify_pending_link, LinkConfirmed, VerifyLinkError, VerifyLinkRequest};
pub use resolver::resolve_oauth_sign_in;

/// An identity assertion from an OAuth provider, as produced by the
/// callback handler after token exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthAssertion {
    pub provider: String,
    pub provider_account_id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub tokens: OAuthTokens,
}

/// Why an assertion was rejected before touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    InvalidEmail,
    InvalidProvider,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEmail => write!(f, "invalid email address"),
            Self::InvalidProvider => write!(f, "invalid provider"),
        }
    }
}

/// Outcome of resolving an OAuth sign-in assertion.
///
/// Carried explicitly to the caller — never smuggled through an error
/// channel for string matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// Sign-in completed. `user_id` is the store-canonical id.
    SignedIn {
        user_id: String,
        newly_registered: bool,
    },
    /// A pending link was staged; the caller must redirect to the
    /// verification step instead of completing sign-in.
    VerificationRequired { email: String, provider: String },
    /// The assertion was malformed; nothing was written.
    Rejected { reason: RejectReason },
}

/// Minimal shape check; the provider already validated deliverability.
pub(crate) fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && domain.contains('.')
        }
        _ => false,
    }
}
