// The credential store boundary.
//
// Every persistent record the core touches goes through this trait. The
// engine issues short, fully synchronous call sequences against it and
// performs no locking of its own — correctness against concurrent duplicate
// sign-ins relies on the store's uniqueness constraints:
//
//   account_link:          unique (user_id, provider, provider_account_id)
//   pending_account_link:  unique (user_id, provider)
//   password_setup_token:  one per user_id (upsert replaces)
//
// A concurrent duplicate insert must surface as `StoreErrorKind::Conflict`,
// which callers treat as the "already exists" branch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::model::{
    AccountLink, NewAccountLink, NewPendingLink, NewUser, OAuthTokens, PasswordSetupToken,
    PendingAccountLink, User, UserUpdate,
};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────

    /// Exact-match lookup; callers are expected to lowercase first.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<User>>;

    /// Mint id and timestamps, insert, return the stored row.
    /// `Conflict` if the email is already taken.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    /// Apply the set fields of `update` and bump `updated_at`.
    /// `NotFound` if the user does not exist.
    async fn update_user(&self, id: &str, update: UserUpdate) -> StoreResult<User>;

    // ─── Account links ───────────────────────────────────────────

    async fn find_account_link(
        &self,
        user_id: &str,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<Option<AccountLink>>;

    /// All confirmed links for a user, newest first.
    async fn list_account_links(&self, user_id: &str) -> StoreResult<Vec<AccountLink>>;

    /// `Conflict` on a duplicate `(user_id, provider, provider_account_id)`.
    async fn insert_account_link(&self, link: NewAccountLink) -> StoreResult<AccountLink>;

    /// Refresh stored token material in place.
    async fn update_account_link_tokens(
        &self,
        link_id: &str,
        tokens: OAuthTokens,
    ) -> StoreResult<()>;

    // ─── Pending links ───────────────────────────────────────────

    /// Insert, or replace any prior pending link for `(user_id, provider)`.
    async fn upsert_pending_link(&self, link: NewPendingLink) -> StoreResult<PendingAccountLink>;

    /// The most recent unexpired, unverified pending link for
    /// `(user_id, provider, provider_email)`.
    async fn find_pending_link(
        &self,
        user_id: &str,
        provider: &str,
        provider_email: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PendingAccountLink>>;

    /// Stamp `verified_at`; the record is deleted separately so an
    /// interruption between the two leaves an auditable row.
    async fn mark_pending_link_verified(&self, id: &str, now: DateTime<Utc>) -> StoreResult<()>;

    async fn delete_pending_link(&self, id: &str) -> StoreResult<()>;

    /// Lazy garbage collection: drop every pending link past its TTL.
    /// Returns the number of rows removed.
    async fn delete_expired_pending_links(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    // ─── Password setup tokens ───────────────────────────────────

    /// One token per user; a new request replaces the previous token.
    async fn upsert_password_setup_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<PasswordSetupToken>;

    async fn find_password_setup_token(
        &self,
        token: &str,
    ) -> StoreResult<Option<PasswordSetupToken>>;

    async fn delete_password_setup_token(&self, token: &str) -> StoreResult<()>;
}
