// HashMap-free, Vec-backed credential store.
//
// Small enough that linear scans beat any indexing, and the scans keep the
// uniqueness checks in one obvious place. Enforces the same constraints a
// SQL backend would:
//
//   user.email                                    unique
//   user.username                                 unique when set
//   account_link (user, provider, account id)     unique
//   pending_account_link (user, provider)         upsert replaces
//   password_setup_token                          one per user

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use stellar_auth_core::error::{StoreError, StoreResult};
use stellar_auth_core::model::{
    AccountLink, NewAccountLink, NewPendingLink, NewUser, OAuthTokens, PasswordSetupToken,
    PendingAccountLink, User, UserUpdate,
};
use stellar_auth_core::store::CredentialStore;

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    links: Vec<AccountLink>,
    pending: Vec<PendingAccountLink>,
    setup_tokens: Vec<PasswordSetupToken>,
}

/// In-memory `CredentialStore`.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    state: Arc<RwLock<State>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Test/diagnostic accessors ───────────────────────────────

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    pub async fn link_count(&self) -> usize {
        self.state.read().await.links.len()
    }

    pub async fn pending_count(&self) -> usize {
        self.state.read().await.pending.len()
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = State::default();
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::conflict(format!(
                "email already registered: {}",
                user.email
            )));
        }

        let now = Utc::now();
        let stored = User {
            id: new_id(),
            email: user.email,
            name: user.name,
            username: None,
            password_hash: None,
            avatar_url: user.avatar_url,
            email_verified: user.email_verified,
            created_at: now,
            updated_at: now,
        };
        state.users.push(stored.clone());
        Ok(stored)
    }

    async fn update_user(&self, id: &str, update: UserUpdate) -> StoreResult<User> {
        let mut state = self.state.write().await;

        if let Some(ref username) = update.username {
            if state
                .users
                .iter()
                .any(|u| u.id != id && u.username.as_deref() == Some(username))
            {
                return Err(StoreError::conflict(format!(
                    "username already taken: {username}"
                )));
            }
        }

        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StoreError::not_found(format!("no user with id {id}")))?;

        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(username) = update.username {
            user.username = Some(username);
        }
        if let Some(avatar_url) = update.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
        if let Some(password_hash) = update.password_hash {
            user.password_hash = Some(password_hash);
        }
        if let Some(email_verified) = update.email_verified {
            user.email_verified = email_verified;
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn find_account_link(
        &self,
        user_id: &str,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<Option<AccountLink>> {
        let state = self.state.read().await;
        Ok(state
            .links
            .iter()
            .find(|l| {
                l.user_id == user_id
                    && l.provider == provider
                    && l.provider_account_id == provider_account_id
            })
            .cloned())
    }

    async fn list_account_links(&self, user_id: &str) -> StoreResult<Vec<AccountLink>> {
        let state = self.state.read().await;
        let mut links: Vec<AccountLink> = state
            .links
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    async fn insert_account_link(&self, link: NewAccountLink) -> StoreResult<AccountLink> {
        let mut state = self.state.write().await;
        if state.links.iter().any(|l| {
            l.user_id == link.user_id
                && l.provider == link.provider
                && l.provider_account_id == link.provider_account_id
        }) {
            return Err(StoreError::conflict(format!(
                "account link already exists for provider {}",
                link.provider
            )));
        }

        let stored = AccountLink {
            id: new_id(),
            user_id: link.user_id,
            provider: link.provider,
            provider_account_id: link.provider_account_id,
            tokens: link.tokens,
            created_at: Utc::now(),
        };
        state.links.push(stored.clone());
        Ok(stored)
    }

    async fn update_account_link_tokens(
        &self,
        link_id: &str,
        tokens: OAuthTokens,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let link = state
            .links
            .iter_mut()
            .find(|l| l.id == link_id)
            .ok_or_else(|| StoreError::not_found(format!("no account link with id {link_id}")))?;
        link.tokens = tokens;
        Ok(())
    }

    async fn upsert_pending_link(&self, link: NewPendingLink) -> StoreResult<PendingAccountLink> {
        let mut state = self.state.write().await;
        state
            .pending
            .retain(|p| !(p.user_id == link.user_id && p.provider == link.provider));

        let stored = PendingAccountLink {
            id: new_id(),
            user_id: link.user_id,
            provider: link.provider,
            provider_account_id: link.provider_account_id,
            provider_email: link.provider_email,
            tokens: link.tokens,
            created_at: Utc::now(),
            expires_at: link.expires_at,
            verified_at: None,
        };
        state.pending.push(stored.clone());
        Ok(stored)
    }

    async fn find_pending_link(
        &self,
        user_id: &str,
        provider: &str,
        provider_email: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PendingAccountLink>> {
        let state = self.state.read().await;
        Ok(state
            .pending
            .iter()
            .filter(|p| {
                p.user_id == user_id
                    && p.provider == provider
                    && p.provider_email == provider_email
                    && p.expires_at > now
                    && p.verified_at.is_none()
            })
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn mark_pending_link_verified(&self, id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let pending = state
            .pending
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::not_found(format!("no pending link with id {id}")))?;
        pending.verified_at = Some(now);
        Ok(())
    }

    async fn delete_pending_link(&self, id: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.pending.retain(|p| p.id != id);
        Ok(())
    }

    async fn delete_expired_pending_links(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let before = state.pending.len();
        state.pending.retain(|p| p.expires_at >= now);
        Ok((before - state.pending.len()) as u64)
    }

    async fn upsert_password_setup_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<PasswordSetupToken> {
        let mut state = self.state.write().await;
        state.setup_tokens.retain(|t| t.user_id != user_id);

        let stored = PasswordSetupToken {
            user_id: user_id.to_string(),
            token: token.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        state.setup_tokens.push(stored.clone());
        Ok(stored)
    }

    async fn find_password_setup_token(
        &self,
        token: &str,
    ) -> StoreResult<Option<PasswordSetupToken>> {
        let state = self.state.read().await;
        Ok(state.setup_tokens.iter().find(|t| t.token == token).cloned())
    }

    async fn delete_password_setup_token(&self, token: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.setup_tokens.retain(|t| t.token != token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            name: "Test".into(),
            avatar_url: None,
            email_verified: true,
        }
    }

    fn new_link(user_id: &str, provider: &str, account_id: &str) -> NewAccountLink {
        NewAccountLink {
            user_id: user_id.into(),
            provider: provider.into(),
            provider_account_id: account_id.into(),
            tokens: OAuthTokens::default(),
        }
    }

    fn new_pending(user_id: &str, provider: &str, email: &str, ttl_mins: i64) -> NewPendingLink {
        NewPendingLink {
            user_id: user_id.into(),
            provider: provider.into(),
            provider_account_id: "acct-1".into(),
            provider_email: email.into(),
            tokens: OAuthTokens::default(),
            expires_at: Utc::now() + TimeDelta::minutes(ttl_mins),
        }
    }

    #[tokio::test]
    async fn test_create_user_enforces_email_uniqueness() {
        let store = MemoryCredentialStore::new();
        store.create_user(new_user("a@example.com")).await.unwrap();

        let err = store
            .create_user(new_user("a@example.com"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_user_bumps_updated_at_and_applies_fields() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        assert!(user.password_hash.is_none());

        let updated = store
            .update_user(&user.id, UserUpdate::password("$2b$12$hash"))
            .await
            .unwrap();
        assert_eq!(updated.password_hash.as_deref(), Some("$2b$12$hash"));
        assert!(updated.updated_at >= user.updated_at);

        let err = store
            .update_user("missing", UserUpdate::avatar("x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_username_uniqueness_across_users() {
        let store = MemoryCredentialStore::new();
        let a = store.create_user(new_user("a@example.com")).await.unwrap();
        let b = store.create_user(new_user("b@example.com")).await.unwrap();

        let mut update = UserUpdate::default();
        update.username = Some("starling".into());
        store.update_user(&a.id, update.clone()).await.unwrap();

        let err = store.update_user(&b.id, update).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_duplicate_account_link_is_conflict() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();

        store
            .insert_account_link(new_link(&user.id, "google", "g-1"))
            .await
            .unwrap();
        let err = store
            .insert_account_link(new_link(&user.id, "google", "g-1"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // Different account id under the same provider is fine.
        store
            .insert_account_link(new_link(&user.id, "google", "g-2"))
            .await
            .unwrap();
        assert_eq!(store.link_count().await, 2);
    }

    #[tokio::test]
    async fn test_list_account_links_newest_first() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        store
            .insert_account_link(new_link(&user.id, "google", "g-1"))
            .await
            .unwrap();
        store
            .insert_account_link(new_link(&user.id, "github", "h-1"))
            .await
            .unwrap();

        let links = store.list_account_links(&user.id).await.unwrap();
        assert_eq!(links.len(), 2);
        assert!(links[0].created_at >= links[1].created_at);
    }

    #[tokio::test]
    async fn test_pending_upsert_replaces_prior_for_same_pair() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();

        let first = store
            .upsert_pending_link(new_pending(&user.id, "google", "a@example.com", 15))
            .await
            .unwrap();
        let second = store
            .upsert_pending_link(new_pending(&user.id, "google", "a@example.com", 15))
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_find_pending_link_filters_expired_and_verified() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        let now = Utc::now();

        // Expired from the start.
        store
            .upsert_pending_link(new_pending(&user.id, "google", "a@example.com", -1))
            .await
            .unwrap();
        assert!(store
            .find_pending_link(&user.id, "google", "a@example.com", now)
            .await
            .unwrap()
            .is_none());

        // Fresh, then marked verified — no longer findable.
        let fresh = store
            .upsert_pending_link(new_pending(&user.id, "google", "a@example.com", 15))
            .await
            .unwrap();
        assert!(store
            .find_pending_link(&user.id, "google", "a@example.com", now)
            .await
            .unwrap()
            .is_some());

        store
            .mark_pending_link_verified(&fresh.id, now)
            .await
            .unwrap();
        assert!(store
            .find_pending_link(&user.id, "google", "a@example.com", now)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_expired_pending_gc_counts_rows() {
        let store = MemoryCredentialStore::new();
        let a = store.create_user(new_user("a@example.com")).await.unwrap();
        let b = store.create_user(new_user("b@example.com")).await.unwrap();

        store
            .upsert_pending_link(new_pending(&a.id, "google", "a@example.com", -5))
            .await
            .unwrap();
        store
            .upsert_pending_link(new_pending(&b.id, "google", "b@example.com", 15))
            .await
            .unwrap();

        let swept = store.delete_expired_pending_links(Utc::now()).await.unwrap();
        assert_eq!(swept, 1);
        assert_eq!(store.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_setup_token_upsert_and_consume() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        let expires = Utc::now() + TimeDelta::hours(24);

        store
            .upsert_password_setup_token(&user.id, "tok-1", expires)
            .await
            .unwrap();
        store
            .upsert_password_setup_token(&user.id, "tok-2", expires)
            .await
            .unwrap();

        // The old token was replaced.
        assert!(store
            .find_password_setup_token("tok-1")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_password_setup_token("tok-2")
            .await
            .unwrap()
            .is_some());

        store.delete_password_setup_token("tok-2").await.unwrap();
        assert!(store
            .find_password_setup_token("tok-2")
            .await
            .unwrap()
            .is_none());
    }
}
