// Integration tests for SqlxCredentialStore using SQLite in-memory.
//
// Exercises the store contract the engine depends on: uniqueness
// constraints surfacing as conflicts, upsert-replace semantics, expiry
// filtering, and lazy garbage collection.

use chrono::{TimeDelta, Utc};

use stellar_auth_core::model::{NewAccountLink, NewPendingLink, NewUser, OAuthTokens, UserUpdate};
use stellar_auth_core::store::CredentialStore;
use stellar_auth_sqlx::SqlxCredentialStore;

async fn setup_store() -> SqlxCredentialStore {
    SqlxCredentialStore::connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory store")
}

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
        tokens: OAuthTokens {
            access_token: Some("at-1".into()),
            scope: Some("email profile".into()),
            ..OAuthTokens::default()
        },
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

// ─── Users ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_and_find_user() {
    let store = setup_store().await;

    let created = store.create_user(new_user("alice@example.com")).await.unwrap();
    assert!(!created.id.is_empty());
    assert!(created.email_verified);
    assert!(created.password_hash.is_none());

    let by_email = store
        .find_user_by_email("alice@example.com")
        .await
        .unwrap()
        .expect("user should be findable by email");
    assert_eq!(by_email.id, created.id);

    let by_id = store.find_user_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(by_id.email, "alice@example.com");

    assert!(store
        .find_user_by_email("nobody@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    let store = setup_store().await;
    store.create_user(new_user("alice@example.com")).await.unwrap();

    let err = store
        .create_user(new_user("alice@example.com"))
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "got {err:?}");
}

#[tokio::test]
async fn test_update_user_partial_fields() {
    let store = setup_store().await;
    let user = store.create_user(new_user("alice@example.com")).await.unwrap();

    let updated = store
        .update_user(&user.id, UserUpdate::password("$2b$12$hash"))
        .await
        .unwrap();
    assert_eq!(updated.password_hash.as_deref(), Some("$2b$12$hash"));
    // Untouched fields survive.
    assert_eq!(updated.email, "alice@example.com");
    assert_eq!(updated.name, "Test");

    let updated = store
        .update_user(&user.id, UserUpdate::avatar("https://img.example/a.png"))
        .await
        .unwrap();
    assert_eq!(updated.avatar_url.as_deref(), Some("https://img.example/a.png"));
    assert_eq!(updated.password_hash.as_deref(), Some("$2b$12$hash"));

    let err = store
        .update_user("missing", UserUpdate::avatar("x"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_username_unique_index() {
    let store = setup_store().await;
    let a = store.create_user(new_user("a@example.com")).await.unwrap();
    let b = store.create_user(new_user("b@example.com")).await.unwrap();

    let mut update = UserUpdate::default();
    update.username = Some("starling".into());
    store.update_user(&a.id, update.clone()).await.unwrap();

    let err = store.update_user(&b.id, update).await.unwrap_err();
    assert!(err.is_conflict());
}

// ─── Account links ───────────────────────────────────────────────

#[tokio::test]
async fn test_link_roundtrip_and_uniqueness() {
    let store = setup_store().await;
    let user = store.create_user(new_user("alice@example.com")).await.unwrap();

    let link = store
        .insert_account_link(new_link(&user.id, "google", "g-1"))
        .await
        .unwrap();

    let found = store
        .find_account_link(&user.id, "google", "g-1")
        .await
        .unwrap()
        .expect("link should be findable");
    assert_eq!(found.id, link.id);
    assert_eq!(found.tokens.access_token.as_deref(), Some("at-1"));
    assert_eq!(found.tokens.scope.as_deref(), Some("email profile"));

    let err = store
        .insert_account_link(new_link(&user.id, "google", "g-1"))
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "got {err:?}");
}

#[tokio::test]
async fn test_token_refresh_in_place() {
    let store = setup_store().await;
    let user = store.create_user(new_user("alice@example.com")).await.unwrap();
    let link = store
        .insert_account_link(new_link(&user.id, "google", "g-1"))
        .await
        .unwrap();

    let expiry = Utc::now() + TimeDelta::hours(1);
    store
        .update_account_link_tokens(
            &link.id,
            OAuthTokens {
                access_token: Some("at-2".into()),
                refresh_token: Some("rt-2".into()),
                expires_at: Some(expiry),
                ..OAuthTokens::default()
            },
        )
        .await
        .unwrap();

    let found = store
        .find_account_link(&user.id, "google", "g-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.tokens.access_token.as_deref(), Some("at-2"));
    assert_eq!(found.tokens.refresh_token.as_deref(), Some("rt-2"));
    // The old scope was overwritten, not merged.
    assert!(found.tokens.scope.is_none());

    let err = store
        .update_account_link_tokens("missing", OAuthTokens::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_list_links_newest_first() {
    let store = setup_store().await;
    let user = store.create_user(new_user("alice@example.com")).await.unwrap();
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

    assert!(store.list_account_links("other").await.unwrap().is_empty());
}

// ─── Pending links ───────────────────────────────────────────────

#[tokio::test]
async fn test_pending_upsert_replaces_pair() {
    let store = setup_store().await;
    let user = store.create_user(new_user("alice@example.com")).await.unwrap();

    let first = store
        .upsert_pending_link(new_pending(&user.id, "google", "alice@example.com", 15))
        .await
        .unwrap();
    let second = store
        .upsert_pending_link(new_pending(&user.id, "google", "alice@example.com", 15))
        .await
        .unwrap();
    assert_ne!(first.id, second.id);

    let found = store
        .find_pending_link(&user.id, "google", "alice@example.com", Utc::now())
        .await
        .unwrap()
        .expect("replacement should be findable");
    assert_eq!(found.id, second.id);
}

#[tokio::test]
async fn test_pending_expiry_and_verified_filtering() {
    let store = setup_store().await;
    let user = store.create_user(new_user("alice@example.com")).await.unwrap();
    let now = Utc::now();

    store
        .upsert_pending_link(new_pending(&user.id, "google", "alice@example.com", -1))
        .await
        .unwrap();
    assert!(store
        .find_pending_link(&user.id, "google", "alice@example.com", now)
        .await
        .unwrap()
        .is_none());

    let fresh = store
        .upsert_pending_link(new_pending(&user.id, "google", "alice@example.com", 15))
        .await
        .unwrap();
    store.mark_pending_link_verified(&fresh.id, now).await.unwrap();
    assert!(store
        .find_pending_link(&user.id, "google", "alice@example.com", now)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_expired_pending_gc() {
    let store = setup_store().await;
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

    // The fresh one survives.
    assert!(store
        .find_pending_link(&b.id, "google", "b@example.com", Utc::now())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_delete_pending_is_idempotent() {
    let store = setup_store().await;
    let user = store.create_user(new_user("alice@example.com")).await.unwrap();
    let pending = store
        .upsert_pending_link(new_pending(&user.id, "google", "alice@example.com", 15))
        .await
        .unwrap();

    store.delete_pending_link(&pending.id).await.unwrap();
    // Second delete of a gone row is not an error.
    store.delete_pending_link(&pending.id).await.unwrap();
}

// ─── Password setup tokens ───────────────────────────────────────

#[tokio::test]
async fn test_setup_token_lifecycle() {
    let store = setup_store().await;
    let user = store.create_user(new_user("alice@example.com")).await.unwrap();
    let expires = Utc::now() + TimeDelta::hours(24);

    store
        .upsert_password_setup_token(&user.id, "tok-1", expires)
        .await
        .unwrap();
    store
        .upsert_password_setup_token(&user.id, "tok-2", expires)
        .await
        .unwrap();

    assert!(store
        .find_password_setup_token("tok-1")
        .await
        .unwrap()
        .is_none());
    let found = store
        .find_password_setup_token("tok-2")
        .await
        .unwrap()
        .expect("current token should resolve");
    assert_eq!(found.user_id, user.id);

    store.delete_password_setup_token("tok-2").await.unwrap();
    assert!(store
        .find_password_setup_token("tok-2")
        .await
        .unwrap()
        .is_none());
}
