// Schema for the credential store.
//
// Portable DDL only: TEXT ids and RFC 3339 TEXT timestamps (formatted
// uniformly so lexicographic comparison is chronological), BIGINT 0/1
// booleans. The unique indexes are load-bearing; the engine relies on
// them to reject concurrent duplicate inserts.

use sqlx::AnyPool;

use stellar_auth_core::error::{StoreError, StoreResult};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS auth_user (
        id             TEXT PRIMARY KEY,
        email          TEXT NOT NULL,
        name           TEXT NOT NULL,
        username       TEXT,
        password_hash  TEXT,
        avatar_url     TEXT,
        email_verified BIGINT NOT NULL DEFAULT 0,
        created_at     TEXT NOT NULL,
        updated_at     TEXT NOT NULL
    )
    "#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_auth_user_email ON auth_user (email)"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_auth_user_username ON auth_user (username)"#,
    r#"
    CREATE TABLE IF NOT EXISTS account_link (
        id                  TEXT PRIMARY KEY,
        user_id             TEXT NOT NULL,
        provider            TEXT NOT NULL,
        provider_account_id TEXT NOT NULL,
        access_token        TEXT,
        refresh_token       TEXT,
        id_token            TEXT,
        scope               TEXT,
        token_type          TEXT,
        token_expires_at    TEXT,
        created_at          TEXT NOT NULL
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_account_link_identity
        ON account_link (user_id, provider, provider_account_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pending_account_link (
        id                  TEXT PRIMARY KEY,
        user_id             TEXT NOT NULL,
        provider            TEXT NOT NULL,
        provider_account_id TEXT NOT NULL,
        provider_email      TEXT NOT NULL,
        access_token        TEXT,
        refresh_token       TEXT,
        id_token            TEXT,
        scope               TEXT,
        token_type          TEXT,
        token_expires_at    TEXT,
        created_at          TEXT NOT NULL,
        expires_at          TEXT NOT NULL,
        verified_at         TEXT
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_pending_link_pair
        ON pending_account_link (user_id, provider)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS password_setup_token (
        user_id    TEXT PRIMARY KEY,
        token      TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_setup_token ON password_setup_token (token)"#,
];

/// Create all tables and indexes if they do not yet exist.
pub async fn apply_schema(pool: &AnyPool) -> StoreResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| StoreError::backend(format!("schema migration failed: {e}")))?;
    }
    Ok(())
}
