// SqlxCredentialStore — the CredentialStore trait over an AnyPool.
//
// Ids are minted here (UUID v4). Timestamps travel as RFC 3339 TEXT in a
// fixed format, so range predicates compare lexicographically. Unique-index
// violations surface as `StoreErrorKind::Conflict`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use stellar_auth_core::error::{StoreError, StoreResult};
use stellar_auth_core::model::{
    AccountLink, NewAccountLink, NewPendingLink, NewUser, OAuthTokens, PasswordSetupToken,
    PendingAccountLink, User, UserUpdate,
};
use stellar_auth_core::store::CredentialStore;

const USER_COLS: &str =
    "id, email, name, username, password_hash, avatar_url, email_verified, created_at, updated_at";
const LINK_COLS: &str = "id, user_id, provider, provider_account_id, access_token, refresh_token, \
     id_token, scope, token_type, token_expires_at, created_at";
const PENDING_COLS: &str = "id, user_id, provider, provider_account_id, provider_email, \
     access_token, refresh_token, id_token, scope, token_type, token_expires_at, \
     created_at, expires_at, verified_at";

/// SQL-backed `CredentialStore`.
#[derive(Debug, Clone)]
pub struct SqlxCredentialStore {
    pool: AnyPool,
}

impl SqlxCredentialStore {
    /// Wrap an existing pool. The schema must already be applied.
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Connect to a database URL and apply the schema.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        sqlx::any::install_default_drivers();

        // Each connection to an in-memory SQLite database is a separate
        // database; a single connection keeps them the same one.
        let pool = if url.contains(":memory:") || url.contains("mode=memory") {
            sqlx::any::AnyPoolOptions::new()
                .max_connections(1)
                .connect(url)
                .await
        } else {
            AnyPool::connect(url).await
        }
        .map_err(|e| StoreError::backend(format!("database connection failed: {e}")))?;

        crate::migration::apply_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

// ─── Row/value plumbing ──────────────────────────────────────────

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::backend(format!("malformed timestamp {raw:?}: {e}")))
}

fn db_err(context: &str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref dbe) = e {
        if dbe.is_unique_violation() {
            return StoreError::conflict(format!("{context}: {dbe}"));
        }
    }
    StoreError::backend(format!("{context}: {e}"))
}

fn get_string(row: &AnyRow, col: &str) -> StoreResult<String> {
    row.try_get::<String, _>(col)
        .map_err(|e| StoreError::backend(format!("column {col}: {e}")))
}

fn get_opt(row: &AnyRow, col: &str) -> StoreResult<Option<String>> {
    row.try_get::<Option<String>, _>(col)
        .map_err(|e| StoreError::backend(format!("column {col}: {e}")))
}

// Integer width differs across backends; try the common encodings.
fn get_bool(row: &AnyRow, col: &str) -> StoreResult<bool> {
    if let Ok(v) = row.try_get::<i64, _>(col) {
        return Ok(v != 0);
    }
    if let Ok(v) = row.try_get::<i32, _>(col) {
        return Ok(v != 0);
    }
    row.try_get::<bool, _>(col)
        .map_err(|e| StoreError::backend(format!("column {col}: {e}")))
}

fn get_ts(row: &AnyRow, col: &str) -> StoreResult<DateTime<Utc>> {
    parse_ts(&get_string(row, col)?)
}

fn get_opt_ts(row: &AnyRow, col: &str) -> StoreResult<Option<DateTime<Utc>>> {
    match get_opt(row, col)? {
        Some(raw) => Ok(Some(parse_ts(&raw)?)),
        None => Ok(None),
    }
}

fn user_from_row(row: &AnyRow) -> StoreResult<User> {
    Ok(User {
        id: get_string(row, "id")?,
        email: get_string(row, "email")?,
        name: get_string(row, "name")?,
        username: get_opt(row, "username")?,
        password_hash: get_opt(row, "password_hash")?,
        avatar_url: get_opt(row, "avatar_url")?,
        email_verified: get_bool(row, "email_verified")?,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
    })
}

fn tokens_from_row(row: &AnyRow) -> StoreResult<OAuthTokens> {
    Ok(OAuthTokens {
        access_token: get_opt(row, "access_token")?,
        refresh_token: get_opt(row, "refresh_token")?,
        id_token: get_opt(row, "id_token")?,
        scope: get_opt(row, "scope")?,
        token_type: get_opt(row, "token_type")?,
        expires_at: get_opt_ts(row, "token_expires_at")?,
    })
}

fn link_from_row(row: &AnyRow) -> StoreResult<AccountLink> {
    Ok(AccountLink {
        id: get_string(row, "id")?,
        user_id: get_string(row, "user_id")?,
        provider: get_string(row, "provider")?,
        provider_account_id: get_string(row, "provider_account_id")?,
        tokens: tokens_from_row(row)?,
        created_at: get_ts(row, "created_at")?,
    })
}

fn pending_from_row(row: &AnyRow) -> StoreResult<PendingAccountLink> {
    Ok(PendingAccountLink {
        id: get_string(row, "id")?,
        user_id: get_string(row, "user_id")?,
        provider: get_string(row, "provider")?,
        provider_account_id: get_string(row, "provider_account_id")?,
        provider_email: get_string(row, "provider_email")?,
        tokens: tokens_from_row(row)?,
        created_at: get_ts(row, "created_at")?,
        expires_at: get_ts(row, "expires_at")?,
        verified_at: get_opt_ts(row, "verified_at")?,
    })
}

fn token_record_from_row(row: &AnyRow) -> StoreResult<PasswordSetupToken> {
    Ok(PasswordSetupToken {
        user_id: get_string(row, "user_id")?,
        token: get_string(row, "token")?,
        expires_at: get_ts(row, "expires_at")?,
        created_at: get_ts(row, "created_at")?,
    })
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl CredentialStore for SqlxCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLS} FROM auth_user WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("find user by email", e))?;
        row.map(|r| user_from_row(&r)).transpose()
    }

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLS} FROM auth_user WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("find user by id", e))?;
        row.map(|r| user_from_row(&r)).transpose()
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
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

        sqlx::query(
            "INSERT INTO auth_user \
             (id, email, name, username, password_hash, avatar_url, email_verified, created_at, updated_at) \
             VALUES ($1, $2, $3, NULL, NULL, $4, $5, $6, $7)",
        )
        .bind(stored.id.as_str())
        .bind(stored.email.as_str())
        .bind(stored.name.as_str())
        .bind(stored.avatar_url.as_deref())
        .bind(i64::from(stored.email_verified))
        .bind(ts(stored.created_at))
        .bind(ts(stored.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("create user", e))?;

        Ok(stored)
    }

    async fn update_user(&self, id: &str, update: UserUpdate) -> StoreResult<User> {
        let not_found = || StoreError::not_found(format!("no user with id {id}"));

        if update.is_empty() {
            return self.find_user_by_id(id).await?.ok_or_else(not_found);
        }

        let mut sets: Vec<String> = Vec::new();
        let mut binds: Vec<String> = Vec::new();
        let mut idx = 1;

        let fields = [
            ("name", update.name),
            ("username", update.username),
            ("avatar_url", update.avatar_url),
            ("password_hash", update.password_hash),
        ];
        for (col, value) in fields {
            if let Some(value) = value {
                sets.push(format!("{col} = ${idx}"));
                binds.push(value);
                idx += 1;
            }
        }
        if let Some(verified) = update.email_verified {
            sets.push(format!("email_verified = {}", i64::from(verified)));
        }
        sets.push(format!("updated_at = ${idx}"));
        binds.push(ts(Utc::now()));
        idx += 1;

        let sql = format!("UPDATE auth_user SET {} WHERE id = ${idx}", sets.join(", "));
        binds.push(id.to_string());

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind.as_str());
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("update user", e))?;

        if result.rows_affected() == 0 {
            return Err(not_found());
        }
        self.find_user_by_id(id).await?.ok_or_else(not_found)
    }

    async fn find_account_link(
        &self,
        user_id: &str,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<Option<AccountLink>> {
        let sql = format!(
            "SELECT {LINK_COLS} FROM account_link \
             WHERE user_id = $1 AND provider = $2 AND provider_account_id = $3"
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(provider)
            .bind(provider_account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("find account link", e))?;
        row.map(|r| link_from_row(&r)).transpose()
    }

    async fn list_account_links(&self, user_id: &str) -> StoreResult<Vec<AccountLink>> {
        let sql = format!(
            "SELECT {LINK_COLS} FROM account_link WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("list account links", e))?;
        rows.iter().map(link_from_row).collect()
    }

    async fn insert_account_link(&self, link: NewAccountLink) -> StoreResult<AccountLink> {
        let stored = AccountLink {
            id: new_id(),
            user_id: link.user_id,
            provider: link.provider,
            provider_account_id: link.provider_account_id,
            tokens: link.tokens,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO account_link \
             (id, user_id, provider, provider_account_id, access_token, refresh_token, \
              id_token, scope, token_type, token_expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(stored.id.as_str())
        .bind(stored.user_id.as_str())
        .bind(stored.provider.as_str())
        .bind(stored.provider_account_id.as_str())
        .bind(stored.tokens.access_token.as_deref())
        .bind(stored.tokens.refresh_token.as_deref())
        .bind(stored.tokens.id_token.as_deref())
        .bind(stored.tokens.scope.as_deref())
        .bind(stored.tokens.token_type.as_deref())
        .bind(stored.tokens.expires_at.map(ts))
        .bind(ts(stored.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("insert account link", e))?;

        Ok(stored)
    }

    async fn update_account_link_tokens(
        &self,
        link_id: &str,
        tokens: OAuthTokens,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE account_link SET access_token = $1, refresh_token = $2, id_token = $3, \
             scope = $4, token_type = $5, token_expires_at = $6 WHERE id = $7",
        )
        .bind(tokens.access_token.as_deref())
        .bind(tokens.refresh_token.as_deref())
        .bind(tokens.id_token.as_deref())
        .bind(tokens.scope.as_deref())
        .bind(tokens.token_type.as_deref())
        .bind(tokens.expires_at.map(ts))
        .bind(link_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("update account link tokens", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!(
                "no account link with id {link_id}"
            )));
        }
        Ok(())
    }

    async fn upsert_pending_link(&self, link: NewPendingLink) -> StoreResult<PendingAccountLink> {
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

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin pending upsert", e))?;

        sqlx::query("DELETE FROM pending_account_link WHERE user_id = $1 AND provider = $2")
            .bind(stored.user_id.as_str())
            .bind(stored.provider.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("replace pending link", e))?;

        sqlx::query(
            "INSERT INTO pending_account_link \
             (id, user_id, provider, provider_account_id, provider_email, access_token, \
              refresh_token, id_token, scope, token_type, token_expires_at, created_at, \
              expires_at, verified_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NULL)",
        )
        .bind(stored.id.as_str())
        .bind(stored.user_id.as_str())
        .bind(stored.provider.as_str())
        .bind(stored.provider_account_id.as_str())
        .bind(stored.provider_email.as_str())
        .bind(stored.tokens.access_token.as_deref())
        .bind(stored.tokens.refresh_token.as_deref())
        .bind(stored.tokens.id_token.as_deref())
        .bind(stored.tokens.scope.as_deref())
        .bind(stored.tokens.token_type.as_deref())
        .bind(stored.tokens.expires_at.map(ts))
        .bind(ts(stored.created_at))
        .bind(ts(stored.expires_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("insert pending link", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("commit pending upsert", e))?;

        Ok(stored)
    }

    async fn find_pending_link(
        &self,
        user_id: &str,
        provider: &str,
        provider_email: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PendingAccountLink>> {
        let sql = format!(
            "SELECT {PENDING_COLS} FROM pending_account_link \
             WHERE user_id = $1 AND provider = $2 AND provider_email = $3 \
               AND expires_at > $4 AND verified_at IS NULL \
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(provider)
            .bind(provider_email)
            .bind(ts(now))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("find pending link", e))?;
        row.map(|r| pending_from_row(&r)).transpose()
    }

    async fn mark_pending_link_verified(&self, id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query("UPDATE pending_account_link SET verified_at = $1 WHERE id = $2")
            .bind(ts(now))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("mark pending link verified", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("no pending link with id {id}")));
        }
        Ok(())
    }

    async fn delete_pending_link(&self, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM pending_account_link WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("delete pending link", e))?;
        Ok(())
    }

    async fn delete_expired_pending_links(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM pending_account_link WHERE expires_at < $1")
            .bind(ts(now))
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("delete expired pending links", e))?;
        Ok(result.rows_affected())
    }

    async fn upsert_password_setup_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<PasswordSetupToken> {
        let stored = PasswordSetupToken {
            user_id: user_id.to_string(),
            token: token.to_string(),
            expires_at,
            created_at: Utc::now(),
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin token upsert", e))?;

        sqlx::query("DELETE FROM password_setup_token WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("replace setup token", e))?;

        sqlx::query(
            "INSERT INTO password_setup_token (user_id, token, expires_at, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(stored.user_id.as_str())
        .bind(stored.token.as_str())
        .bind(ts(stored.expires_at))
        .bind(ts(stored.created_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("insert setup token", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("commit token upsert", e))?;

        Ok(stored)
    }

    async fn find_password_setup_token(
        &self,
        token: &str,
    ) -> StoreResult<Option<PasswordSetupToken>> {
        let row = sqlx::query(
            "SELECT user_id, token, expires_at, created_at \
             FROM password_setup_token WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("find setup token", e))?;
        row.map(|r| token_record_from_row(&r)).transpose()
    }

    async fn delete_password_setup_token(&self, token: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM password_setup_token WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("delete setup token", e))?;
        Ok(())
    }
}
