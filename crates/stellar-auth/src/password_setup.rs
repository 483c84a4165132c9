// Password setup and change.
//
// Accounts created through OAuth have no password; the setup flow mails a
// one-time token that lets the owner add one. Changing an existing password
// requires the current one. Token delivery goes through the `SetupMailer`
// collaborator so the engine stays free of any mail-provider dependency.

use async_trait::async_trait;
use chrono::Utc;

use stellar_auth_core::error::StoreError;
use stellar_auth_core::model::UserUpdate;

use crate::context::AuthContext;
use crate::crypto::password::{hash_password, verify_password};
use crate::crypto::random::generate_setup_token;

/// Outbound mail boundary for setup links.
#[async_trait]
pub trait SetupMailer: Send + Sync {
    /// Deliver a password-setup token to the given address.
    async fn send_password_setup(
        &self,
        email: &str,
        name: &str,
        token: &str,
    ) -> Result<(), MailerError>;
}

/// Failure reported by a `SetupMailer` implementation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("mail delivery failed: {0}")]
pub struct MailerError(pub String);

/// Failures of the setup-request step.
#[derive(Debug, thiserror::Error)]
pub enum RequestSetupError {
    #[error("user not found")]
    UserNotFound,
    /// Setup is only for accounts without a password; password changes go
    /// through `change_password`.
    #[error("a password is already set for this account")]
    PasswordAlreadySet,
    #[error(transparent)]
    Mailer(#[from] MailerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of the setup-confirmation step.
#[derive(Debug, thiserror::Error)]
pub enum ConfirmSetupError {
    #[error("invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("password must be at most {0} characters")]
    PasswordTooLong(usize),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of the change-password step.
#[derive(Debug, thiserror::Error)]
pub enum ChangePasswordError {
    #[error("user not found")]
    UserNotFound,
    /// OAuth-only account; use the setup flow instead.
    #[error("no password set for this account")]
    NoPasswordSet,
    #[error("current password is incorrect")]
    InvalidCredential,
    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("password must be at most {0} characters")]
    PasswordTooLong(usize),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Mint a setup token for an OAuth-only account and hand it to the mailer.
///
/// The token is 32 random bytes hex-encoded, valid for the configured TTL
/// (default 24 hours); a repeat request replaces the previous token.
pub async fn request_password_setup(
    ctx: &AuthContext,
    mailer: &dyn SetupMailer,
    email: &str,
) -> Result<(), RequestSetupError> {
    let email = email.to_lowercase();

    let user = ctx
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or(RequestSetupError::UserNotFound)?;

    if user.has_password() {
        return Err(RequestSetupError::PasswordAlreadySet);
    }

    let token = generate_setup_token();
    let expires_at = Utc::now() + ctx.password_config.setup_token_ttl;

    ctx.store
        .upsert_password_setup_token(&user.id, &token, expires_at)
        .await?;

    mailer
        .send_password_setup(&user.email, &user.name, &token)
        .await?;

    ctx.logger
        .info(&format!("password setup mail queued for user {}", user.id));

    Ok(())
}

/// Consume a setup token and store the new password hash.
pub async fn confirm_password_setup(
    ctx: &AuthContext,
    token: &str,
    new_password: &str,
) -> Result<(), ConfirmSetupError> {
    check_length(
        ctx,
        new_password,
        ConfirmSetupError::PasswordTooShort(ctx.password_config.min_length),
        ConfirmSetupError::PasswordTooLong(ctx.password_config.max_length),
    )?;

    let now = Utc::now();
    let record = ctx
        .store
        .find_password_setup_token(token)
        .await?
        .filter(|record| !record.is_expired(now))
        .ok_or(ConfirmSetupError::InvalidOrExpiredToken)?;

    let hash = hash_password(new_password, ctx.password_config.bcrypt_cost)
        .map_err(|e| ConfirmSetupError::Hash(e.to_string()))?;

    ctx.store
        .update_user(&record.user_id, UserUpdate::password(hash))
        .await?;

    // Consumed; a second confirmation with the same token must fail.
    ctx.store.delete_password_setup_token(token).await?;

    Ok(())
}

/// Replace an existing password, gated by the current one.
pub async fn change_password(
    ctx: &AuthContext,
    user_id: &str,
    current_password: &str,
    new_password: &str,
) -> Result<(), ChangePasswordError> {
    check_length(
        ctx,
        new_password,
        ChangePasswordError::PasswordTooShort(ctx.password_config.min_length),
        ChangePasswordError::PasswordTooLong(ctx.password_config.max_length),
    )?;

    let user = ctx
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or(ChangePasswordError::UserNotFound)?;

    let hash = user
        .password_hash
        .as_deref()
        .ok_or(ChangePasswordError::NoPasswordSet)?;

    let valid = verify_password(current_password, hash)
        .map_err(|e| ChangePasswordError::Hash(e.to_string()))?;
    if !valid {
        return Err(ChangePasswordError::InvalidCredential);
    }

    let new_hash = hash_password(new_password, ctx.password_config.bcrypt_cost)
        .map_err(|e| ChangePasswordError::Hash(e.to_string()))?;

    ctx.store
        .update_user(user_id, UserUpdate::password(new_hash))
        .await?;

    Ok(())
}

fn check_length<E>(ctx: &AuthContext, password: &str, too_short: E, too_long: E) -> Result<(), E> {
    let len = password.chars().count();
    if len < ctx.password_config.min_length {
        return Err(too_short);
    }
    if len > ctx.password_config.max_length {
        return Err(too_long);
    }
    Ok(())
}
