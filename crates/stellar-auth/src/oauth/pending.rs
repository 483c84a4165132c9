// The pending-link verifier.
//
// Phase two of the linking protocol: the resolver staged an unconfirmed
// grant, and this flow requires an independent proof — the account password
// — before the grant takes effect. The staging TTL bounds the window in
// which an attacker who controls only the OAuth identity could complete a
// link.
//
// Write ordering: the confirmed link is inserted BEFORE the pending record
// is marked and deleted. An interruption between the writes leaves both
// rows present, and the next attempt resolves through the already-linked
// branch; nothing is lost silently.

use chrono::Utc;

use stellar_auth_core::error::StoreError;
use stellar_auth_core::model::NewAccountLink;

use crate::context::AuthContext;
use crate::crypto::password::verify_password;

/// Input for the verification step.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyLinkRequest {
    pub email: String,
    pub provider: String,
    pub password: String,
}

/// Successful promotion of a pending link.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkConfirmed {
    pub provider: String,
}

/// Typed failures of the verification step.
#[derive(Debug, thiserror::Error)]
pub enum VerifyLinkError {
    #[error("user not found")]
    UserNotFound,
    /// Unreachable through the resolver (it only stages links for
    /// password-protected accounts) but guarded against regardless.
    #[error("no password set for this account")]
    NoPasswordSet,
    /// Password mismatch — the gate that keeps an attacker controlling
    /// only the OAuth identity from hijacking the account.
    #[error("invalid password")]
    InvalidCredential,
    /// No unexpired, unverified pending link matches; the user must
    /// restart the OAuth flow.
    #[error("pending link not found or expired")]
    LinkNotFoundOrExpired,
    /// The link already exists (double verification or a concurrent
    /// completion). The pending record has been cleaned up; the caller
    /// may treat this as already-satisfied.
    #[error("account is already linked")]
    AlreadyLinked,
    #[error("stored password hash is unusable: {0}")]
    BadStoredHash(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Promote a pending account link into a confirmed one, gated by proof of
/// password ownership. Finishes by garbage-collecting expired pending
/// links across the store.
pub async fn verify_pending_link(
    ctx: &AuthContext,
    request: VerifyLinkRequest,
) -> Result<LinkConfirmed, VerifyLinkError> {
    let email = request.email.to_lowercase();
    let now = Utc::now();

    let user = ctx
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or(VerifyLinkError::UserNotFound)?;

    let hash = user
        .password_hash
        .as_deref()
        .ok_or(VerifyLinkError::NoPasswordSet)?;

    let valid = verify_password(&request.password, hash)
        .map_err(|e| VerifyLinkError::BadStoredHash(e.to_string()))?;
    if !valid {
        return Err(VerifyLinkError::InvalidCredential);
    }

    let pending = ctx
        .store
        .find_pending_link(&user.id, &request.provider, &email, now)
        .await?
        .ok_or(VerifyLinkError::LinkNotFoundOrExpired)?;

    // Already linked through another path (or a verified-twice race):
    // drop the pending record and report the conflict as already-satisfied.
    let existing = ctx
        .store
        .find_account_link(&user.id, &pending.provider, &pending.provider_account_id)
        .await?;
    if existing.is_some() {
        ctx.store.delete_pending_link(&pending.id).await?;
        return Err(VerifyLinkError::AlreadyLinked);
    }

    let insert = ctx
        .store
        .insert_account_link(NewAccountLink {
            user_id: user.id.clone(),
            provider: pending.provider.clone(),
            provider_account_id: pending.provider_account_id.clone(),
            tokens: pending.tokens.clone(),
        })
        .await;
    match insert {
        Ok(_) => {}
        // Concurrent verification inserted the link first.
        Err(e) if e.is_conflict() => {
            ctx.store.delete_pending_link(&pending.id).await?;
            return Err(VerifyLinkError::AlreadyLinked);
        }
        Err(e) => return Err(e.into()),
    }

    // Mark, then delete: an interruption in between leaves an auditable
    // verified row instead of a silent disappearance.
    ctx.store.mark_pending_link_verified(&pending.id, now).await?;
    ctx.store.delete_pending_link(&pending.id).await?;

    let swept = ctx.store.delete_expired_pending_links(now).await?;
    if swept > 0 {
        ctx.logger
            .debug(&format!("garbage-collected {swept} expired pending links"));
    }

    ctx.logger.info(&format!(
        "confirmed {} link after password verification",
        pending.provider
    ));

    Ok(LinkConfirmed {
        provider: pending.provider,
    })
}
