// The account-link resolver.
//
// Decides, for each OAuth sign-in assertion, whether to sign the user in
// immediately, create a new account, or stage a pending link that must be
// confirmed with the account password before it takes effect.
//
// The security invariant: an assertion for a provider account not yet
// linked to a password-protected user NEVER produces an immediate link.
// Auto-linking is only safe when the target account has no password,
// because then the provider-verified email is the account's sole proof of
// ownership anyway.

use chrono::Utc;

use stellar_auth_core::error::StoreError;
use stellar_auth_core::model::{NewAccountLink, NewPendingLink, NewUser, User, UserUpdate};

use crate::context::AuthContext;
use crate::oauth::{is_valid_email, OAuthAssertion, RejectReason, SignInOutcome};

/// Resolve an OAuth sign-in assertion against the credential store.
///
/// Outcomes:
/// - no user for the email: create user + link, sign in as a new user;
/// - link already present: refresh its tokens, sign in;
/// - user without a password: insert the link, sign in;
/// - user with a password: upsert a time-boxed pending link and require
///   verification.
///
/// Every store failure aborts the attempt (fail closed); a uniqueness
/// conflict from a concurrent duplicate insert is treated as the
/// already-exists branch instead.
pub async fn resolve_oauth_sign_in(
    ctx: &AuthContext,
    assertion: OAuthAssertion,
) -> Result<SignInOutcome, StoreError> {
    if assertion.provider.is_empty() || assertion.provider_account_id.is_empty() {
        return Ok(SignInOutcome::Rejected {
            reason: RejectReason::InvalidProvider,
        });
    }
    if !is_valid_email(&assertion.email) {
        return Ok(SignInOutcome::Rejected {
            reason: RejectReason::InvalidEmail,
        });
    }

    // Emails are stored lowercase; normalize before every lookup.
    let email = assertion.email.to_lowercase();

    let existing = ctx.store.find_user_by_email(&email).await?;

    let user = match existing {
        Some(user) => user,
        None => {
            return register_new_user(ctx, &email, &assertion).await;
        }
    };

    if let Some(link) = ctx
        .store
        .find_account_link(&user.id, &assertion.provider, &assertion.provider_account_id)
        .await?
    {
        // Repeat sign-in: refresh the stored token material in place.
        ctx.store
            .update_account_link_tokens(&link.id, assertion.tokens.clone())
            .await?;
        backfill_avatar(ctx, &user, &assertion).await?;

        return Ok(SignInOutcome::SignedIn {
            user_id: user.id,
            newly_registered: false,
        });
    }

    if !user.has_password() {
        // OAuth-only account: safe to auto-link.
        let insert = ctx
            .store
            .insert_account_link(NewAccountLink {
                user_id: user.id.clone(),
                provider: assertion.provider.clone(),
                provider_account_id: assertion.provider_account_id.clone(),
                tokens: assertion.tokens.clone(),
            })
            .await;
        match insert {
            Ok(_) => {}
            // A concurrent sign-in won the insert; the link exists either way.
            Err(e) if e.is_conflict() => {
                ctx.logger
                    .debug("concurrent account link insert lost the race; continuing");
            }
            Err(e) => return Err(e),
        }
        backfill_avatar(ctx, &user, &assertion).await?;

        return Ok(SignInOutcome::SignedIn {
            user_id: user.id,
            newly_registered: false,
        });
    }

    // The account is password-protected: stage the link behind a
    // re-authentication step instead of granting OAuth access silently.
    let expires_at = Utc::now() + ctx.linking_config.pending_ttl;
    ctx.store
        .upsert_pending_link(NewPendingLink {
            user_id: user.id.clone(),
            provider: assertion.provider.clone(),
            provider_account_id: assertion.provider_account_id.clone(),
            provider_email: email.clone(),
            tokens: assertion.tokens,
            expires_at,
        })
        .await?;

    ctx.logger.info(&format!(
        "staged pending {} link for password-protected account",
        assertion.provider
    ));

    Ok(SignInOutcome::VerificationRequired {
        email,
        provider: assertion.provider,
    })
}

async fn register_new_user(
    ctx: &AuthContext,
    email: &str,
    assertion: &OAuthAssertion,
) -> Result<SignInOutcome, StoreError> {
    let created = ctx
        .store
        .create_user(NewUser {
            email: email.to_string(),
            name: assertion.name.clone().unwrap_or_default(),
            avatar_url: assertion.avatar_url.clone(),
            // The provider vouched for the address during its own flow.
            email_verified: true,
        })
        .await;

    let user = match created {
        Ok(user) => user,
        // Concurrent first sign-in created the user between lookup and
        // insert; fetch the winner and link against it.
        Err(e) if e.is_conflict() => ctx
            .store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| StoreError::backend("user vanished after create conflict"))?,
        Err(e) => return Err(e),
    };

    let insert = ctx
        .store
        .insert_account_link(NewAccountLink {
            user_id: user.id.clone(),
            provider: assertion.provider.clone(),
            provider_account_id: assertion.provider_account_id.clone(),
            tokens: assertion.tokens.clone(),
        })
        .await;
    match insert {
        Ok(_) => {}
        Err(e) if e.is_conflict() => {}
        Err(e) => return Err(e),
    }

    Ok(SignInOutcome::SignedIn {
        user_id: user.id,
        newly_registered: true,
    })
}

/// Copy the provider avatar onto the user when the profile has none.
async fn backfill_avatar(
    ctx: &AuthContext,
    user: &User,
    assertion: &OAuthAssertion,
) -> Result<(), StoreError> {
    if user.avatar_url.is_none() {
        if let Some(url) = &assertion.avatar_url {
            ctx.store
                .update_user(&user.id, UserUpdate::avatar(url.clone()))
                .await?;
        }
    }
    Ok(())
}
