// Email/password sign-in.
//
// Unknown emails and wrong passwords both collapse into the generic
// `InvalidCredentials` failure. Accounts that exist but cannot do password
// sign-in get differentiated variants so the edge can drive the
// password-setup flow; whether to surface that distinction to an
// unauthenticated caller (it reveals account existence) is the edge's
// decision, not made here.

use stellar_auth_core::error::StoreError;

use crate::context::AuthContext;
use crate::crypto::password::{hash_password, verify_password};
use crate::session::SessionUser;

/// Typed failures of credentials sign-in.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    /// Unknown email or wrong password; deliberately indistinguishable.
    #[error("invalid email or password")]
    InvalidCredentials,
    /// The account exists but was created through OAuth and has no
    /// password. Carries the linked provider names for the setup prompt.
    #[error("account signs in through {}", providers.join(", "))]
    OAuthOnlyAccount { providers: Vec<String> },
    /// The account has neither a password nor any OAuth link.
    #[error("no password set for this account")]
    PasswordNotSet,
    #[error("stored password hash is unusable: {0}")]
    BadStoredHash(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Authenticate an email/password pair and produce session claims.
pub async fn authorize_credentials(
    ctx: &AuthContext,
    email: &str,
    password: &str,
) -> Result<SessionUser, CredentialsError> {
    let email = email.to_lowercase();

    let user = match ctx.store.find_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            // Burn a hash so unknown emails answer in the same time as
            // known ones.
            let _ = hash_password(password, ctx.password_config.bcrypt_cost);
            return Err(CredentialsError::InvalidCredentials);
        }
    };

    let hash = match user.password_hash.as_deref() {
        Some(hash) => hash,
        None => {
            let links = ctx.store.list_account_links(&user.id).await?;
            if links.is_empty() {
                return Err(CredentialsError::PasswordNotSet);
            }
            // Newest-first, one entry per provider.
            let mut providers: Vec<String> = Vec::new();
            for link in links {
                if !providers.contains(&link.provider) {
                    providers.push(link.provider);
                }
            }
            return Err(CredentialsError::OAuthOnlyAccount { providers });
        }
    };

    let valid = verify_password(password, hash)
        .map_err(|e| CredentialsError::BadStoredHash(e.to_string()))?;
    if !valid {
        return Err(CredentialsError::InvalidCredentials);
    }

    Ok(SessionUser::from_user(&user))
}
