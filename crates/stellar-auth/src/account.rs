// Linked-provider listing for the account settings page.

use stellar_auth_core::error::StoreError;
use stellar_auth_core::model::LinkedProvider;

use crate::context::AuthContext;

/// Providers linked to a user, newest first.
pub async fn linked_providers(
    ctx: &AuthContext,
    user_id: &str,
) -> Result<Vec<LinkedProvider>, StoreError> {
    let links = ctx.store.list_account_links(user_id).await?;
    Ok(links
        .into_iter()
        .map(|link| LinkedProvider {
            provider: link.provider,
            created_at: link.created_at,
        })
        .collect())
}
