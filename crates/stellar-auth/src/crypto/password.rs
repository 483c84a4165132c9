// Password hashing.
//
// bcrypt with a configurable work factor (production default: cost 12).
// Verification is constant-time inside the bcrypt crate.

/// Failure while hashing or verifying.
#[derive(Debug, thiserror::Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordHashError(#[from] bcrypt::BcryptError);

/// Hash a password at the given bcrypt cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, PasswordHashError> {
    Ok(bcrypt::hash(password, cost)?)
}

/// Verify a password against a hash produced by `hash_password`.
///
/// Returns `Ok(false)` on mismatch; `Err` only when the stored hash is
/// malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordHashError> {
    Ok(bcrypt::verify(password, hash)?)
}
