// Error taxonomy for the persistence boundary.
//
// Store backends surface every failure through `StoreError`; the engine maps
// these into per-flow outcome types. A `Conflict` is how a backend reports a
// uniqueness-constraint violation — the engine treats it as "already exists",
// never as a fatal error. `Backend` failures are always fatal to the request.

use std::fmt;

/// Classification of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// The requested record does not exist.
    NotFound,
    /// A uniqueness constraint rejected the write (duplicate link, concurrent
    /// insert). Callers route this to their "already exists" branch.
    Conflict,
    /// The backend itself failed (connection, query, serialization).
    Backend,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::Backend => "backend failure",
        };
        write!(f, "{s}")
    }
}

/// An error from a `CredentialStore` implementation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("store error ({kind}): {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Conflict, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Backend, message)
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == StoreErrorKind::Conflict
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::backend(format!("{err:#}"))
    }
}

/// Result alias used throughout the store boundary.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_predicates() {
        assert!(StoreError::conflict("dup").is_conflict());
        assert!(!StoreError::conflict("dup").is_not_found());
        assert!(StoreError::not_found("missing").is_not_found());
        assert!(!StoreError::backend("boom").is_conflict());
    }

    #[test]
    fn test_display_includes_kind_and_message() {
        let err = StoreError::backend("connection refused");
        let text = err.to_string();
        assert!(text.contains("backend failure"));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn test_from_anyhow() {
        let err: StoreError = anyhow::anyhow!("pool exhausted").into();
        assert_eq!(err.kind, StoreErrorKind::Backend);
        assert!(err.message.contains("pool exhausted"));
    }
}
