// Shared types for the Stellar forum authentication core.
//
// This crate carries everything the engine and the store backends agree on:
// the data model, the `CredentialStore` trait, the error taxonomy, runtime
// options, and the logger. It contains no flow logic of its own.

pub mod error;
pub mod logger;
pub mod model;
pub mod options;
pub mod store;

pub use error::{StoreError, StoreErrorKind, StoreResult};
pub use options::AuthOptions;
pub use store::CredentialStore;
