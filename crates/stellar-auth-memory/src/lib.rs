// In-memory credential store.
//
// Backs the engine's test suites and local development. Data lives in a
// `tokio::sync::RwLock` and dies with the process.

mod store;

pub use store::MemoryCredentialStore;
