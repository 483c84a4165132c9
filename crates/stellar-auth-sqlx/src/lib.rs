// SQL credential store over `sqlx::Any`.
//
// One backend for both Postgres (production) and SQLite (integration
// tests) through a single runtime-polymorphic pool.

mod migration;
mod store;

pub use migration::apply_schema;
pub use store::SqlxCredentialStore;
