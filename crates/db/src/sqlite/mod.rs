//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod env;
pub mod pool;
pub mod sessions;
pub mod users;
pub mod verifications;
pub(crate) mod zeilen;

pub use pool::SqliteDb;
