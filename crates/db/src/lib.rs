//! authwerk-db – Speicher-Abstraktion
//!
//! Dieses Crate stellt das Repository-Pattern bereit, das die Backends
//! hinter einer einheitlichen Schnittstelle abstrahiert: SQLite
//! (relational), Cassandra/ScyllaDB (Wide-Column, Feature `cassandra`)
//! und ein fluechtiger In-Process-Speicher fuer Tests und Entwicklung.
//!
//! # Verwendung
//!
//! ```no_run
//! use authwerk_db::{provider_oeffnen, DatabaseConfig};
//!
//! # async fn beispiel() -> authwerk_db::DbResult<()> {
//! let provider = provider_oeffnen(&DatabaseConfig::default()).await?;
//! provider.pruefen().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod models;
pub mod provider;
pub mod repository;
pub mod retry;
pub mod secrets;
pub mod speicher;
pub mod sqlite;

#[cfg(feature = "cassandra")]
pub mod cassandra;

pub use error::DbError;
pub use provider::{bezeichner_pruefen, provider_oeffnen};
pub use repository::{
    DatabaseBackend, DatabaseConfig, DbResult, EnvRepository, Provider, SessionRepository,
    UserRepository, VerificationRepository, VerschluesselteTls,
};
pub use speicher::SpeicherDb;
pub use sqlite::SqliteDb;

#[cfg(feature = "cassandra")]
pub use cassandra::CassandraDb;
