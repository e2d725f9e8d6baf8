//! authwerk-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von Datenbank-, Auth- und
//! Server-Crate gemeinsam genutzt werden: Paginierung, Verifizierungszwecke,
//! Signup-Methoden, Rollenlisten und den prozessweiten Fehlertyp.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::AuthwerkError;
pub use types::{Paginierung, Seite, SignupMethode, VerifizierungsZweck};
