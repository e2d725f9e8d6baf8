//! Fehlertypen fuer Authwerk
//!
//! Prozessweiter Fehler fuer Start und Konfiguration. Die Fach-Crates
//! definieren eigene Fehler (`DbError`, `AuthError`); der Server reicht
//! sie ueber `anyhow` an den Prozessrand durch.

use thiserror::Error;

/// Fehlerzustaende beim Zusammenbau des Prozesses
#[derive(Debug, Error)]
pub enum AuthwerkError {
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}
