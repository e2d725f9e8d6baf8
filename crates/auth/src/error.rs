//! Fehlertypen fuer den Credential-Lebenszyklus
//!
//! Die Anzeige-Texte gehen unveraendert an die Transportschicht und sind
//! deshalb englisch.

use authwerk_db::DbError;
use thiserror::Error;

/// Alle moeglichen Fehler im Auth-Service
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Eingaben ---
    #[error("{0}")]
    Validierung(String),

    #[error("{0}")]
    Konflikt(String),

    #[error("{0}")]
    NichtGefunden(String),

    #[error("{0}")]
    Abgelaufen(String),

    // --- Speicher ---
    #[error("storage unavailable: {0}")]
    NichtVerfuegbar(String),

    // --- Authentifizierung ---
    #[error("bad user credentials")]
    UngueltigeAnmeldedaten,

    #[error("user access has been revoked")]
    ZugriffWiderrufen,

    #[error("email not verified")]
    EmailNichtVerifiziert,

    #[error("invalid token")]
    TokenUngueltig,

    // --- Passwort ---
    #[error("password hashing failed: {0}")]
    PasswortHashing(String),

    // --- Intern ---
    #[error("internal error: {0}")]
    Intern(String),
}

impl AuthError {
    pub fn validierung(msg: impl Into<String>) -> Self {
        Self::Validierung(msg.into())
    }

    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Kurzbezeichnung fuer Metrik-Labels und Logs
    pub fn kategorie(&self) -> &'static str {
        match self {
            Self::Validierung(_) => "validierung",
            Self::Konflikt(_) => "konflikt",
            Self::NichtGefunden(_) => "nicht_gefunden",
            Self::Abgelaufen(_) => "abgelaufen",
            Self::NichtVerfuegbar(_) => "nicht_verfuegbar",
            Self::UngueltigeAnmeldedaten => "ungueltige_anmeldedaten",
            Self::ZugriffWiderrufen => "widerrufen",
            Self::EmailNichtVerifiziert => "nicht_verifiziert",
            Self::TokenUngueltig => "token_ungueltig",
            Self::PasswortHashing(_) | Self::Intern(_) => "intern",
        }
    }
}

impl From<DbError> for AuthError {
    fn from(e: DbError) -> Self {
        if e.ist_nicht_gefunden() {
            Self::NichtGefunden(e.to_string())
        } else if e.ist_eindeutigkeit() {
            Self::Konflikt(e.to_string())
        } else if e.ist_nicht_verfuegbar() {
            Self::NichtVerfuegbar(e.to_string())
        } else {
            Self::Intern(e.to_string())
        }
    }
}

/// Result-Alias fuer den Auth-Service
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_fehler_abbilden() {
        assert!(matches!(
            AuthError::from(DbError::nicht_gefunden("Benutzer x")),
            AuthError::NichtGefunden(_)
        ));
        assert!(matches!(
            AuthError::from(DbError::eindeutigkeit("email")),
            AuthError::Konflikt(_)
        ));
        assert!(matches!(
            AuthError::from(DbError::NichtVerfuegbar("pool".into())),
            AuthError::NichtVerfuegbar(_)
        ));
        assert!(matches!(
            AuthError::from(DbError::intern("kaputt")),
            AuthError::Intern(_)
        ));
    }

    #[test]
    fn meldungen_gehen_unveraendert_durch() {
        let e = AuthError::validierung("password and confirm password does not match");
        assert_eq!(e.to_string(), "password and confirm password does not match");
        assert_eq!(AuthError::ZugriffWiderrufen.to_string(), "user access has been revoked");
        assert_eq!(e.kategorie(), "validierung");
    }
}
