//! Einstellungen des Auth-Service
//!
//! Werden vom Server aus der `[auth]`-Sektion der TOML-Konfiguration
//! gelesen und explizit an [`crate::AuthService::neu`] uebergeben.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Obergrenze fuer Token-Lebensdauern (zehn Jahre)
const MAX_LEBENSDAUER_SEKUNDEN: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEinstellungen {
    /// Registrierung und Anmeldung per E-Mail/Passwort abschalten
    pub basic_auth_deaktiviert: bool,
    /// Neue Konten sofort als verifiziert anlegen
    pub email_verifizierung_deaktiviert: bool,
    /// Allowlist fuer angefragte Rollen
    pub rollen: Vec<String>,
    /// Rollen fuer Registrierungen ohne Rollenangabe
    pub standard_rollen: Vec<String>,
    /// HS256-Geheimnis fuer alle ausgestellten Tokens
    pub jwt_geheimnis: String,
    pub access_token_sekunden: u64,
    pub refresh_token_sekunden: u64,
    /// Standard-Frist fuer Speicherzugriffe einer Anfrage
    pub frist_ms: u64,
    /// Frist fuer einen einzelnen Mailversand
    pub mail_frist_ms: u64,
    /// Kapazitaet der Mail-Warteschlange
    pub mail_warteschlange: usize,
    /// Ziel fuer Verifizierungslinks ohne eigene redirect_uri
    pub app_url: Option<String>,
}

impl Default for AuthEinstellungen {
    fn default() -> Self {
        Self {
            basic_auth_deaktiviert: false,
            email_verifizierung_deaktiviert: false,
            rollen: vec!["user".into(), "admin".into()],
            standard_rollen: vec!["user".into()],
            jwt_geheimnis: String::new(),
            access_token_sekunden: 30 * 60,
            refresh_token_sekunden: 30 * 24 * 60 * 60,
            frist_ms: 5_000,
            mail_frist_ms: 10_000,
            mail_warteschlange: 256,
            app_url: None,
        }
    }
}

impl AuthEinstellungen {
    pub fn frist(&self) -> Duration {
        Duration::from_millis(self.frist_ms)
    }

    pub fn mail_frist(&self) -> Duration {
        Duration::from_millis(self.mail_frist_ms)
    }

    /// Konsistenzpruefung beim Start
    pub fn pruefen(&self) -> AuthResult<()> {
        if self.jwt_geheimnis.trim().is_empty() {
            return Err(AuthError::validierung("auth.jwt_geheimnis fehlt"));
        }
        for sekunden in [self.access_token_sekunden, self.refresh_token_sekunden] {
            if sekunden == 0 || sekunden > MAX_LEBENSDAUER_SEKUNDEN {
                return Err(AuthError::validierung(format!(
                    "Token-Lebensdauer {sekunden}s ausserhalb von 1..={MAX_LEBENSDAUER_SEKUNDEN}"
                )));
            }
        }
        if self.frist_ms == 0 {
            return Err(AuthError::validierung("auth.frist_ms muss groesser als 0 sein"));
        }
        if let Some(rolle) = self
            .standard_rollen
            .iter()
            .find(|r| !self.rollen.contains(r))
        {
            return Err(AuthError::validierung(format!(
                "Standardrolle '{rolle}' fehlt in auth.rollen"
            )));
        }
        Ok(())
    }
}
