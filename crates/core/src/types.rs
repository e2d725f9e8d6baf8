//! Gemeinsame Typen fuer Authwerk
//!
//! Paginierung fuer Listenabfragen, Zweck-Kennungen fuer
//! Verifizierungsanfragen und die kommagetrennte Rollenliste.

use serde::{Deserialize, Serialize};

/// Standard-Seitengroesse fuer Listenabfragen
pub const STANDARD_LIMIT: u64 = 10;

/// Obergrenze fuer eine einzelne Seite
pub const MAX_LIMIT: u64 = 1000;

/// Groesster Offset, den alle Backends ohne Ueberlauf darstellen
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// Offset/Limit-Paginierung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginierung {
    pub limit: u64,
    pub offset: u64,
}

impl Default for Paginierung {
    fn default() -> Self {
        Self {
            limit: STANDARD_LIMIT,
            offset: 0,
        }
    }
}

impl Paginierung {
    pub fn neu(limit: u64, offset: u64) -> Self {
        Self { limit, offset }.begrenzt()
    }

    /// Paginierung fuer eine 1-basierte Seitennummer
    pub fn seite(seite: u64, limit: u64) -> Self {
        let limit = limit.clamp(1, MAX_LIMIT);
        Self {
            limit,
            offset: seite.saturating_sub(1).saturating_mul(limit).min(MAX_OFFSET),
        }
    }

    /// Limit auf 1..=MAX_LIMIT, Offset auf MAX_OFFSET begrenzen
    pub fn begrenzt(self) -> Self {
        Self {
            limit: self.limit.clamp(1, MAX_LIMIT),
            offset: self.offset.min(MAX_OFFSET),
        }
    }

    /// Offset als SQL-Parameter; ein Offset hinter dem Ende bleibt hinter dem Ende
    pub fn offset_i64(&self) -> i64 {
        i64::try_from(self.offset).unwrap_or(i64::MAX)
    }

    /// Wendet die Paginierung auf eine bereits sortierte Liste an
    pub fn anwenden<T>(&self, eintraege: Vec<T>) -> Vec<T> {
        eintraege
            .into_iter()
            .skip(usize::try_from(self.offset).unwrap_or(usize::MAX))
            .take(self.limit as usize)
            .collect()
    }
}

/// Eine Ergebnisseite samt Gesamtanzahl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seite<T> {
    pub eintraege: Vec<T>,
    pub gesamt: u64,
    pub paginierung: Paginierung,
}

impl<T> Seite<T> {
    pub fn leer(paginierung: Paginierung) -> Self {
        Self {
            eintraege: Vec::new(),
            gesamt: 0,
            paginierung,
        }
    }
}

/// Zweck einer Verifizierungsanfrage (Spalte `identifier`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifizierungsZweck {
    BasicSignup,
    ForgotPassword,
    UpdateEmail,
    MagicLinkLogin,
}

impl VerifizierungsZweck {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::BasicSignup => "basic_signup",
            Self::ForgotPassword => "forgot_password",
            Self::UpdateEmail => "update_email",
            Self::MagicLinkLogin => "magic_link_login",
        }
    }
}

impl std::fmt::Display for VerifizierungsZweck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

impl std::str::FromStr for VerifizierungsZweck {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic_signup" => Ok(Self::BasicSignup),
            "forgot_password" => Ok(Self::ForgotPassword),
            "update_email" => Ok(Self::UpdateEmail),
            "magic_link_login" => Ok(Self::MagicLinkLogin),
            other => Err(format!("Unbekannter Verifizierungszweck: {other}")),
        }
    }
}

/// Registrierungsweg eines Benutzers (Spalte `signup_methods`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupMethode {
    BasicAuth,
    MagicLinkLogin,
}

impl SignupMethode {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::BasicAuth => "basic_auth",
            Self::MagicLinkLogin => "magic_link_login",
        }
    }
}

impl std::fmt::Display for SignupMethode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

/// Verbindet Rollen zur gespeicherten, kommagetrennten Form
pub fn rollen_verbinden<S: AsRef<str>>(rollen: &[S]) -> String {
    rollen
        .iter()
        .map(|r| r.as_ref().trim())
        .filter(|r| !r.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Zerlegt die gespeicherte Rollenliste
pub fn rollen_teilen(rollen: &str) -> Vec<String> {
    rollen
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}
