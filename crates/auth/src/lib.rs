//! authwerk-auth – Credential-Lebenszyklus
//!
//! Dieses Crate implementiert:
//! - Registrierung mit optionaler E-Mail-Verifizierung
//! - Einloesen von Verifizierungsanfragen (einmalig, mit Ablauf)
//! - Anmeldung, Abmeldung und Session-Verwaltung
//! - Passwort-Reset und Zugriffswiderruf
//! - Passwort-Hashing mit Argon2id, HS256-Tokens, Mailversand im Hintergrund

pub mod config;
pub mod error;
pub mod mail;
pub mod password;
pub mod policy;
pub mod service;
pub mod session;
pub mod token;
pub mod types;

// Bequeme Re-Exporte
pub use config::AuthEinstellungen;
pub use error::{AuthError, AuthResult};
pub use mail::{MailAuftrag, MailDispatcher, MailVersand, ProtokollMailer};
pub use password::{Argon2Hasher, PasswortHasher};
pub use service::AuthService;
pub use session::{SessionStore, TokenSession};
pub use token::{JwtSigner, TokenClaims, TokenSigner};
pub use types::{
    AbmeldeEingabe, AnfrageKontext, AnmeldeEingabe, AuthAntwort, BenutzerAntwort,
    ErneutSendenEingabe, Meldung, PasswortVergessenEingabe, PasswortZuruecksetzenEingabe,
    RegistrierungsEingabe, VerifizierungsEingabe, ZugriffEingabe,
};
