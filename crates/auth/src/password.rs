//! Passwort-Hashing mit Argon2id
//!
//! Der Lebenszyklus spricht nur den Trait [`PasswortHasher`] an; die
//! Standard-Implementierung ist Argon2id mit PHC-String-Ausgabe.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;

use crate::error::{AuthError, AuthResult};

/// Hasht und prueft Passwoerter
///
/// Implementierungen sind synchron und CPU-lastig; der Service ruft sie
/// ueber `spawn_blocking` auf.
pub trait PasswortHasher: Send + Sync {
    /// Gibt den selbstbeschreibenden Hash (inkl. Parameter und Salt) zurueck
    fn hashen(&self, passwort: &str) -> AuthResult<String>;

    /// `Ok(false)` bei falschem Passwort, `Err` nur bei kaputtem Hash
    fn verifizieren(&self, passwort: &str, hash: &str) -> AuthResult<bool>;
}

/// Argon2id-Hasher
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::neu()
    }
}

impl Argon2Hasher {
    /// Argon2id-Parameter gemaess OWASP-Empfehlungen:
    /// - Speicher: 64 MiB
    /// - Iterationen: 3
    /// - Parallelismus: 1
    pub fn neu() -> Self {
        Self {
            params: Params::new(64 * 1024, 3, 1, None).unwrap_or_default(),
        }
    }

    /// Eigene Kostenparameter (Speicher in KiB)
    pub fn mit_parametern(speicher_kib: u32, iterationen: u32, parallelitaet: u32) -> AuthResult<Self> {
        let params = Params::new(speicher_kib, iterationen, parallelitaet, None)
            .map_err(|e| AuthError::PasswortHashing(format!("Argon2-Parameter ungueltig: {e}")))?;
        Ok(Self { params })
    }

    fn instanz(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswortHasher for Argon2Hasher {
    fn hashen(&self, passwort: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.instanz()
            .hash_password(passwort.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::PasswortHashing(e.to_string()))
    }

    fn verifizieren(&self, passwort: &str, hash: &str) -> AuthResult<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::PasswortHashing(format!("Ungueltiges Hash-Format: {e}")))?;

        // Parameter stehen im Hash; auch alte Hashes mit anderen Kosten pruefbar
        match Argon2::default().verify_password(passwort.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::PasswortHashing(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guenstig() -> Argon2Hasher {
        Argon2Hasher::mit_parametern(8, 1, 1).unwrap()
    }

    #[test]
    fn passwort_hashen_und_verifizieren() {
        let hasher = guenstig();
        let hash = hasher.hashen("sicheres_passwort_123!").unwrap();

        assert!(hash.starts_with("$argon2id$"), "Hash muss mit $argon2id$ beginnen");
        assert!(hasher.verifizieren("sicheres_passwort_123!", &hash).unwrap());
        assert!(!hasher.verifizieren("falsches_passwort", &hash).unwrap());
    }

    #[test]
    fn gleiche_passwoerter_unterschiedliche_hashes() {
        let hasher = guenstig();
        assert_ne!(
            hasher.hashen("gleich").unwrap(),
            hasher.hashen("gleich").unwrap(),
            "Salt muss unterschiedliche Hashes erzeugen"
        );
    }

    #[test]
    fn fremde_kosten_werden_verifiziert() {
        let hash = guenstig().hashen("pw").unwrap();
        let anderer = Argon2Hasher::mit_parametern(16, 2, 1).unwrap();
        assert!(anderer.verifizieren("pw", &hash).unwrap());
    }

    #[test]
    fn ungueltiges_hash_format_gibt_fehler() {
        assert!(guenstig().verifizieren("pw", "kein_gueltiger_hash").is_err());
    }

    #[test]
    fn ungueltige_parameter_werden_abgelehnt() {
        assert!(Argon2Hasher::mit_parametern(1, 0, 1).is_err());
    }

    #[test]
    fn standard_parameter_sind_owasp() {
        let hasher = Argon2Hasher::neu();
        assert_eq!(hasher.params.m_cost(), 64 * 1024);
        assert_eq!(hasher.params.t_cost(), 3);
    }
}
