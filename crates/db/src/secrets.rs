//! Verschluesseltes TLS-Material fuer Datenbankverbindungen
//!
//! Zertifikat, Schluessel und CA liegen in der Konfiguration als
//! Base64(nonce ‖ ciphertext) vor, verschluesselt mit AES-256-GCM.
//! Der Schluessel selbst kommt Base64-kodiert aus `datenbank.geheimnis`.

use std::sync::Arc;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use rustls_pemfile::{certs, private_key};

use crate::error::DbError;
use crate::repository::{DatabaseConfig, DbResult};

const NONCE_LAENGE: usize = 12;

fn schluessel_laden(geheimnis_b64: &str) -> DbResult<Aes256Gcm> {
    let bytes = STANDARD
        .decode(geheimnis_b64.trim())
        .map_err(|e| DbError::Konfiguration(format!("Geheimnis ist kein Base64: {e}")))?;
    if bytes.len() != 32 {
        return Err(DbError::Konfiguration(format!(
            "Geheimnis muss 32 Bytes haben, hat {}",
            bytes.len()
        )));
    }
    Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&bytes)))
}

/// Verschluesselt Klartext zu Base64(nonce ‖ ciphertext)
pub fn verschluesseln_b64(klartext: &[u8], geheimnis_b64: &str) -> DbResult<String> {
    let cipher = schluessel_laden(geheimnis_b64)?;

    let mut nonce_bytes = [0u8; NONCE_LAENGE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), klartext)
        .map_err(|e| DbError::intern(format!("Verschluesselung fehlgeschlagen: {e}")))?;

    let mut ausgabe = Vec::with_capacity(NONCE_LAENGE + ciphertext.len());
    ausgabe.extend_from_slice(&nonce_bytes);
    ausgabe.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(ausgabe))
}

/// Entschluesselt Base64(nonce ‖ ciphertext)
pub fn entschluesseln_b64(daten_b64: &str, geheimnis_b64: &str) -> DbResult<Vec<u8>> {
    let cipher = schluessel_laden(geheimnis_b64)?;

    let daten = STANDARD
        .decode(daten_b64.trim())
        .map_err(|e| DbError::Konfiguration(format!("TLS-Material ist kein Base64: {e}")))?;
    if daten.len() <= NONCE_LAENGE {
        return Err(DbError::Konfiguration("TLS-Material zu kurz".into()));
    }

    let (nonce, ciphertext) = daten.split_at(NONCE_LAENGE);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| DbError::Konfiguration("TLS-Material konnte nicht entschluesselt werden".into()))
}

/// Entschluesseltes TLS-Material (PEM)
pub struct TlsMaterial {
    zertifikat: Vec<CertificateDer<'static>>,
    schluessel: PrivateKeyDer<'static>,
    ca: Vec<CertificateDer<'static>>,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("zertifikate", &self.zertifikat.len())
            .field("ca", &self.ca.len())
            .finish_non_exhaustive()
    }
}

impl TlsMaterial {
    /// Entschluesselt das konfigurierte Material
    ///
    /// Liefert `None` wenn kein TLS konfiguriert ist oder ein Teil leer ist.
    pub fn aus_config(config: &DatabaseConfig) -> DbResult<Option<Self>> {
        let Some(tls) = &config.tls else {
            return Ok(None);
        };
        if tls.zertifikat.is_empty() || tls.schluessel.is_empty() || tls.ca_zertifikat.is_empty() {
            return Ok(None);
        }
        let geheimnis = config.geheimnis.as_deref().ok_or_else(|| {
            DbError::Konfiguration("TLS-Material ohne datenbank.geheimnis".into())
        })?;

        let zertifikat_pem = entschluesseln_b64(&tls.zertifikat, geheimnis)?;
        let schluessel_pem = entschluesseln_b64(&tls.schluessel, geheimnis)?;
        let ca_pem = entschluesseln_b64(&tls.ca_zertifikat, geheimnis)?;

        Self::aus_pem(&zertifikat_pem, &schluessel_pem, &ca_pem).map(Some)
    }

    pub fn aus_pem(zertifikat: &[u8], schluessel: &[u8], ca: &[u8]) -> DbResult<Self> {
        Ok(Self {
            zertifikat: zertifikate_parsen(zertifikat)?,
            schluessel: schluessel_parsen(schluessel)?,
            ca: zertifikate_parsen(ca)?,
        })
    }

    /// Baut eine rustls-Client-Konfiguration mit Client-Zertifikat
    pub fn client_config(self) -> DbResult<Arc<ClientConfig>> {
        let mut roots = RootCertStore::empty();
        for ca in self.ca {
            roots
                .add(ca)
                .map_err(|e| DbError::Konfiguration(format!("CA-Zertifikat ungueltig: {e}")))?;
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| DbError::Konfiguration(format!("TLS-Protokolle: {e}")))?
            .with_root_certificates(roots)
            .with_client_auth_cert(self.zertifikat, self.schluessel)
            .map_err(|e| DbError::Konfiguration(format!("Client-Zertifikat: {e}")))?;

        Ok(Arc::new(config))
    }
}

fn zertifikate_parsen(pem: &[u8]) -> DbResult<Vec<CertificateDer<'static>>> {
    let mut cursor = std::io::Cursor::new(pem);
    let liste = certs(&mut cursor)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DbError::Konfiguration(format!("Zertifikat-Parsing fehlgeschlagen: {e}")))?;
    if liste.is_empty() {
        return Err(DbError::Konfiguration("Kein Zertifikat gefunden".into()));
    }
    Ok(liste)
}

fn schluessel_parsen(pem: &[u8]) -> DbResult<PrivateKeyDer<'static>> {
    let mut cursor = std::io::Cursor::new(pem);
    private_key(&mut cursor)
        .map_err(|e| DbError::Konfiguration(format!("Schluessel-Parsing fehlgeschlagen: {e}")))?
        .ok_or_else(|| DbError::Konfiguration("Kein privater Schluessel gefunden".into()))
}
