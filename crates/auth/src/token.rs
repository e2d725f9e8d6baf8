//! Signierte Tokens (HS256-JWT)
//!
//! Access-, Refresh- und Verifizierungs-Tokens teilen dasselbe Claim-Set;
//! `zweck` unterscheidet sie.

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

pub const ZWECK_ACCESS: &str = "access_token";
pub const ZWECK_REFRESH: &str = "refresh_token";

/// Claims aller ausgestellten Tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Benutzer-ID
    pub sub: String,
    pub email: String,
    /// `access_token`, `refresh_token` oder ein Verifizierungszweck
    pub zweck: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    pub fn neu(
        sub: impl Into<String>,
        email: impl Into<String>,
        zweck: impl Into<String>,
        nonce: impl Into<String>,
        ausgestellt: DateTime<Utc>,
        ablauf: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: sub.into(),
            email: email.into(),
            zweck: zweck.into(),
            roles: Vec::new(),
            nonce: nonce.into(),
            redirect_uri: None,
            iat: ausgestellt.timestamp(),
            exp: ablauf.timestamp(),
        }
    }

    pub fn mit_rollen(mut self, rollen: Vec<String>) -> Self {
        self.roles = rollen;
        self
    }

    pub fn mit_redirect(mut self, redirect_uri: Option<String>) -> Self {
        self.redirect_uri = redirect_uri;
        self
    }
}

/// Signiert und prueft Tokens
pub trait TokenSigner: Send + Sync {
    fn signieren(&self, claims: &TokenClaims) -> AuthResult<String>;

    /// Prueft Signatur und Ablauf; abgelaufene Tokens ergeben `Abgelaufen`
    fn parsen(&self, token: &str) -> AuthResult<TokenClaims>;
}

/// HMAC-SHA256-Signierer mit gemeinsamem Geheimnis
pub struct JwtSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtSigner {
    pub fn neu(geheimnis: &str) -> AuthResult<Self> {
        if geheimnis.trim().is_empty() {
            return Err(AuthError::validierung("jwt secret must not be empty"));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Ok(Self {
            encoding: EncodingKey::from_secret(geheimnis.as_bytes()),
            decoding: DecodingKey::from_secret(geheimnis.as_bytes()),
            validation,
        })
    }
}

impl TokenSigner for JwtSigner {
    fn signieren(&self, claims: &TokenClaims) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::intern(format!("Token-Signatur fehlgeschlagen: {e}")))
    }

    fn parsen(&self, token: &str) -> AuthResult<TokenClaims> {
        decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map(|daten| daten.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Abgelaufen("token expired".into()),
                _ => {
                    tracing::debug!(fehler = %e, "Token abgelehnt");
                    AuthError::TokenUngueltig
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(ablauf: DateTime<Utc>) -> TokenClaims {
        TokenClaims::neu(
            "3f0c7a4e-0000-4000-8000-000000000001",
            "a@example.com",
            ZWECK_ACCESS,
            "nonce-1",
            Utc::now(),
            ablauf,
        )
        .mit_rollen(vec!["user".into()])
    }

    #[test]
    fn signieren_und_parsen() {
        let signer = JwtSigner::neu("geheim").unwrap();
        let erwartet = claims(Utc::now() + Duration::minutes(5));
        let token = signer.signieren(&erwartet).unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(signer.parsen(&token).unwrap(), erwartet);
    }

    #[test]
    fn abgelaufenes_token() {
        let signer = JwtSigner::neu("geheim").unwrap();
        let token = signer
            .signieren(&claims(Utc::now() - Duration::minutes(1)))
            .unwrap();
        assert!(matches!(signer.parsen(&token), Err(AuthError::Abgelaufen(_))));
    }

    #[test]
    fn fremdes_geheimnis_wird_abgelehnt() {
        let token = JwtSigner::neu("eins")
            .unwrap()
            .signieren(&claims(Utc::now() + Duration::minutes(5)))
            .unwrap();
        let anderer = JwtSigner::neu("zwei").unwrap();
        assert!(matches!(anderer.parsen(&token), Err(AuthError::TokenUngueltig)));
        assert!(matches!(anderer.parsen("kein.jwt"), Err(AuthError::TokenUngueltig)));
    }

    #[test]
    fn leeres_geheimnis_abgelehnt() {
        assert!(matches!(JwtSigner::neu("  "), Err(AuthError::Validierung(_))));
    }

    #[test]
    fn redirect_nur_wenn_gesetzt() {
        let ohne = serde_json::to_value(claims(Utc::now())).unwrap();
        assert!(ohne.get("redirect_uri").is_none());

        let mit = claims(Utc::now()).mit_redirect(Some("https://app.example.com".into()));
        let json = serde_json::to_value(mit).unwrap();
        assert_eq!(json["redirect_uri"], "https://app.example.com");
    }
}
