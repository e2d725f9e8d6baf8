//! Auth-Service fuer Authwerk
//!
//! Zentraler Einstiegspunkt fuer den Credential-Lebenszyklus:
//! Registrierung, Einloesen von Verifizierungsanfragen, Anmeldung,
//! Abmeldung, Passwort-Reset und Zugriffswiderruf.
//!
//! Jeder Speicherzugriff einer Anfrage laeuft unter derselben Frist
//! (`AnfrageKontext::frist`); der Service selbst wiederholt nichts.

use std::future::Future;
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tokio::time::Instant;
use uuid::Uuid;

use authwerk_core::types::{rollen_teilen, rollen_verbinden, SignupMethode, VerifizierungsZweck};
use authwerk_db::{
    models::{
        email_normalisieren, jetzt, BenutzerRecord, NeueSession, NeueVerifizierung,
        NeuerBenutzer, SessionRecord, VerifizierungRecord,
    },
    DbResult, Provider,
};
use authwerk_observability::AuthwerkMetrics;

use crate::{
    config::AuthEinstellungen,
    error::{AuthError, AuthResult},
    mail::{MailAuftrag, MailDispatcher},
    password::{Argon2Hasher, PasswortHasher},
    policy,
    session::{SessionStore, TokenSession},
    token::{JwtSigner, TokenClaims, TokenSigner, ZWECK_ACCESS, ZWECK_REFRESH},
    types::{
        AbmeldeEingabe, AnfrageKontext, AnmeldeEingabe, AuthAntwort, BenutzerAntwort,
        ErneutSendenEingabe, Meldung, PasswortVergessenEingabe, PasswortZuruecksetzenEingabe,
        RegistrierungsEingabe, VerifizierungsEingabe, ZugriffEingabe,
    },
};

pub const MELDUNG_VERIFIZIERUNG_GESENDET: &str =
    "Verification email has been sent. Please check your inbox";
pub const MELDUNG_REGISTRIERT: &str = "Signed up successfully.";
pub const MELDUNG_VERIFIZIERT: &str = "Email verified successfully.";
pub const MELDUNG_ANGEMELDET: &str = "Logged in successfully.";
pub const MELDUNG_ABGEMELDET: &str = "Logged out successfully.";
pub const MELDUNG_ERNEUT_GESENDET: &str =
    "Verification email has been resent. Please check your inbox";
pub const MELDUNG_PASSWORT_VERGESSEN: &str =
    "Please check your inbox! We have sent a password reset link.";
pub const MELDUNG_PASSWORT_GEAENDERT: &str = "Password updated successfully.";
pub const MELDUNG_WIDERRUFEN: &str = "user access revoked successfully";
pub const MELDUNG_WIEDERHERGESTELLT: &str = "user access enabled successfully";

const BASIC_AUTH_DEAKTIVIERT: &str = "basic authentication is disabled for this instance";
const PASSWOERTER_UNGLEICH: &str = "password and confirm password does not match";
const EMAIL_UNGUELTIG: &str = "invalid email address";

/// Zwecke, die ueber `email_verifizieren` eingeloest werden
const EMAIL_ZWECKE: [VerifizierungsZweck; 3] = [
    VerifizierungsZweck::BasicSignup,
    VerifizierungsZweck::MagicLinkLogin,
    VerifizierungsZweck::UpdateEmail,
];

/// Meldung fuer eine bereits belegte E-Mail
///
/// Unterscheidet verifizierte und unverifizierte Konten und verraet damit
/// den Kontostatus.
fn bereits_registriert(email: &str, verifiziert: bool) -> AuthError {
    if verifiziert {
        AuthError::Konflikt(format!("{email} has already signed up"))
    } else {
        AuthError::Konflikt(format!(
            "{email} has already signed up. please complete the email verification process or reset the password"
        ))
    }
}

/// Haengt eine Signup-Methode an die kommagetrennte Liste an (None wenn schon enthalten)
fn methode_ergaenzen(methoden: &str, methode: SignupMethode) -> Option<String> {
    let mut liste = rollen_teilen(methoden);
    if liste.iter().any(|m| m == methode.als_str()) {
        return None;
    }
    liste.push(methode.als_str().to_string());
    Some(rollen_verbinden(&liste))
}

/// Ausgestellte Access-/Refresh-Tokens einer neuen Session
struct AusgestellteTokens {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
}

impl AusgestellteTokens {
    fn antwort(self, message: &str, benutzer: &BenutzerRecord) -> AuthAntwort {
        AuthAntwort {
            message: message.to_string(),
            access_token: Some(self.access_token),
            refresh_token: Some(self.refresh_token),
            expires_at: Some(self.expires_at),
            user: Some(BenutzerAntwort::from(benutzer)),
        }
    }
}

/// Auth-Service – zentraler Einstiegspunkt fuer alle Authentifizierungsvorgaenge
pub struct AuthService {
    provider: Arc<dyn Provider>,
    hasher: Arc<dyn PasswortHasher>,
    signer: Arc<dyn TokenSigner>,
    sessions: Arc<SessionStore>,
    mail: MailDispatcher,
    einstellungen: AuthEinstellungen,
    metriken: Option<AuthwerkMetrics>,
}

impl AuthService {
    /// Erstellt den Service mit Argon2id-Hasher und HS256-Signierer
    pub fn neu(
        provider: Arc<dyn Provider>,
        einstellungen: AuthEinstellungen,
        mail: MailDispatcher,
    ) -> AuthResult<Self> {
        einstellungen.pruefen()?;
        let signer = JwtSigner::neu(&einstellungen.jwt_geheimnis)?;
        Ok(Self {
            provider,
            hasher: Arc::new(Argon2Hasher::neu()),
            signer: Arc::new(signer),
            sessions: SessionStore::neu(),
            mail,
            einstellungen,
            metriken: None,
        })
    }

    pub fn mit_hasher(mut self, hasher: Arc<dyn PasswortHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn mit_signer(mut self, signer: Arc<dyn TokenSigner>) -> Self {
        self.signer = signer;
        self
    }

    pub fn mit_session_store(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn mit_metriken(mut self, metriken: AuthwerkMetrics) -> Self {
        self.metriken = Some(metriken);
        self
    }

    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn einstellungen(&self) -> &AuthEinstellungen {
        &self.einstellungen
    }

    // -----------------------------------------------------------------------
    // Registrierung
    // -----------------------------------------------------------------------

    /// Registriert einen neuen Benutzer per E-Mail und Passwort
    ///
    /// Mit aktiver E-Mail-Verifizierung entsteht eine `basic_signup`-Anfrage
    /// und die Antwort enthaelt keine Tokens. Ohne Verifizierung wird das
    /// Konto sofort verifiziert angelegt und eine Session ausgestellt.
    pub async fn registrieren(
        &self,
        eingabe: RegistrierungsEingabe,
        kontext: &AnfrageKontext,
    ) -> AuthResult<AuthAntwort> {
        let ergebnis = self.registrieren_intern(eingabe, kontext).await;
        if let Some(m) = &self.metriken {
            m.signup_zaehlen(match &ergebnis {
                Ok(a) if a.hat_tokens() => "ok",
                Ok(_) => "verifizierung_ausstehend",
                Err(e) => e.kategorie(),
            });
        }
        ergebnis
    }

    async fn registrieren_intern(
        &self,
        eingabe: RegistrierungsEingabe,
        kontext: &AnfrageKontext,
    ) -> AuthResult<AuthAntwort> {
        if self.einstellungen.basic_auth_deaktiviert {
            return Err(AuthError::validierung(BASIC_AUTH_DEAKTIVIERT));
        }
        if eingabe.password != eingabe.confirm_password {
            return Err(AuthError::validierung(PASSWOERTER_UNGLEICH));
        }
        let email = email_normalisieren(&eingabe.email);
        if !policy::email_gueltig(&email) {
            return Err(AuthError::validierung(EMAIL_UNGUELTIG));
        }
        let bis = self.frist_bis(kontext);

        match self
            .speicher(bis, "get_user_by_email", self.provider.get_user_by_email(&email))
            .await
        {
            Ok(bestehend) => return Err(bereits_registriert(&email, bestehend.ist_verifiziert())),
            Err(AuthError::NichtGefunden(_)) => {}
            Err(e) => return Err(e),
        }

        let rollen = match eingabe.roles {
            Some(rollen) if !rollen.is_empty() => {
                if !policy::rollen_erlaubt(&rollen, &self.einstellungen.rollen) {
                    return Err(AuthError::validierung("invalid roles"));
                }
                rollen
            }
            _ => self.einstellungen.standard_rollen.clone(),
        };

        let hash = self.passwort_hashen(&eingabe.password).await?;
        let verifizierung_noetig = !self.einstellungen.email_verifizierung_deaktiviert;

        let neu = NeuerBenutzer {
            id: None,
            email: email.clone(),
            password: Some(hash),
            email_verified_at: (!verifizierung_noetig).then(jetzt),
            signup_methods: SignupMethode::BasicAuth.als_str().to_string(),
            profil: eingabe.profil,
            roles: rollen_verbinden(&rollen),
        };

        let benutzer = match self
            .speicher(bis, "create_user", self.provider.create_user(neu))
            .await
        {
            Ok(b) => b,
            // paralleler Gewinner hat dieselben Einstellungen durchlaufen
            Err(AuthError::Konflikt(_)) => {
                return Err(bereits_registriert(&email, !verifizierung_noetig))
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            user_id = %benutzer.id,
            email = %benutzer.email,
            verifizierung = verifizierung_noetig,
            "Neuer Benutzer registriert"
        );

        if verifizierung_noetig {
            self.verifizierung_ausstellen(
                &benutzer,
                VerifizierungsZweck::BasicSignup,
                eingabe.redirect_uri,
                bis,
            )
            .await?;
            return Ok(AuthAntwort::nur_meldung(
                MELDUNG_VERIFIZIERUNG_GESENDET,
                Some(BenutzerAntwort::from(&benutzer)),
            ));
        }

        let tokens = self
            .tokens_ausstellen(&benutzer, rollen, kontext, bis)
            .await?;
        Ok(tokens.antwort(MELDUNG_REGISTRIERT, &benutzer))
    }

    // -----------------------------------------------------------------------
    // Verifizierung
    // -----------------------------------------------------------------------

    /// Loest eine E-Mail-Verifizierungsanfrage ein und stellt eine Session aus
    pub async fn email_verifizieren(
        &self,
        eingabe: VerifizierungsEingabe,
        kontext: &AnfrageKontext,
    ) -> AuthResult<AuthAntwort> {
        let bis = self.frist_bis(kontext);
        let anfrage = self
            .anfrage_einloesen(&eingabe.token, &EMAIL_ZWECKE, bis)
            .await?;

        let mut benutzer = self
            .speicher(
                bis,
                "get_user_by_email",
                self.provider.get_user_by_email(&anfrage.email),
            )
            .await?;
        if benutzer.ist_widerrufen() {
            return Err(AuthError::ZugriffWiderrufen);
        }

        let mut geaendert = false;
        if benutzer.email_verified_at.is_none() {
            benutzer.email_verified_at = Some(jetzt());
            geaendert = true;
        }
        if anfrage.identifier == VerifizierungsZweck::MagicLinkLogin {
            if let Some(methoden) =
                methode_ergaenzen(&benutzer.signup_methods, SignupMethode::MagicLinkLogin)
            {
                benutzer.signup_methods = methoden;
                geaendert = true;
            }
        }
        if geaendert {
            benutzer = self
                .speicher(bis, "update_user", self.provider.update_user(benutzer))
                .await?;
        }

        tracing::info!(
            user_id = %benutzer.id,
            zweck = %anfrage.identifier,
            "Verifizierungsanfrage eingeloest"
        );

        let rollen = benutzer.rollen();
        let tokens = self
            .tokens_ausstellen(&benutzer, rollen, kontext, bis)
            .await?;
        Ok(tokens.antwort(MELDUNG_VERIFIZIERT, &benutzer))
    }

    /// Ersetzt die offene Anfrage fuer (email, identifier) und versendet erneut
    pub async fn verifizierung_erneut_senden(
        &self,
        eingabe: ErneutSendenEingabe,
        kontext: &AnfrageKontext,
    ) -> AuthResult<Meldung> {
        let email = email_normalisieren(&eingabe.email);
        if !policy::email_gueltig(&email) {
            return Err(AuthError::validierung(EMAIL_UNGUELTIG));
        }
        let bis = self.frist_bis(kontext);

        let bestehend = self
            .speicher(
                bis,
                "get_verification_by_email",
                self.provider
                    .get_verification_by_email(&email, eingabe.identifier),
            )
            .await?;
        let benutzer = self
            .speicher(bis, "get_user_by_email", self.provider.get_user_by_email(&email))
            .await?;

        self.verifizierung_ausstellen(&benutzer, eingabe.identifier, bestehend.redirect_uri, bis)
            .await?;
        Ok(Meldung::neu(MELDUNG_ERNEUT_GESENDET))
    }

    // -----------------------------------------------------------------------
    // Anmeldung / Abmeldung
    // -----------------------------------------------------------------------

    /// Meldet einen Benutzer per E-Mail und Passwort an
    pub async fn anmelden(
        &self,
        eingabe: AnmeldeEingabe,
        kontext: &AnfrageKontext,
    ) -> AuthResult<AuthAntwort> {
        let ergebnis = self.anmelden_intern(eingabe, kontext).await;
        if let Some(m) = &self.metriken {
            m.login_zaehlen(match &ergebnis {
                Ok(_) => "ok",
                Err(e) => e.kategorie(),
            });
        }
        ergebnis
    }

    async fn anmelden_intern(
        &self,
        eingabe: AnmeldeEingabe,
        kontext: &AnfrageKontext,
    ) -> AuthResult<AuthAntwort> {
        if self.einstellungen.basic_auth_deaktiviert {
            return Err(AuthError::validierung(BASIC_AUTH_DEAKTIVIERT));
        }
        let email = email_normalisieren(&eingabe.email);
        let bis = self.frist_bis(kontext);

        let benutzer = match self
            .speicher(bis, "get_user_by_email", self.provider.get_user_by_email(&email))
            .await
        {
            Ok(b) => b,
            Err(AuthError::NichtGefunden(_)) => {
                tracing::debug!(email = %email, "Anmeldung fuer unbekannte E-Mail");
                return Err(AuthError::UngueltigeAnmeldedaten);
            }
            Err(e) => return Err(e),
        };

        if benutzer.ist_widerrufen() {
            return Err(AuthError::ZugriffWiderrufen);
        }
        let Some(hash) = benutzer.password.as_deref() else {
            return Err(AuthError::UngueltigeAnmeldedaten);
        };
        if !self.passwort_pruefen(&eingabe.password, hash).await? {
            tracing::warn!(email = %email, "Fehlgeschlagener Login-Versuch");
            return Err(AuthError::UngueltigeAnmeldedaten);
        }
        if !benutzer.ist_verifiziert() {
            return Err(AuthError::EmailNichtVerifiziert);
        }

        let rollen = match eingabe.roles {
            Some(rollen) if !rollen.is_empty() => {
                if !policy::rollen_erlaubt(&rollen, &benutzer.rollen()) {
                    return Err(AuthError::validierung("invalid role"));
                }
                rollen
            }
            _ => benutzer.rollen(),
        };

        let tokens = self
            .tokens_ausstellen(&benutzer, rollen, kontext, bis)
            .await?;
        tracing::info!(user_id = %benutzer.id, email = %benutzer.email, "Benutzer angemeldet");
        Ok(tokens.antwort(MELDUNG_ANGEMELDET, &benutzer))
    }

    /// Meldet den Inhaber des Access-Tokens auf allen Geraeten ab
    pub async fn abmelden(
        &self,
        eingabe: AbmeldeEingabe,
        kontext: &AnfrageKontext,
    ) -> AuthResult<Meldung> {
        let claims = self.signer.parsen(&eingabe.access_token)?;
        if claims.zweck != ZWECK_ACCESS {
            return Err(AuthError::TokenUngueltig);
        }
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::TokenUngueltig)?;

        let entfernt = self.sessions_loeschen(user_id, kontext).await?;
        tracing::info!(user_id = %user_id, sessions = entfernt, "Benutzer abgemeldet");
        Ok(Meldung::neu(MELDUNG_ABGEMELDET))
    }

    /// Prueft ein Access-Token gegen den Session-Store und laedt den Benutzer
    pub async fn session_validieren(
        &self,
        access_token: &str,
        kontext: &AnfrageKontext,
    ) -> AuthResult<BenutzerRecord> {
        let session = self.sessions.validieren(access_token).await?;
        let bis = self.frist_bis(kontext);
        let benutzer = self
            .speicher(bis, "get_user", self.provider.get_user(session.user_id))
            .await?;

        if benutzer.ist_widerrufen() {
            self.sessions.invalidieren(access_token).await;
            return Err(AuthError::ZugriffWiderrufen);
        }
        Ok(benutzer)
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Registriert ein ausgestelltes Access-Token im Session-Store
    pub async fn session_setzen(&self, access_token: String, session: TokenSession) {
        self.sessions.setzen(access_token, session).await;
        self.sessions_messen().await;
    }

    /// Persistiert die Session-Metadaten (User-Agent, IP)
    pub async fn session_hinzufuegen(
        &self,
        user_id: Uuid,
        kontext: &AnfrageKontext,
    ) -> AuthResult<SessionRecord> {
        let bis = self.frist_bis(kontext);
        self.session_anlegen(user_id, kontext, bis).await
    }

    /// Entfernt alle Sessions eines Benutzers (Store und Speicher); idempotent
    pub async fn sessions_loeschen(
        &self,
        user_id: Uuid,
        kontext: &AnfrageKontext,
    ) -> AuthResult<u64> {
        let bis = self.frist_bis(kontext);
        self.sessions_entfernen(user_id, bis).await
    }

    async fn session_anlegen(
        &self,
        user_id: Uuid,
        kontext: &AnfrageKontext,
        bis: Instant,
    ) -> AuthResult<SessionRecord> {
        self.speicher(
            bis,
            "create_session",
            self.provider.create_session(NeueSession {
                id: None,
                user_id,
                user_agent: kontext.user_agent.clone(),
                ip: kontext.ip.clone(),
            }),
        )
        .await
    }

    async fn sessions_entfernen(&self, user_id: Uuid, bis: Instant) -> AuthResult<u64> {
        self.sessions.alle_invalidieren(user_id).await;
        self.sessions_messen().await;
        self.speicher(
            bis,
            "delete_sessions_for_user",
            self.provider.delete_sessions_for_user(user_id),
        )
        .await
    }

    async fn sessions_messen(&self) {
        if let Some(m) = &self.metriken {
            m.sessions_active
                .set(self.sessions.anzahl_aktive().await as i64);
        }
    }

    // -----------------------------------------------------------------------
    // Passwort
    // -----------------------------------------------------------------------

    /// Stellt eine `forgot_password`-Anfrage aus
    ///
    /// Die Antwort ist fuer bekannte und unbekannte Adressen identisch.
    pub async fn passwort_vergessen(
        &self,
        eingabe: PasswortVergessenEingabe,
        kontext: &AnfrageKontext,
    ) -> AuthResult<Meldung> {
        if self.einstellungen.basic_auth_deaktiviert {
            return Err(AuthError::validierung(BASIC_AUTH_DEAKTIVIERT));
        }
        let email = email_normalisieren(&eingabe.email);
        if !policy::email_gueltig(&email) {
            return Err(AuthError::validierung(EMAIL_UNGUELTIG));
        }
        let bis = self.frist_bis(kontext);

        match self
            .speicher(bis, "get_user_by_email", self.provider.get_user_by_email(&email))
            .await
        {
            Ok(benutzer) if !benutzer.ist_widerrufen() => {
                self.verifizierung_ausstellen(
                    &benutzer,
                    VerifizierungsZweck::ForgotPassword,
                    eingabe.redirect_uri,
                    bis,
                )
                .await?;
            }
            Ok(benutzer) => {
                tracing::debug!(user_id = %benutzer.id, "Passwort-Reset fuer widerrufenes Konto ignoriert")
            }
            Err(AuthError::NichtGefunden(_)) => {
                tracing::debug!(email = %email, "Passwort-Reset fuer unbekannte E-Mail ignoriert")
            }
            Err(e) => return Err(e),
        }
        Ok(Meldung::neu(MELDUNG_PASSWORT_VERGESSEN))
    }

    /// Loest eine `forgot_password`-Anfrage ein und setzt das Passwort neu
    ///
    /// Alle bestehenden Sessions des Benutzers werden beendet.
    pub async fn passwort_zuruecksetzen(
        &self,
        eingabe: PasswortZuruecksetzenEingabe,
        kontext: &AnfrageKontext,
    ) -> AuthResult<Meldung> {
        if self.einstellungen.basic_auth_deaktiviert {
            return Err(AuthError::validierung(BASIC_AUTH_DEAKTIVIERT));
        }
        if eingabe.password != eingabe.confirm_password {
            return Err(AuthError::validierung(PASSWOERTER_UNGLEICH));
        }
        let bis = self.frist_bis(kontext);

        let anfrage = self
            .anfrage_einloesen(&eingabe.token, &[VerifizierungsZweck::ForgotPassword], bis)
            .await?;
        let mut benutzer = self
            .speicher(
                bis,
                "get_user_by_email",
                self.provider.get_user_by_email(&anfrage.email),
            )
            .await?;

        benutzer.password = Some(self.passwort_hashen(&eingabe.password).await?);
        // der Reset-Link beweist den Zugriff auf das Postfach
        if benutzer.email_verified_at.is_none() {
            benutzer.email_verified_at = Some(jetzt());
        }
        if let Some(methoden) = methode_ergaenzen(&benutzer.signup_methods, SignupMethode::BasicAuth)
        {
            benutzer.signup_methods = methoden;
        }
        let benutzer = self
            .speicher(bis, "update_user", self.provider.update_user(benutzer))
            .await?;

        let beendet = self.sessions_entfernen(benutzer.id, bis).await?;
        tracing::info!(user_id = %benutzer.id, sessions = beendet, "Passwort zurueckgesetzt");
        Ok(Meldung::neu(MELDUNG_PASSWORT_GEAENDERT))
    }

    // -----------------------------------------------------------------------
    // Zugriff
    // -----------------------------------------------------------------------

    /// Sperrt ein Konto und beendet alle Sessions
    pub async fn zugriff_widerrufen(
        &self,
        eingabe: ZugriffEingabe,
        kontext: &AnfrageKontext,
    ) -> AuthResult<Meldung> {
        let bis = self.frist_bis(kontext);
        let mut benutzer = self
            .speicher(bis, "get_user", self.provider.get_user(eingabe.user_id))
            .await?;

        if benutzer.revoked_timestamp.is_none() {
            benutzer.revoked_timestamp = Some(jetzt());
            self.speicher(bis, "update_user", self.provider.update_user(benutzer))
                .await?;
        }
        let beendet = self.sessions_entfernen(eingabe.user_id, bis).await?;
        tracing::info!(user_id = %eingabe.user_id, sessions = beendet, "Zugriff widerrufen");
        Ok(Meldung::neu(MELDUNG_WIDERRUFEN))
    }

    /// Hebt einen Widerruf wieder auf
    pub async fn zugriff_wiederherstellen(
        &self,
        eingabe: ZugriffEingabe,
        kontext: &AnfrageKontext,
    ) -> AuthResult<Meldung> {
        let bis = self.frist_bis(kontext);
        let mut benutzer = self
            .speicher(bis, "get_user", self.provider.get_user(eingabe.user_id))
            .await?;

        if benutzer.revoked_timestamp.is_some() {
            benutzer.revoked_timestamp = None;
            self.speicher(bis, "update_user", self.provider.update_user(benutzer))
                .await?;
        }
        tracing::info!(user_id = %eingabe.user_id, "Zugriff wiederhergestellt");
        Ok(Meldung::neu(MELDUNG_WIEDERHERGESTELLT))
    }

    // -----------------------------------------------------------------------
    // Interne Bausteine
    // -----------------------------------------------------------------------

    fn frist_bis(&self, kontext: &AnfrageKontext) -> Instant {
        Instant::now() + kontext.frist.unwrap_or_else(|| self.einstellungen.frist())
    }

    /// Fuehrt einen Speicherzugriff unter der Frist der Anfrage aus
    async fn speicher<T>(
        &self,
        bis: Instant,
        operation: &'static str,
        zugriff: impl Future<Output = DbResult<T>>,
    ) -> AuthResult<T> {
        let start = Instant::now();
        let ergebnis = tokio::time::timeout_at(bis, zugriff).await;
        if let Some(m) = &self.metriken {
            m.speicherzugriff_beobachten(operation, start.elapsed().as_secs_f64());
        }
        match ergebnis {
            Ok(r) => r.map_err(AuthError::from),
            Err(_) => {
                tracing::warn!(operation, "Speicherzugriff hat die Frist ueberschritten");
                Err(AuthError::NichtVerfuegbar(format!(
                    "{operation} exceeded the request deadline"
                )))
            }
        }
    }

    async fn passwort_hashen(&self, passwort: &str) -> AuthResult<String> {
        let hasher = Arc::clone(&self.hasher);
        let passwort = passwort.to_string();
        tokio::task::spawn_blocking(move || hasher.hashen(&passwort))
            .await
            .map_err(|e| AuthError::intern(format!("Hash-Task abgebrochen: {e}")))?
    }

    async fn passwort_pruefen(&self, passwort: &str, hash: &str) -> AuthResult<bool> {
        let hasher = Arc::clone(&self.hasher);
        let (passwort, hash) = (passwort.to_string(), hash.to_string());
        tokio::task::spawn_blocking(move || hasher.verifizieren(&passwort, &hash))
            .await
            .map_err(|e| AuthError::intern(format!("Hash-Task abgebrochen: {e}")))?
    }

    /// Legt die Anfrage fuer (email, zweck) an bzw. ersetzt sie und reicht die Mail ein
    async fn verifizierung_ausstellen(
        &self,
        benutzer: &BenutzerRecord,
        zweck: VerifizierungsZweck,
        redirect_uri: Option<String>,
        bis: Instant,
    ) -> AuthResult<VerifizierungRecord> {
        let redirect_uri = redirect_uri.or_else(|| self.einstellungen.app_url.clone());
        let ausgestellt = jetzt();
        let ablauf = policy::verifizierung_ablauf(ausgestellt);
        let nonce = policy::nonce_erzeugen();

        let claims = TokenClaims::neu(
            benutzer.id.to_string(),
            &benutzer.email,
            zweck.als_str(),
            &nonce,
            ausgestellt,
            ablauf,
        )
        .mit_redirect(redirect_uri.clone());
        let token = self.signer.signieren(&claims)?;

        let anfrage = self
            .speicher(
                bis,
                "upsert_verification",
                self.provider.upsert_verification(NeueVerifizierung {
                    id: None,
                    token: token.clone(),
                    identifier: zweck,
                    email: benutzer.email.clone(),
                    expires_at: ablauf,
                    nonce,
                    redirect_uri: redirect_uri.clone(),
                }),
            )
            .await?;

        self.mail.einreichen(MailAuftrag {
            email: benutzer.email.clone(),
            token,
            zweck,
            redirect_uri,
        });

        tracing::info!(
            user_id = %benutzer.id,
            zweck = %zweck,
            expires_at = %anfrage.expires_at,
            "Verifizierungsanfrage ausgestellt"
        );
        Ok(anfrage)
    }

    /// Sucht, prueft und verbraucht eine Verifizierungsanfrage
    ///
    /// Reihenfolge: Token nachschlagen, gespeicherten Ablauf pruefen,
    /// Signatur pruefen, Anfrage loeschen. Das Loeschen entscheidet bei
    /// parallelen Einloesungen; nur ein Aufruf erhaelt die Anfrage.
    async fn anfrage_einloesen(
        &self,
        token: &str,
        erlaubt: &[VerifizierungsZweck],
        bis: Instant,
    ) -> AuthResult<VerifizierungRecord> {
        let ergebnis = self.anfrage_einloesen_intern(token, erlaubt, bis).await;
        if let Some(m) = &self.metriken {
            let zweck = match &ergebnis {
                Ok(a) => a.identifier.als_str(),
                Err(_) => "unbekannt",
            };
            m.verifizierung_zaehlen(
                zweck,
                match &ergebnis {
                    Ok(_) => "ok",
                    Err(e) => e.kategorie(),
                },
            );
        }
        ergebnis
    }

    async fn anfrage_einloesen_intern(
        &self,
        token: &str,
        erlaubt: &[VerifizierungsZweck],
        bis: Instant,
    ) -> AuthResult<VerifizierungRecord> {
        let anfrage = match self
            .speicher(
                bis,
                "get_verification_by_token",
                self.provider.get_verification_by_token(token),
            )
            .await
        {
            Ok(a) => a,
            Err(AuthError::NichtGefunden(_)) => {
                return Err(AuthError::NichtGefunden(
                    "verification request not found".into(),
                ))
            }
            Err(e) => return Err(e),
        };

        if !erlaubt.contains(&anfrage.identifier) {
            return Err(AuthError::TokenUngueltig);
        }
        if anfrage.ist_abgelaufen(jetzt()) {
            tracing::debug!(email = %anfrage.email, zweck = %anfrage.identifier, "Verifizierungsanfrage abgelaufen");
            return Err(AuthError::Abgelaufen("verification token expired".into()));
        }

        let claims = self.signer.parsen(token)?;
        if claims.nonce != anfrage.nonce
            || claims.email != anfrage.email
            || claims.zweck != anfrage.identifier.als_str()
        {
            return Err(AuthError::TokenUngueltig);
        }

        match self
            .speicher(
                bis,
                "delete_verification",
                self.provider.delete_verification(anfrage.id),
            )
            .await
        {
            Ok(()) => Ok(anfrage),
            Err(AuthError::NichtGefunden(_)) => Err(AuthError::NichtGefunden(
                "verification request already used".into(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Stellt Access- und Refresh-Token aus und legt die Session an
    async fn tokens_ausstellen(
        &self,
        benutzer: &BenutzerRecord,
        rollen: Vec<String>,
        kontext: &AnfrageKontext,
        bis: Instant,
    ) -> AuthResult<AusgestellteTokens> {
        let ausgestellt = jetzt();
        let nonce = policy::nonce_erzeugen();
        let access_ablauf =
            ausgestellt + ChronoDuration::seconds(self.einstellungen.access_token_sekunden as i64);
        let refresh_ablauf =
            ausgestellt + ChronoDuration::seconds(self.einstellungen.refresh_token_sekunden as i64);
        let sub = benutzer.id.to_string();

        let access_token = self.signer.signieren(
            &TokenClaims::neu(&sub, &benutzer.email, ZWECK_ACCESS, &nonce, ausgestellt, access_ablauf)
                .mit_rollen(rollen.clone()),
        )?;
        let refresh_token = self.signer.signieren(
            &TokenClaims::neu(&sub, &benutzer.email, ZWECK_REFRESH, &nonce, ausgestellt, refresh_ablauf)
                .mit_rollen(rollen),
        )?;

        let session = self.session_anlegen(benutzer.id, kontext, bis).await?;
        self.session_setzen(
            access_token.clone(),
            TokenSession {
                user_id: benutzer.id,
                session_id: session.id,
                refresh_token: refresh_token.clone(),
                nonce,
                erstellt_am: ausgestellt,
                laeuft_ab_am: access_ablauf,
            },
        )
        .await;

        Ok(AusgestellteTokens {
            access_token,
            refresh_token,
            expires_at: access_ablauf.timestamp(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authwerk_db::SpeicherDb;
    use std::time::Duration;

    use crate::mail::ProtokollMailer;

    fn dienst() -> AuthService {
        let (mail, _) = MailDispatcher::starten(
            Arc::new(ProtokollMailer),
            8,
            Duration::from_secs(1),
            None,
        );
        AuthService::neu(
            Arc::new(SpeicherDb::neu()),
            AuthEinstellungen {
                jwt_geheimnis: "geheim".into(),
                ..Default::default()
            },
            mail,
        )
        .unwrap()
    }

    #[test]
    fn methoden_ergaenzen() {
        assert_eq!(
            methode_ergaenzen("basic_auth", SignupMethode::MagicLinkLogin).as_deref(),
            Some("basic_auth,magic_link_login")
        );
        assert!(methode_ergaenzen("basic_auth", SignupMethode::BasicAuth).is_none());
        assert_eq!(
            methode_ergaenzen("", SignupMethode::BasicAuth).as_deref(),
            Some("basic_auth")
        );
    }

    #[test]
    fn konflikt_meldungen() {
        assert_eq!(
            bereits_registriert("a@example.com", true).to_string(),
            "a@example.com has already signed up"
        );
        assert!(bereits_registriert("a@example.com", false)
            .to_string()
            .ends_with("please complete the email verification process or reset the password"));
    }

    #[tokio::test(start_paused = true)]
    async fn frist_ueberschritten_ergibt_nicht_verfuegbar() {
        let dienst = dienst();
        let bis = Instant::now() + Duration::from_millis(50);
        let ergebnis: AuthResult<()> = dienst
            .speicher(bis, "langsam", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(ergebnis, Err(AuthError::NichtVerfuegbar(_))));
    }

    #[tokio::test]
    async fn frist_aus_kontext_hat_vorrang() {
        let dienst = dienst();
        let kontext = AnfrageKontext::default().mit_frist(Duration::from_millis(10));
        let bis = dienst.frist_bis(&kontext);
        assert!(bis <= Instant::now() + Duration::from_millis(10));

        let standard = dienst.frist_bis(&AnfrageKontext::default());
        assert!(standard > Instant::now() + Duration::from_secs(4));
    }

    #[test]
    fn neu_verlangt_geheimnis() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = rt.enter();
        let (mail, _) = MailDispatcher::starten(
            Arc::new(ProtokollMailer),
            1,
            Duration::from_secs(1),
            None,
        );
        assert!(AuthService::neu(
            Arc::new(SpeicherDb::neu()),
            AuthEinstellungen::default(),
            mail
        )
        .is_err());
    }
}
