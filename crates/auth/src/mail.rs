//! Mailversand fuer Verifizierungsanfragen
//!
//! Der Lebenszyklus reicht Mails beim [`MailDispatcher`] ein und wartet nie
//! auf die Zustellung. Ein Hintergrund-Worker leert die beschraenkte
//! Warteschlange; Fehler werden protokolliert und gezaehlt, nicht
//! wiederholt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use authwerk_core::types::VerifizierungsZweck;
use authwerk_observability::AuthwerkMetrics;

use crate::error::AuthResult;

/// Zustellung einer Verifizierungsmail
#[async_trait]
pub trait MailVersand: Send + Sync {
    async fn verifizierung_senden(&self, auftrag: &MailAuftrag) -> AuthResult<()>;
}

/// Eine einzelne zu versendende Mail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAuftrag {
    pub email: String,
    pub token: String,
    pub zweck: VerifizierungsZweck,
    pub redirect_uri: Option<String>,
}

/// Mailer ohne Zustellung; schreibt nur ins Log
#[derive(Debug, Default, Clone)]
pub struct ProtokollMailer;

#[async_trait]
impl MailVersand for ProtokollMailer {
    async fn verifizierung_senden(&self, auftrag: &MailAuftrag) -> AuthResult<()> {
        tracing::info!(
            email = %auftrag.email,
            zweck = %auftrag.zweck,
            redirect_uri = auftrag.redirect_uri.as_deref().unwrap_or(""),
            "Verifizierungsmail (nur Protokoll)"
        );
        tracing::debug!(token = %auftrag.token, "Verifizierungs-Token");
        Ok(())
    }
}

/// Nicht-blockierende Einreichung in eine beschraenkte Warteschlange
#[derive(Clone)]
pub struct MailDispatcher {
    sender: mpsc::Sender<MailAuftrag>,
    metriken: Option<AuthwerkMetrics>,
}

impl MailDispatcher {
    /// Startet den Worker und gibt Dispatcher und Task-Handle zurueck
    ///
    /// Der Worker endet sobald alle Dispatcher-Klone verworfen sind.
    pub fn starten(
        mailer: Arc<dyn MailVersand>,
        kapazitaet: usize,
        frist: Duration,
        metriken: Option<AuthwerkMetrics>,
    ) -> (Self, JoinHandle<()>) {
        let (sender, mut empfaenger) = mpsc::channel::<MailAuftrag>(kapazitaet.max(1));
        let worker_metriken = metriken.clone();

        let handle = tokio::spawn(async move {
            while let Some(auftrag) = empfaenger.recv().await {
                let fehler = match tokio::time::timeout(frist, mailer.verifizierung_senden(&auftrag))
                    .await
                {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(_) => Some(format!("Zeitlimit von {} ms ueberschritten", frist.as_millis())),
                };
                match fehler {
                    None => {
                        tracing::debug!(email = %auftrag.email, zweck = %auftrag.zweck, "Mail versendet")
                    }
                    Some(fehler) => {
                        tracing::warn!(
                            email = %auftrag.email,
                            zweck = %auftrag.zweck,
                            fehler = %fehler,
                            "Mailversand fehlgeschlagen"
                        );
                        if let Some(m) = &worker_metriken {
                            m.mail_failures_total.inc();
                        }
                    }
                }
            }
            tracing::debug!("Mail-Worker beendet");
        });

        (Self { sender, metriken }, handle)
    }

    /// Reicht eine Mail ein; volle oder geschlossene Warteschlange wird nur protokolliert
    pub fn einreichen(&self, auftrag: MailAuftrag) {
        if let Err(e) = self.sender.try_send(auftrag) {
            let (grund, auftrag) = match e {
                mpsc::error::TrySendError::Full(a) => ("Warteschlange voll", a),
                mpsc::error::TrySendError::Closed(a) => ("Worker beendet", a),
            };
            tracing::warn!(
                email = %auftrag.email,
                zweck = %auftrag.zweck,
                grund,
                "Mail verworfen"
            );
            if let Some(m) = &self.metriken {
                m.mail_failures_total.inc();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Aufzeichnung {
        auftraege: Mutex<Vec<MailAuftrag>>,
    }

    #[async_trait]
    impl MailVersand for Aufzeichnung {
        async fn verifizierung_senden(&self, auftrag: &MailAuftrag) -> AuthResult<()> {
            self.auftraege.lock().unwrap().push(auftrag.clone());
            Ok(())
        }
    }

    struct Kaputt;

    #[async_trait]
    impl MailVersand for Kaputt {
        async fn verifizierung_senden(&self, _auftrag: &MailAuftrag) -> AuthResult<()> {
            Err(AuthError::intern("SMTP nicht erreichbar"))
        }
    }

    struct Langsam;

    #[async_trait]
    impl MailVersand for Langsam {
        async fn verifizierung_senden(&self, _auftrag: &MailAuftrag) -> AuthResult<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn auftrag(email: &str) -> MailAuftrag {
        MailAuftrag {
            email: email.into(),
            token: "tok".into(),
            zweck: VerifizierungsZweck::BasicSignup,
            redirect_uri: None,
        }
    }

    #[tokio::test]
    async fn auftraege_werden_zugestellt() {
        let mailer = Arc::new(Aufzeichnung::default());
        let (dispatcher, handle) =
            MailDispatcher::starten(mailer.clone(), 8, Duration::from_secs(1), None);

        dispatcher.einreichen(auftrag("a@example.com"));
        dispatcher.einreichen(auftrag("b@example.com"));
        drop(dispatcher);
        handle.await.unwrap();

        let auftraege = mailer.auftraege.lock().unwrap();
        assert_eq!(auftraege.len(), 2);
        assert_eq!(auftraege[0].email, "a@example.com");
    }

    #[tokio::test]
    async fn fehler_werden_gezaehlt() {
        let metriken = AuthwerkMetrics::neu().unwrap();
        let (dispatcher, handle) = MailDispatcher::starten(
            Arc::new(Kaputt),
            8,
            Duration::from_secs(1),
            Some(metriken.clone()),
        );

        dispatcher.einreichen(auftrag("a@example.com"));
        drop(dispatcher);
        handle.await.unwrap();
        assert_eq!(metriken.mail_failures_total.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zeitlimit_zaehlt_als_fehler() {
        let metriken = AuthwerkMetrics::neu().unwrap();
        let (dispatcher, handle) = MailDispatcher::starten(
            Arc::new(Langsam),
            8,
            Duration::from_millis(100),
            Some(metriken.clone()),
        );

        dispatcher.einreichen(auftrag("a@example.com"));
        drop(dispatcher);
        handle.await.unwrap();
        assert_eq!(metriken.mail_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn volle_warteschlange_blockiert_nicht() {
        let metriken = AuthwerkMetrics::neu().unwrap();
        let (dispatcher, _handle) = MailDispatcher::starten(
            Arc::new(Langsam),
            1,
            Duration::from_secs(60),
            Some(metriken.clone()),
        );

        // ohne await kommt der Worker nicht zum Zug: nur der erste Auftrag passt
        for i in 0..5 {
            dispatcher.einreichen(auftrag(&format!("u{i}@example.com")));
        }
        assert_eq!(metriken.mail_failures_total.get(), 4);
    }
}
