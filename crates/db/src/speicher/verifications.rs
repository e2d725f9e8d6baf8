//! Speicher-Implementierung des VerificationRepository

use std::cmp::Reverse;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use authwerk_core::types::{Paginierung, Seite, VerifizierungsZweck};

use super::{aus_dokument, dokument, SpeicherDb, VERIFICATION_REQUESTS};
use crate::error::DbError;
use crate::models::{email_normalisieren, jetzt, NeueVerifizierung, VerifizierungRecord};
use crate::repository::{DbResult, VerificationRepository};

#[async_trait]
impl VerificationRepository for SpeicherDb {
    async fn upsert_verification(
        &self,
        data: NeueVerifizierung,
    ) -> DbResult<VerifizierungRecord> {
        let neu = data.in_record(jetzt());

        self.mutieren(|db| {
            let anfragen = db.sammlung_mut(VERIFICATION_REQUESTS)?;
            let bestehend = anfragen
                .finden(&[
                    ("email", json!(neu.email)),
                    ("identifier", json!(neu.identifier)),
                ])
                .first()
                .map(|dok| aus_dokument::<VerifizierungRecord>(dok))
                .transpose()?;

            match bestehend {
                // Ersetzen statt Anhaengen: ID und created_at bleiben
                Some(alt) => {
                    let record = VerifizierungRecord {
                        id: alt.id,
                        created_at: alt.created_at,
                        ..neu
                    };
                    anfragen.ersetzen(&alt.id.to_string(), dokument(&record)?)?;
                    Ok(record)
                }
                None => {
                    anfragen.einfuegen(neu.id.to_string(), dokument(&neu)?)?;
                    Ok(neu)
                }
            }
        })
    }

    async fn get_verification(&self, id: Uuid) -> DbResult<VerifizierungRecord> {
        self.lesen(|db| {
            let dok = db
                .sammlung(VERIFICATION_REQUESTS)?
                .holen(&id.to_string())
                .ok_or_else(|| DbError::nicht_gefunden(format!("Verifizierungsanfrage {id}")))?;
            aus_dokument(dok)
        })
    }

    async fn get_verification_by_token(&self, token: &str) -> DbResult<VerifizierungRecord> {
        self.lesen(|db| {
            let treffer = db
                .sammlung(VERIFICATION_REQUESTS)?
                .finden(&[("token", json!(token))]);
            let dok = treffer
                .first()
                .ok_or_else(|| DbError::nicht_gefunden("Verifizierungsanfrage zum Token"))?;
            aus_dokument(dok)
        })
    }

    async fn get_verification_by_email(
        &self,
        email: &str,
        identifier: VerifizierungsZweck,
    ) -> DbResult<VerifizierungRecord> {
        let email = email_normalisieren(email);
        self.lesen(|db| {
            let treffer = db.sammlung(VERIFICATION_REQUESTS)?.finden(&[
                ("email", json!(email)),
                ("identifier", json!(identifier)),
            ]);
            let dok = treffer.first().ok_or_else(|| {
                DbError::nicht_gefunden(format!(
                    "Verifizierungsanfrage {identifier} fuer '{email}'"
                ))
            })?;
            aus_dokument(dok)
        })
    }

    async fn list_verifications(
        &self,
        paginierung: Paginierung,
    ) -> DbResult<Seite<VerifizierungRecord>> {
        let paginierung = paginierung.begrenzt();
        self.lesen(|db| {
            let mut alle = db
                .sammlung(VERIFICATION_REQUESTS)?
                .alle()
                .map(aus_dokument::<VerifizierungRecord>)
                .collect::<DbResult<Vec<_>>>()?;
            alle.sort_by_key(|v| (Reverse(v.created_at), v.id));

            Ok(Seite {
                gesamt: alle.len() as u64,
                eintraege: paginierung.anwenden(alle),
                paginierung,
            })
        })
    }

    async fn delete_verification(&self, id: Uuid) -> DbResult<()> {
        self.mutieren(|db| {
            if db
                .sammlung_mut(VERIFICATION_REQUESTS)?
                .loeschen(&id.to_string())
            {
                Ok(())
            } else {
                Err(DbError::nicht_gefunden(format!("Verifizierungsanfrage {id}")))
            }
        })
    }
}
