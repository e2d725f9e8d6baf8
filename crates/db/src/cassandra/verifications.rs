//! Cassandra-Implementierung des VerificationRepository

use std::cmp::Reverse;

use async_trait::async_trait;
use uuid::Uuid;

use authwerk_core::types::{Paginierung, Seite, VerifizierungsZweck};

use super::zeilen::{VerifizierungZeile, VERIFIZIERUNG_SPALTEN};
use super::CassandraDb;
use crate::error::DbError;
use crate::models::{email_normalisieren, jetzt, NeueVerifizierung, VerifizierungRecord};
use crate::repository::{DbResult, VerificationRepository};

const LOOKUP: &str = "verification_requests_by_email_identifier";

impl CassandraDb {
    async fn anfrage_id_fuer(
        &self,
        email: &str,
        identifier: VerifizierungsZweck,
    ) -> DbResult<Option<Uuid>> {
        let zeile: Option<(String,)> = self
            .erste_zeile(
                format!(
                    "SELECT request_id FROM {} WHERE email = ? AND identifier = ?",
                    self.tabelle(LOOKUP)
                ),
                (email, identifier.als_str()),
            )
            .await?;
        zeile
            .map(|(id,)| {
                Uuid::parse_str(&id)
                    .map_err(|e| DbError::intern(format!("Ungueltige UUID '{id}': {e}")))
            })
            .transpose()
    }

    async fn anfrage_schreiben(&self, record: &VerifizierungRecord) -> DbResult<()> {
        self.ausfuehren(
            format!(
                "INSERT INTO {} ({VERIFIZIERUNG_SPALTEN}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                self.tabelle("verification_requests")
            ),
            VerifizierungZeile::from(record),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VerificationRepository for CassandraDb {
    async fn upsert_verification(
        &self,
        data: NeueVerifizierung,
    ) -> DbResult<VerifizierungRecord> {
        let neu = data.in_record(jetzt());

        // Wer die Lookup-Zeile anlegt, besitzt das Paar (email, identifier)
        let angelegt = self
            .bedingt(
                format!(
                    "INSERT INTO {} (email, identifier, request_id) VALUES (?, ?, ?) IF NOT EXISTS",
                    self.tabelle(LOOKUP)
                ),
                (&neu.email, neu.identifier.als_str(), neu.id.to_string()),
            )
            .await?;

        let record = if angelegt {
            neu
        } else {
            let id = self
                .anfrage_id_fuer(&neu.email, neu.identifier)
                .await?
                .ok_or_else(|| DbError::intern("Lookup-Zeile nach Konflikt verschwunden"))?;
            let created_at = match self.get_verification(id).await {
                Ok(alt) => alt.created_at,
                Err(e) if e.ist_nicht_gefunden() => neu.created_at,
                Err(e) => return Err(e),
            };
            VerifizierungRecord {
                id,
                created_at,
                ..neu
            }
        };

        self.anfrage_schreiben(&record).await?;
        Ok(record)
    }

    async fn get_verification(&self, id: Uuid) -> DbResult<VerifizierungRecord> {
        let zeile: Option<VerifizierungZeile> = self
            .erste_zeile(
                format!(
                    "SELECT {VERIFIZIERUNG_SPALTEN} FROM {} WHERE id = ?",
                    self.tabelle("verification_requests")
                ),
                (id.to_string(),),
            )
            .await?;
        zeile
            .ok_or_else(|| DbError::nicht_gefunden(format!("Verifizierungsanfrage {id}")))?
            .try_into()
    }

    async fn get_verification_by_token(&self, token: &str) -> DbResult<VerifizierungRecord> {
        let zeile: Option<VerifizierungZeile> = self
            .erste_zeile(
                format!(
                    "SELECT {VERIFIZIERUNG_SPALTEN} FROM {} WHERE jwt_token = ?",
                    self.tabelle("verification_requests")
                ),
                (token,),
            )
            .await?;
        zeile
            .ok_or_else(|| DbError::nicht_gefunden("Verifizierungsanfrage zum Token"))?
            .try_into()
    }

    async fn get_verification_by_email(
        &self,
        email: &str,
        identifier: VerifizierungsZweck,
    ) -> DbResult<VerifizierungRecord> {
        let email = email_normalisieren(email);
        let id = self.anfrage_id_fuer(&email, identifier).await?.ok_or_else(|| {
            DbError::nicht_gefunden(format!("Verifizierungsanfrage {identifier} fuer '{email}'"))
        })?;
        self.get_verification(id).await
    }

    async fn list_verifications(
        &self,
        paginierung: Paginierung,
    ) -> DbResult<Seite<VerifizierungRecord>> {
        let paginierung = paginierung.begrenzt();
        let zeilen: Vec<VerifizierungZeile> = self
            .zeilen(
                format!(
                    "SELECT {VERIFIZIERUNG_SPALTEN} FROM {}",
                    self.tabelle("verification_requests")
                ),
                (),
            )
            .await?;

        let mut alle = zeilen
            .into_iter()
            .map(VerifizierungRecord::try_from)
            .collect::<DbResult<Vec<_>>>()?;
        alle.sort_by_key(|v| (Reverse(v.created_at), v.id));

        Ok(Seite {
            gesamt: alle.len() as u64,
            eintraege: paginierung.anwenden(alle),
            paginierung,
        })
    }

    async fn delete_verification(&self, id: Uuid) -> DbResult<()> {
        let anfrage = self.get_verification(id).await?;

        // Bedingtes Loeschen: bei gleichzeitigem Einloesen gewinnt genau einer
        let geloescht = self
            .bedingt(
                format!(
                    "DELETE FROM {} WHERE id = ? IF EXISTS",
                    self.tabelle("verification_requests")
                ),
                (id.to_string(),),
            )
            .await?;
        if !geloescht {
            return Err(DbError::nicht_gefunden(format!("Verifizierungsanfrage {id}")));
        }

        self.bedingt(
            format!(
                "DELETE FROM {} WHERE email = ? AND identifier = ? IF request_id = ?",
                self.tabelle(LOOKUP)
            ),
            (&anfrage.email, anfrage.identifier.als_str(), id.to_string()),
        )
        .await?;
        Ok(())
    }
}
