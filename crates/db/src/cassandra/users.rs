//! Cassandra-Implementierung des UserRepository

use std::cmp::Reverse;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use authwerk_core::types::{Paginierung, Seite};

use super::zeilen::{BenutzerZeile, BENUTZER_SPALTEN};
use super::CassandraDb;
use crate::error::DbError;
use crate::models::{email_normalisieren, jetzt, BenutzerRecord, NeuerBenutzer};
use crate::repository::{DbResult, SessionRepository, UserRepository};

impl CassandraDb {
    /// Reserviert eine E-Mail fuer einen Benutzer (compare-and-set)
    async fn email_reservieren(&self, email: &str, user_id: Uuid) -> DbResult<()> {
        let reserviert = self
            .bedingt(
                format!(
                    "INSERT INTO {} (email, user_id) VALUES (?, ?) IF NOT EXISTS",
                    self.tabelle("users_by_email")
                ),
                (email, user_id.to_string()),
            )
            .await?;
        if reserviert {
            Ok(())
        } else {
            Err(DbError::eindeutigkeit(format!("E-Mail '{email}' bereits registriert")))
        }
    }

    async fn email_freigeben(&self, email: &str) -> DbResult<()> {
        self.ausfuehren(
            format!("DELETE FROM {} WHERE email = ?", self.tabelle("users_by_email")),
            (email,),
        )
        .await?;
        Ok(())
    }

    async fn benutzer_schreiben(&self, record: &BenutzerRecord) -> DbResult<()> {
        self.ausfuehren(
            format!(
                "INSERT INTO {} ({BENUTZER_SPALTEN}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                self.tabelle("users")
            ),
            BenutzerZeile::from(record),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for CassandraDb {
    async fn create_user(&self, data: NeuerBenutzer) -> DbResult<BenutzerRecord> {
        let record = data.in_record(jetzt());

        self.email_reservieren(&record.email, record.id).await?;
        if let Err(e) = self.benutzer_schreiben(&record).await {
            // Reservierung zuruecknehmen, sonst bleibt die E-Mail blockiert
            if let Err(freigabe) = self.email_freigeben(&record.email).await {
                warn!(email = %record.email, fehler = %freigabe, "E-Mail-Reservierung haengt");
            }
            return Err(e);
        }

        Ok(record)
    }

    async fn get_user(&self, id: Uuid) -> DbResult<BenutzerRecord> {
        let zeile: Option<BenutzerZeile> = self
            .erste_zeile(
                format!("SELECT {BENUTZER_SPALTEN} FROM {} WHERE id = ?", self.tabelle("users")),
                (id.to_string(),),
            )
            .await?;
        zeile
            .ok_or_else(|| DbError::nicht_gefunden(format!("User {id}")))?
            .try_into()
    }

    async fn get_user_by_email(&self, email: &str) -> DbResult<BenutzerRecord> {
        let email = email_normalisieren(email);
        let lookup: Option<(String,)> = self
            .erste_zeile(
                format!(
                    "SELECT user_id FROM {} WHERE email = ?",
                    self.tabelle("users_by_email")
                ),
                (&email,),
            )
            .await?;
        let (user_id,) =
            lookup.ok_or_else(|| DbError::nicht_gefunden(format!("User mit E-Mail '{email}'")))?;
        let id = Uuid::parse_str(&user_id)
            .map_err(|e| DbError::intern(format!("Ungueltige UUID '{user_id}': {e}")))?;
        self.get_user(id).await
    }

    async fn list_users(&self, paginierung: Paginierung) -> DbResult<Seite<BenutzerRecord>> {
        let paginierung = paginierung.begrenzt();
        let zeilen: Vec<BenutzerZeile> = self
            .zeilen(
                format!("SELECT {BENUTZER_SPALTEN} FROM {}", self.tabelle("users")),
                (),
            )
            .await?;

        let mut alle = zeilen
            .into_iter()
            .map(BenutzerRecord::try_from)
            .collect::<DbResult<Vec<_>>>()?;
        alle.sort_by_key(|u| (Reverse(u.created_at), u.id));

        Ok(Seite {
            gesamt: alle.len() as u64,
            eintraege: paginierung.anwenden(alle),
            paginierung,
        })
    }

    async fn update_user(&self, benutzer: BenutzerRecord) -> DbResult<BenutzerRecord> {
        let bisher = self.get_user(benutzer.id).await?;
        let neu = BenutzerRecord {
            email: email_normalisieren(&benutzer.email),
            // einmal verifiziert bleibt verifiziert
            email_verified_at: benutzer.email_verified_at.or(bisher.email_verified_at),
            created_at: bisher.created_at,
            updated_at: jetzt(),
            ..benutzer
        };

        let email_geaendert = neu.email != bisher.email;
        if email_geaendert {
            self.email_reservieren(&neu.email, neu.id).await?;
        }
        self.benutzer_schreiben(&neu).await?;
        if email_geaendert {
            self.email_freigeben(&bisher.email).await?;
        }
        Ok(neu)
    }

    async fn delete_user(&self, id: Uuid) -> DbResult<()> {
        let bisher = self.get_user(id).await?;
        self.ausfuehren(
            format!("DELETE FROM {} WHERE id = ?", self.tabelle("users")),
            (id.to_string(),),
        )
        .await?;
        self.email_freigeben(&bisher.email).await?;
        self.delete_sessions_for_user(id).await?;
        Ok(())
    }
}
