//! Speicher-Implementierung des UserRepository

use std::cmp::Reverse;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use authwerk_core::types::{Paginierung, Seite};

use super::{aus_dokument, dokument, SpeicherDb, SESSIONS, USERS};
use crate::error::DbError;
use crate::models::{email_normalisieren, jetzt, BenutzerRecord, NeuerBenutzer};
use crate::repository::{DbResult, UserRepository};

#[async_trait]
impl UserRepository for SpeicherDb {
    async fn create_user(&self, data: NeuerBenutzer) -> DbResult<BenutzerRecord> {
        let record = data.in_record(jetzt());
        let dok = dokument(&record)?;

        self.mutieren(|db| {
            db.sammlung_mut(USERS)?
                .einfuegen(record.id.to_string(), dok)
                .map_err(|e| {
                    if e.ist_eindeutigkeit() {
                        DbError::eindeutigkeit(format!(
                            "E-Mail '{}' bereits registriert",
                            record.email
                        ))
                    } else {
                        e
                    }
                })
        })?;

        Ok(record)
    }

    async fn get_user(&self, id: Uuid) -> DbResult<BenutzerRecord> {
        self.lesen(|db| {
            let dok = db
                .sammlung(USERS)?
                .holen(&id.to_string())
                .ok_or_else(|| DbError::nicht_gefunden(format!("User {id}")))?;
            aus_dokument(dok)
        })
    }

    async fn get_user_by_email(&self, email: &str) -> DbResult<BenutzerRecord> {
        let email = email_normalisieren(email);
        self.lesen(|db| {
            let treffer = db.sammlung(USERS)?.finden(&[("email", json!(email))]);
            let dok = treffer
                .first()
                .ok_or_else(|| DbError::nicht_gefunden(format!("User mit E-Mail '{email}'")))?;
            aus_dokument(dok)
        })
    }

    async fn list_users(&self, paginierung: Paginierung) -> DbResult<Seite<BenutzerRecord>> {
        let paginierung = paginierung.begrenzt();
        self.lesen(|db| {
            let mut alle = db
                .sammlung(USERS)?
                .alle()
                .map(aus_dokument::<BenutzerRecord>)
                .collect::<DbResult<Vec<_>>>()?;
            alle.sort_by_key(|u| (Reverse(u.created_at), u.id));

            Ok(Seite {
                gesamt: alle.len() as u64,
                eintraege: paginierung.anwenden(alle),
                paginierung,
            })
        })
    }

    async fn update_user(&self, benutzer: BenutzerRecord) -> DbResult<BenutzerRecord> {
        self.mutieren(|db| {
            let users = db.sammlung_mut(USERS)?;
            let id = benutzer.id.to_string();
            let bisher: BenutzerRecord = aus_dokument(
                users
                    .holen(&id)
                    .ok_or_else(|| DbError::nicht_gefunden(format!("User {id}")))?,
            )?;

            let neu = BenutzerRecord {
                email: email_normalisieren(&benutzer.email),
                email_verified_at: benutzer.email_verified_at.or(bisher.email_verified_at),
                created_at: bisher.created_at,
                updated_at: jetzt(),
                ..benutzer
            };
            users.ersetzen(&id, dokument(&neu)?).map_err(|e| {
                if e.ist_eindeutigkeit() {
                    DbError::eindeutigkeit(format!("E-Mail '{}' bereits registriert", neu.email))
                } else {
                    e
                }
            })?;
            Ok(neu)
        })
    }

    async fn delete_user(&self, id: Uuid) -> DbResult<()> {
        self.mutieren(|db| {
            if !db.sammlung_mut(USERS)?.loeschen(&id.to_string()) {
                return Err(DbError::nicht_gefunden(format!("User {id}")));
            }
            db.sammlung_mut(SESSIONS)?
                .loeschen_wo(&[("user_id", json!(id.to_string()))]);
            Ok(())
        })
    }
}
