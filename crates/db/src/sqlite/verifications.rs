//! SQLite-Implementierung des VerificationRepository

use async_trait::async_trait;
use sqlx::Row as _;
use uuid::Uuid;

use authwerk_core::types::{Paginierung, Seite, VerifizierungsZweck};

use crate::error::DbError;
use crate::models::{email_normalisieren, jetzt, NeueVerifizierung, VerifizierungRecord};
use crate::repository::{DbResult, VerificationRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::zeilen::{uuid_spalte, zeit_spalte, zeit_text};

const SPALTEN: &str =
    "id, token, identifier, email, expires_at, nonce, redirect_uri, created_at, updated_at";

#[async_trait]
impl VerificationRepository for SqliteDb {
    async fn upsert_verification(
        &self,
        data: NeueVerifizierung,
    ) -> DbResult<VerifizierungRecord> {
        let record = data.in_record(jetzt());

        // Eine Anfrage pro (email, identifier): bestehende wird ersetzt,
        // ID und created_at bleiben erhalten
        let row = sqlx::query(&format!(
            "INSERT INTO verification_requests ({SPALTEN})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(email, identifier) DO UPDATE SET
                 token = excluded.token,
                 expires_at = excluded.expires_at,
                 nonce = excluded.nonce,
                 redirect_uri = excluded.redirect_uri,
                 updated_at = excluded.updated_at
             RETURNING {SPALTEN}"
        ))
        .bind(record.id.to_string())
        .bind(&record.token)
        .bind(record.identifier.als_str())
        .bind(&record.email)
        .bind(zeit_text(&record.expires_at))
        .bind(&record.nonce)
        .bind(&record.redirect_uri)
        .bind(zeit_text(&record.created_at))
        .bind(zeit_text(&record.updated_at))
        .fetch_one(&self.pool)
        .await?;

        row_to_verifizierung(&row)
    }

    async fn get_verification(&self, id: Uuid) -> DbResult<VerifizierungRecord> {
        let row = sqlx::query(&format!(
            "SELECT {SPALTEN} FROM verification_requests WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::nicht_gefunden(format!("Verifizierungsanfrage {id}")))?;

        row_to_verifizierung(&row)
    }

    async fn get_verification_by_token(&self, token: &str) -> DbResult<VerifizierungRecord> {
        let row = sqlx::query(&format!(
            "SELECT {SPALTEN} FROM verification_requests WHERE token = ?"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::nicht_gefunden("Verifizierungsanfrage zum Token"))?;

        row_to_verifizierung(&row)
    }

    async fn get_verification_by_email(
        &self,
        email: &str,
        identifier: VerifizierungsZweck,
    ) -> DbResult<VerifizierungRecord> {
        let email = email_normalisieren(email);
        let row = sqlx::query(&format!(
            "SELECT {SPALTEN} FROM verification_requests WHERE email = ? AND identifier = ?"
        ))
        .bind(&email)
        .bind(identifier.als_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            DbError::nicht_gefunden(format!("Verifizierungsanfrage {identifier} fuer '{email}'"))
        })?;

        row_to_verifizierung(&row)
    }

    async fn list_verifications(
        &self,
        paginierung: Paginierung,
    ) -> DbResult<Seite<VerifizierungRecord>> {
        let paginierung = paginierung.begrenzt();

        let gesamt: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verification_requests")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {SPALTEN} FROM verification_requests
             ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        ))
        .bind(paginierung.limit as i64)
        .bind(paginierung.offset_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(Seite {
            eintraege: rows
                .iter()
                .map(row_to_verifizierung)
                .collect::<DbResult<_>>()?,
            gesamt: gesamt as u64,
            paginierung,
        })
    }

    async fn delete_verification(&self, id: Uuid) -> DbResult<()> {
        let affected = sqlx::query("DELETE FROM verification_requests WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Verifizierungsanfrage {id}")));
        }
        Ok(())
    }
}

fn row_to_verifizierung(row: &sqlx::sqlite::SqliteRow) -> DbResult<VerifizierungRecord> {
    let identifier: String = row.try_get("identifier")?;
    Ok(VerifizierungRecord {
        id: uuid_spalte(row, "id")?,
        token: row.try_get("token")?,
        identifier: identifier.parse().map_err(DbError::UngueltigeDaten)?,
        email: row.try_get("email")?,
        expires_at: zeit_spalte(row, "expires_at")?,
        nonce: row.try_get("nonce")?,
        redirect_uri: row.try_get("redirect_uri")?,
        created_at: zeit_spalte(row, "created_at")?,
        updated_at: zeit_spalte(row, "updated_at")?,
    })
}
