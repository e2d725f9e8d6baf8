//! Cassandra/ScyllaDB-Backend (Feature `cassandra`)
//!
//! Eindeutigkeit gibt es in Cassandra nur ueber den Primaerschluessel.
//! E-Mail und (email, identifier) werden deshalb ueber eigene
//! Lookup-Tabellen per Lightweight-Transaction (`IF NOT EXISTS`) reserviert.

mod env;
mod sessions;
mod users;
mod verifications;
mod zeilen;

use async_trait::async_trait;
use scylla::client::caching_session::CachingSession;
use scylla::client::execution_profile::ExecutionProfile;
use scylla::client::session_builder::SessionBuilder;
use scylla::deserialize::row::DeserializeRow;
use scylla::response::query_result::QueryResult;
use scylla::serialize::row::SerializeRow;
use scylla::statement::{Consistency, SerialConsistency};
use scylla::value::{CqlValue, Row};
use tracing::{debug, info};

use crate::error::DbError;
use crate::provider::bezeichner_pruefen;
use crate::repository::{DatabaseBackend, DatabaseConfig, DbResult, Provider};
use crate::retry::mit_wiederholung;
use crate::secrets::TlsMaterial;

/// Anzahl gecachter Prepared Statements
const STATEMENT_CACHE: usize = 64;

pub(crate) fn cassandra_fehler(e: impl std::fmt::Display) -> DbError {
    DbError::Cassandra(e.to_string())
}

/// Cassandra-Provider mit Prepared-Statement-Cache
pub struct CassandraDb {
    session: CachingSession,
    keyspace: String,
}

impl std::fmt::Debug for CassandraDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CassandraDb")
            .field("keyspace", &self.keyspace)
            .finish_non_exhaustive()
    }
}

impl CassandraDb {
    /// Verbindet zum Cluster und stellt Keyspace, Tabellen und Indizes sicher
    pub async fn oeffnen(config: &DatabaseConfig) -> DbResult<Self> {
        bezeichner_pruefen(&config.name)?;
        let knoten = config.knoten();
        if knoten.is_empty() {
            return Err(DbError::Konfiguration("Keine Cassandra-Knoten konfiguriert".into()));
        }

        let profil = ExecutionProfile::builder()
            .consistency(Consistency::LocalQuorum)
            .serial_consistency(Some(SerialConsistency::LocalSerial))
            .build();

        let mut builder = SessionBuilder::new()
            .known_nodes(&knoten)
            .default_execution_profile_handle(profil.into_handle());

        if let Some((benutzer, passwort)) = config.zugangsdaten() {
            builder = builder.user(benutzer, passwort);
        }
        if let Some(material) = TlsMaterial::aus_config(config)? {
            builder = builder.tls_context(Some(material.client_config()?));
            debug!("Cassandra-Verbindung mit TLS-Client-Zertifikat");
        }

        let session = mit_wiederholung(config.verbindungsversuche, "Cassandra-Verbindung", || {
            builder.build()
        })
        .await
        .map_err(|e| DbError::NichtVerfuegbar(e.to_string()))?;

        info!(knoten = ?knoten, keyspace = %config.name, "Cassandra-Session aufgebaut");

        let db = Self {
            session: CachingSession::from(session, STATEMENT_CACHE),
            keyspace: config.name.clone(),
        };
        db.schema_sicherstellen(config.replikationsfaktor).await?;
        Ok(db)
    }

    /// Idempotentes Anlegen von Keyspace, Tabellen und Indizes
    async fn schema_sicherstellen(&self, replikationsfaktor: u32) -> DbResult<()> {
        let vorhanden: Option<(String,)> = self
            .erste_zeile(
                "SELECT keyspace_name FROM system_schema.keyspaces WHERE keyspace_name = ?",
                (&self.keyspace,),
            )
            .await?;

        if vorhanden.is_none() {
            let cql = format!(
                "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = \
                 {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
                self.keyspace,
                replikationsfaktor.max(1)
            );
            self.ddl(&cql).await?;
            info!(keyspace = %self.keyspace, "Keyspace angelegt");
        }

        let ks = &self.keyspace;
        let anweisungen = [
            format!(
                "CREATE TABLE IF NOT EXISTS {ks}.users (
                    id text PRIMARY KEY, email text, email_verified_at bigint, password text,
                    signup_methods text, given_name text, family_name text, middle_name text,
                    nickname text, gender text, birthdate text, phone_number text,
                    phone_number_verified_at bigint, picture text, roles text,
                    revoked_timestamp bigint, created_at bigint, updated_at bigint)"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {ks}.users_by_email (
                    email text PRIMARY KEY, user_id text)"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {ks}.sessions (
                    id text PRIMARY KEY, user_id text, user_agent text, ip text,
                    created_at bigint, updated_at bigint)"
            ),
            format!("CREATE INDEX IF NOT EXISTS authwerk_sessions_user_id ON {ks}.sessions (user_id)"),
            // `token` ist in CQL reserviert
            format!(
                "CREATE TABLE IF NOT EXISTS {ks}.verification_requests (
                    id text PRIMARY KEY, jwt_token text, identifier text, email text,
                    expires_at bigint, nonce text, redirect_uri text,
                    created_at bigint, updated_at bigint)"
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS authwerk_verification_jwt_token \
                 ON {ks}.verification_requests (jwt_token)"
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS authwerk_verification_identifier \
                 ON {ks}.verification_requests (identifier)"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {ks}.verification_requests_by_email_identifier (
                    email text, identifier text, request_id text,
                    PRIMARY KEY ((email, identifier)))"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {ks}.env (
                    id text PRIMARY KEY, env text, hash text,
                    created_at bigint, updated_at bigint)"
            ),
        ];

        for cql in &anweisungen {
            self.ddl(cql).await?;
        }
        info!(keyspace = %self.keyspace, "Cassandra-Schema sichergestellt");
        Ok(())
    }

    /// DDL ueber die ungecachte Session; "existiert bereits" gilt als Erfolg
    async fn ddl(&self, cql: &str) -> DbResult<()> {
        match self.session.get_session().query_unpaged(cql, ()).await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().to_lowercase().contains("already exist") => {
                debug!(fehler = %e, "Schema-Objekt existiert bereits");
                Ok(())
            }
            Err(e) => Err(cassandra_fehler(e)),
        }
    }

    pub(crate) fn tabelle(&self, name: &str) -> String {
        format!("{}.{}", self.keyspace, name)
    }

    pub(crate) async fn ausfuehren(
        &self,
        cql: String,
        werte: impl SerializeRow,
    ) -> DbResult<QueryResult> {
        self.session
            .execute_unpaged(cql, werte)
            .await
            .map_err(cassandra_fehler)
    }

    pub(crate) async fn zeilen<R>(&self, cql: impl Into<String>, werte: impl SerializeRow) -> DbResult<Vec<R>>
    where
        R: for<'f, 'm> DeserializeRow<'f, 'm>,
    {
        let ergebnis = self
            .ausfuehren(cql.into(), werte)
            .await?
            .into_rows_result()
            .map_err(cassandra_fehler)?;
        let zeilen = ergebnis
            .rows::<R>()
            .map_err(cassandra_fehler)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(cassandra_fehler)?;
        Ok(zeilen)
    }

    pub(crate) async fn erste_zeile<R>(
        &self,
        cql: impl Into<String>,
        werte: impl SerializeRow,
    ) -> DbResult<Option<R>>
    where
        R: for<'f, 'm> DeserializeRow<'f, 'm>,
    {
        Ok(self.zeilen(cql, werte).await?.into_iter().next())
    }

    /// Fuehrt eine Lightweight-Transaction aus und liefert `[applied]`
    pub(crate) async fn bedingt(&self, cql: String, werte: impl SerializeRow) -> DbResult<bool> {
        let zeile: Option<Row> = self.erste_zeile(cql, werte).await?;
        Ok(matches!(
            zeile.as_ref().and_then(|z| z.columns.first()),
            Some(Some(CqlValue::Boolean(true)))
        ))
    }
}

#[async_trait]
impl Provider for CassandraDb {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Cassandra
    }

    async fn pruefen(&self) -> DbResult<()> {
        self.session
            .get_session()
            .query_unpaged("SELECT release_version FROM system.local", ())
            .await
            .map_err(|e| DbError::NichtVerfuegbar(e.to_string()))?;
        Ok(())
    }
}
