//! Session pool with equality-based connection reuse.
//!
//! One live connection pool per distinct backend target: two logical
//! servers with the same (username, host, password, port) share a session
//! even when their display names differ. The scan-connect-insert sequence
//! runs under a single lock so concurrent callers cannot race a duplicate
//! connection into the pool.

use std::sync::Arc;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use tokio::sync::Mutex;

use crate::error::Error;

/// Connection coordinates for one logical server, with credentials already
/// resolved against the cluster defaults.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    /// Display name, for diagnostics only.
    pub name: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl ConnectionSpec {
    /// Backend identity: two specs with equal username, host, password and
    /// port address the same database server. The display name and database
    /// are excluded on purpose.
    pub fn same_backend(&self, other: &ConnectionSpec) -> bool {
        self.username == other.username
            && self.host == other.host
            && self.password == other.password
            && self.port == other.port
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
            .ssl_mode(PgSslMode::Disable)
    }
}

/// An open database handle bound to one backend identity.
pub struct Session {
    spec: ConnectionSpec,
    pool: PgPool,
}

impl Session {
    pub fn spec(&self) -> &ConnectionSpec {
        &self.spec
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Process-wide cache of open sessions, keyed by backend identity.
pub struct SessionPool {
    sessions: Mutex<Vec<Arc<Session>>>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Return the cached session for this backend, or open a new one.
    ///
    /// A failed open or liveness check is never inserted, so the next call
    /// retries from scratch.
    pub async fn get_or_create(&self, spec: &ConnectionSpec) -> Result<Arc<Session>, Error> {
        let mut sessions = self.sessions.lock().await;

        if let Some(existing) = find_session(&sessions, spec) {
            tracing::debug!(
                logical_server = %spec.name,
                cached_for = %existing.spec.name,
                "reusing pooled session"
            );
            return Ok(existing);
        }

        let connection_error = |source: sqlx::Error| Error::Connection {
            server: spec.name.clone(),
            host: spec.host.clone(),
            port: spec.port,
            database: spec.database.clone(),
            source,
        };

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(spec.connect_options())
            .await
            .map_err(&connection_error)?;

        // Liveness check before the session becomes visible to callers.
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(&connection_error)?;

        tracing::debug!(
            logical_server = %spec.name,
            host = %spec.host,
            port = spec.port,
            database = %spec.database,
            "opened session"
        );

        let session = Arc::new(Session {
            spec: spec.clone(),
            pool,
        });
        sessions.push(session.clone());
        Ok(session)
    }
}

impl Default for SessionPool {
    fn default() -> Self {
        Self::new()
    }
}

fn find_session(sessions: &[Arc<Session>], spec: &ConnectionSpec) -> Option<Arc<Session>> {
    sessions
        .iter()
        .find(|s| s.spec.same_backend(spec))
        .cloned()
}
