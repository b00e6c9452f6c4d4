//! Database abstraction layer for sonde-peek.
//!
//! Provides trait-based seams for opening a connection and running a
//! statement, so the pipeline can run against PostgreSQL or an in-memory
//! mock. A [`Session`] owns the single open connection and releases it
//! exactly once.

mod mock;
mod postgres;
mod types;

pub use mock::{MockConnector, MockStats};
pub use postgres::{PostgresClient, PostgresConnector};
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionParams;
use crate::error::{PeekError, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Opens database connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a single connection using validated parameters.
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn DatabaseClient>>;
}

/// An open database connection.
#[async_trait]
pub trait DatabaseClient: Send {
    /// Executes a read query and materializes every returned row.
    async fn fetch(&mut self, sql: &str) -> Result<QueryResult>;

    /// Closes the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Scoped owner of the one open connection.
///
/// Create it right after a successful connect and call [`Session::release`]
/// on every exit path. Release is idempotent; if a session is dropped while
/// still open (e.g. during a panic) the client is dropped, which closes the
/// socket without the protocol goodbye.
pub struct Session {
    client: Option<Box<dyn DatabaseClient>>,
    target: String,
}

impl Session {
    /// Connects and wraps the new connection.
    pub async fn open(connector: &dyn Connector, params: &ConnectionParams) -> Result<Self> {
        let target = params.display_string();
        debug!("Connecting to {target}");

        let client = connector.connect(params).await?;
        info!("Connected to {target}");

        Ok(Self {
            client: Some(client),
            target,
        })
    }

    /// Returns true until the session has been released.
    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    /// Borrows the open client.
    pub fn client(&mut self) -> Result<&mut (dyn DatabaseClient + 'static)> {
        match self.client.as_deref_mut() {
            Some(client) => Ok(client),
            None => Err(PeekError::internal("Database session already released")),
        }
    }

    /// Closes the connection. Calling it again is a no-op.
    pub async fn release(&mut self) -> Result<()> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };

        let result = client.close().await;
        match &result {
            Ok(()) => info!("Disconnected from {}", self.target),
            Err(e) => warn!("Error while disconnecting from {}: {e}", self.target),
        }
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.client.take().is_some() {
            warn!(
                "Session for {} dropped without release, closing connection",
                self.target
            );
        }
    }
}
