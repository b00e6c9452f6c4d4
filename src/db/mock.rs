//! Mock database connector for testing.
//!
//! Hands out in-memory clients that return a canned result and record every
//! connect, fetch and close so tests can assert on the connection lifecycle.

use super::{Connector, DatabaseClient, QueryResult};
use crate::config::ConnectionParams;
use crate::error::{PeekError, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

/// Counters shared between a [`MockConnector`] and its clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockStats {
    /// Connection attempts, successful or not.
    pub connects: usize,
    /// Statements executed, in order.
    pub statements: Vec<String>,
    /// Clients closed through [`DatabaseClient::close`].
    pub closes: usize,
    /// Clients dropped without being closed.
    pub dropped: usize,
}

/// A connector that returns predefined results.
#[derive(Debug, Clone)]
pub struct MockConnector {
    result: QueryResult,
    connect_error: Option<String>,
    query_error: Option<String>,
    stats: Arc<Mutex<MockStats>>,
}

impl MockConnector {
    /// Creates a connector whose clients return `result` for every query.
    pub fn new(result: QueryResult) -> Self {
        Self {
            result,
            connect_error: None,
            query_error: None,
            stats: Arc::default(),
        }
    }

    /// Makes every connection attempt fail with the given driver message.
    pub fn fail_connect(mut self, message: impl Into<String>) -> Self {
        self.connect_error = Some(message.into());
        self
    }

    /// Makes every query fail with the given driver message.
    pub fn fail_query(mut self, message: impl Into<String>) -> Self {
        self.query_error = Some(message.into());
        self
    }

    /// Snapshot of the recorded activity.
    pub fn stats(&self) -> MockStats {
        lock(&self.stats).clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _params: &ConnectionParams) -> Result<Box<dyn DatabaseClient>> {
        lock(&self.stats).connects += 1;

        if let Some(message) = &self.connect_error {
            return Err(PeekError::connection(message.clone()));
        }

        Ok(Box::new(MockClient {
            result: self.result.clone(),
            query_error: self.query_error.clone(),
            stats: Arc::clone(&self.stats),
            closed: false,
        }))
    }
}

struct MockClient {
    result: QueryResult,
    query_error: Option<String>,
    stats: Arc<Mutex<MockStats>>,
    closed: bool,
}

#[async_trait]
impl DatabaseClient for MockClient {
    async fn fetch(&mut self, sql: &str) -> Result<QueryResult> {
        lock(&self.stats).statements.push(sql.to_string());

        match &self.query_error {
            Some(message) => Err(PeekError::query(message.clone())),
            None => Ok(self.result.clone()),
        }
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.closed = true;
        lock(&self.stats).closes += 1;
        Ok(())
    }
}

impl Drop for MockClient {
    fn drop(&mut self) {
        if !self.closed {
            lock(&self.stats).dropped += 1;
        }
    }
}

fn lock(stats: &Mutex<MockStats>) -> MutexGuard<'_, MockStats> {
    stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
