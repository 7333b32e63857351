//! The column-store boundary.
//!
//! The storage facade never talks to a store directly: it hands compiled
//! [`Statement`]s to an [`Executor`] and reads back [`Row`]s. A [`Connector`]
//! opens executor sessions against a set of contact points.
//!
//! Both traits use `#[async_trait]` so that sessions can be held as
//! `Arc<dyn Executor>`.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::statement::{Row, Statement};

/// Errors reported by an executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The table (or index) to create already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),
    /// The table to alter, drop or query does not exist.
    #[error("{0} does not exist")]
    NotFound(String),
    /// The store rejected the statement.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// No contact point could be reached.
    #[error("no host available: {0}")]
    Unavailable(String),
    /// Any other failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Runs statements against a column store.
#[async_trait]
pub trait Executor: Send + Sync + fmt::Debug {
    /// Execute one statement and return the rows it produced.
    ///
    /// Writes and DDL return no rows.
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, ExecutorError>;
}

/// Opens executor sessions.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// The session type produced by this connector.
    type Session: Executor + 'static;

    /// Connect to the cluster reachable through `contact_points`.
    async fn connect(&self, contact_points: &[String]) -> Result<Self::Session, ExecutorError>;
}
