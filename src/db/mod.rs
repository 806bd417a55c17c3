//! Database abstraction layer.
//!
//! Provides the [`SqlExecutor`] trait the query pipeline executes through,
//! a PostgreSQL implementation and an in-memory mock.

mod mock;
mod postgres;
mod schema;
mod types;

pub use mock::MockExecutor;
pub use postgres::PostgresExecutor;
pub use schema::{Column, Schema, Table, DEFAULT_TABLES};
pub use types::{Record, Row, Value};

use crate::error::Result;
use async_trait::async_trait;

/// Executes SQL statements and returns ordered rows.
///
/// Connection-level failures surface as `DatastoreConnection` errors and
/// statement-level failures as `DatastoreExecution` errors.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Executes `sql` and returns every row it produced.
    async fn execute(&self, sql: &str) -> Result<Vec<Record>>;
}
