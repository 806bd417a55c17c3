//! PostgreSQL executor.
//!
//! Implements [`SqlExecutor`] on top of a sqlx connection pool and provides
//! schema introspection for the SQL generator prompt.

use crate::config::DatabaseConfig;
use crate::db::{Column, Record, Schema, SqlExecutor, Table, Value};
use crate::error::{AppError, Result};
use crate::safety;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::time::Duration;
use tracing::{debug, info, warn};

/// PostgreSQL executor backed by a lazily connecting pool.
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    pool: PgPool,
}

impl PostgresExecutor {
    /// Creates an executor for the configured database.
    ///
    /// The pool connects on first use, so an unreachable server surfaces as a
    /// `DatastoreConnection` error per request rather than at startup.
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config.validated_url()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy(url)
            .map_err(|e| {
                AppError::datastore_connection()
                    .with_detail("db_url_provided", true)
                    .with_source(e)
            })?;

        info!("Database pool configured for {}", config.display_string());
        Ok(Self { pool })
    }

    /// Creates an executor from an existing connection pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Introspects columns and foreign keys of `include_tables` in the public schema.
    ///
    /// Tables are returned in the order given.
    pub async fn introspect_schema(&self, include_tables: &[String]) -> Result<Schema> {
        let columns: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT table_name::text, column_name::text, data_type::text
            FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = ANY($1)
            ORDER BY table_name, ordinal_position
            "#,
        )
        .bind(include_tables)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_execution_error(e, "information_schema.columns"))?;

        let foreign_keys: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT
                kcu.table_name::text,
                kcu.column_name::text,
                ccu.table_name::text,
                ccu.column_name::text
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON tc.constraint_name = ccu.constraint_name
                AND tc.table_schema = ccu.table_schema
            WHERE tc.table_schema = 'public'
                AND tc.constraint_type = 'FOREIGN KEY'
                AND kcu.table_name = ANY($1)
            "#,
        )
        .bind(include_tables)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_execution_error(e, "information_schema.table_constraints"))?;

        let tables = include_tables
            .iter()
            .map(|table_name| {
                let table_columns = columns
                    .iter()
                    .filter(|(table, _, _)| table == table_name)
                    .map(|(_, column, data_type)| {
                        let fk = foreign_keys
                            .iter()
                            .find(|(from_t, from_c, _, _)| from_t == table_name && from_c == column);
                        match fk {
                            Some((_, _, to_table, to_column)) => {
                                Column::new(column, data_type).references(to_table, to_column)
                            }
                            None => Column::new(column, data_type),
                        }
                    })
                    .collect::<Vec<_>>();
                Table::new(table_name).with_columns(table_columns)
            })
            .filter(|table| !table.columns.is_empty())
            .collect();

        Ok(Schema { tables })
    }

    /// Closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SqlExecutor for PostgresExecutor {
    async fn execute(&self, sql: &str) -> Result<Vec<Record>> {
        info!("Executing SQL query: {}", sql);

        if !safety::is_safe(sql) {
            warn!("Unsafe SQL blocked at executor: {}", sql);
            return Err(AppError::unsafe_statement(Some(sql)));
        }

        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_execution_error(e, sql))?;

        debug!("Query returned {} rows", rows.len());
        Ok(rows.iter().map(convert_row).collect())
    }
}

/// Converts a sqlx PgRow to a Record, keeping column order.
fn convert_row(row: &PgRow) -> Record {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| (col.name().to_string(), convert_value(row, i, col.type_info().name())))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "NUMERIC" => row
            .try_get::<Option<Decimal>, _>(index)
            .ok()
            .flatten()
            .map(|d| match d.to_f64() {
                Some(f) => Value::Float(f),
                None => Value::String(d.to_string()),
            })
            .unwrap_or(Value::Null),

        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)
            .ok()
            .flatten()
            .map(Value::Date)
            .unwrap_or(Value::Null),

        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)
            .ok()
            .flatten()
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),

        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .ok()
            .flatten()
            .map(|ts| Value::Timestamp(ts.naive_utc()))
            .unwrap_or(Value::Null),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(|b| Value::String(format!("<{} bytes>", b.len())))
            .unwrap_or(Value::Null),

        // For all other types, try to get as string
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Returns true if the failure means the database could not be reached,
/// as opposed to the statement being rejected.
fn is_connection_error(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Configuration(_) => true,
        // SQLSTATE 08xxx: connection exception, 28xxx: invalid authorization,
        // 3D000: database does not exist.
        sqlx::Error::Database(db_error) => db_error
            .code()
            .map(|code| code.starts_with("08") || code.starts_with("28") || code == "3D000")
            .unwrap_or(false),
        _ => false,
    }
}

/// Short machine-readable name of the sqlx failure.
fn error_type(error: &sqlx::Error) -> &'static str {
    match error {
        sqlx::Error::Database(_) => "DatabaseError",
        sqlx::Error::Io(_) => "IoError",
        sqlx::Error::Tls(_) => "TlsError",
        sqlx::Error::PoolTimedOut => "PoolTimedOut",
        sqlx::Error::PoolClosed => "PoolClosed",
        sqlx::Error::Configuration(_) => "ConfigurationError",
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => "DecodeError",
        sqlx::Error::Protocol(_) => "ProtocolError",
        _ => "SqlxError",
    }
}

/// Maps a sqlx failure to the connection or execution error kind.
fn map_execution_error(error: sqlx::Error, sql: &str) -> AppError {
    let kind = error_type(&error);
    warn!("Database error ({}): {}", kind, format_query_error(&error));

    if is_connection_error(&error) {
        return AppError::datastore_connection()
            .with_detail("error_type", kind)
            .with_source(error);
    }

    AppError::datastore_execution(Some(sql))
        .with_detail("error_type", kind)
        .with_detail("query_length", sql.chars().count())
        .with_source(error)
}

/// Formats a query error with PostgreSQL detail and hint when available.
fn format_query_error(error: &sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = format!("ERROR: {}", db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
        if let Some(column) = pg_error.column() {
            result.push_str("\n  COLUMN: ");
            result.push_str(column);
        }
    }

    result
}
