//! Shapes raw rows into header/row tables.
//!
//! Two inputs are supported: records straight from an executor, and the
//! JSON a client posts back when requesting a report.

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::db::{Record, Row, Value};
use crate::error::{AppError, Result};
use crate::query::QueryResult;

/// Question used for reports that arrive without one.
pub const DEFAULT_REPORT_QUESTION: &str = "Database Query";

/// Statement text used for reports that arrive without one.
pub const DEFAULT_REPORT_SQL: &str = "-- SQL not provided";

/// Column headers plus rectangular rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Shapes executor records into a table.
///
/// Headers are the first record's column order. Later records are read in
/// that order; a column they lack becomes `Null` and extra columns are ignored.
pub fn to_table(records: Vec<Record>) -> Table {
    let Some(first) = records.first() else {
        return Table::default();
    };

    let headers: Vec<String> = first.columns().map(str::to_string).collect();
    let rows = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|header| record.get(header).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Table { headers, rows }
}

/// Shapes the `rows_json`/`headers_json` pair posted for a report.
///
/// `rows_json` must be a non-empty JSON array of objects. Headers come from
/// `headers_json` when it parses as an array of strings, otherwise from the
/// first row's keys. Cells missing from a row are rendered empty.
pub fn to_table_from_report_input(rows_json: &str, headers_json: Option<&str>) -> Result<Table> {
    if rows_json.trim().is_empty() {
        return Err(AppError::invalid_request_data(
            "rows_json",
            "No data provided for PDF generation",
        ));
    }

    let parsed: JsonValue = serde_json::from_str(rows_json).map_err(|e| {
        warn!("Invalid rows_json: {}", e);
        AppError::invalid_request_data("rows_json", format!("Invalid JSON format: {e}"))
            .with_source(e)
    })?;

    let JsonValue::Array(items) = parsed else {
        return Err(AppError::invalid_request_data(
            "rows_json",
            "Expected a JSON array of row objects",
        ));
    };

    if items.is_empty() {
        return Err(AppError::invalid_request_data(
            "rows_json",
            "No data rows provided",
        ));
    }

    let objects = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            JsonValue::Object(map) => Ok(map),
            _ => Err(AppError::invalid_request_data(
                "rows_json",
                format!("Row {index} is not a JSON object"),
            )),
        })
        .collect::<Result<Vec<_>>>()?;

    let headers = match headers_json.filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => match serde_json::from_str::<Vec<String>>(raw) {
            Ok(headers) => headers,
            Err(e) => {
                warn!("Invalid headers_json ({}), extracting from rows", e);
                objects[0].keys().cloned().collect()
            }
        },
        None => objects[0].keys().cloned().collect(),
    };

    if headers.is_empty() {
        return Err(AppError::invalid_request_data(
            "headers_json",
            "No headers found",
        ));
    }

    let rows = objects
        .iter()
        .map(|object| {
            headers
                .iter()
                .map(|header| match object.get(header) {
                    Some(cell) => Value::from(cell.clone()),
                    None => Value::String(String::new()),
                })
                .collect()
        })
        .collect();

    Ok(Table { headers, rows })
}

/// Builds the result a report is rendered from, out of posted form data.
///
/// Blank question and SQL fall back to placeholders; the execution time is 0
/// because nothing was executed.
pub fn prepare_report_result(
    question: Option<&str>,
    sql: Option<&str>,
    rows_json: &str,
    headers_json: Option<&str>,
) -> Result<QueryResult> {
    let table = to_table_from_report_input(rows_json, headers_json)?;

    let question = question
        .filter(|q| !q.trim().is_empty())
        .unwrap_or(DEFAULT_REPORT_QUESTION);
    let sql = sql
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_REPORT_SQL);

    Ok(QueryResult::new(question, table, 0).with_sql(sql))
}
