//! Report generation.
//!
//! Shapes query results into a bounded, text-only table and renders it.

pub mod pdf;
pub mod table;

pub use pdf::PdfReportGenerator;
pub use table::{format_cell, ReportTable, MAX_REPORT_ROWS};

use async_trait::async_trait;

use crate::error::Result;
use crate::query::QueryResult;

/// Renders a query result into a downloadable document.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Returns the document bytes. Any failure, including an empty document,
    /// is a `ReportGenerationFailed` error.
    async fn generate_report(&self, result: &QueryResult) -> Result<Vec<u8>>;
}
