//! Display-ready report data.

use crate::db::Value;
use crate::query::QueryResult;

/// Rows rendered into a report.
pub const MAX_REPORT_ROWS: usize = 50;

/// Longest cell rendered verbatim; longer cells are cut.
pub const MAX_CELL_CHARS: usize = 50;

/// Characters kept from a cut cell before the ellipsis.
const CUT_CELL_CHARS: usize = 47;

/// A query result shaped for rendering: text cells, bounded size and a
/// summary line.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub question: Option<String>,
    pub sql: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// `None` when there is nothing to show.
    pub summary: Option<String>,
}

impl ReportTable {
    pub fn from_query_result(result: &QueryResult) -> Self {
        let question = Some(result.question())
            .filter(|q| !q.is_empty())
            .map(str::to_string);
        let sql = result.sql().filter(|s| !s.is_empty()).map(str::to_string);

        if result.headers().is_empty() || result.rows().is_empty() {
            return Self {
                question,
                sql,
                headers: Vec::new(),
                rows: Vec::new(),
                summary: None,
            };
        }

        let rows = result
            .rows()
            .iter()
            .take(MAX_REPORT_ROWS)
            .map(|row| row.iter().map(format_cell).collect())
            .collect();

        Self {
            question,
            sql,
            headers: result.headers().to_vec(),
            rows,
            summary: Some(summary_line(result.rows().len(), result.execution_time_ms())),
        }
    }

    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }
}

/// Renders a cell as text: empty for null, cut to 47 chars plus `...` when
/// longer than 50.
pub fn format_cell(value: &Value) -> String {
    if value.is_null() {
        return String::new();
    }

    let text = value.to_display_string();
    if text.chars().count() > MAX_CELL_CHARS {
        let cut: String = text.chars().take(CUT_CELL_CHARS).collect();
        format!("{cut}...")
    } else {
        text
    }
}

fn summary_line(total_rows: usize, execution_time_ms: u64) -> String {
    let mut summary = format!("Total records: {total_rows}");
    if total_rows > MAX_REPORT_ROWS {
        summary.push_str(&format!(" (showing first {MAX_REPORT_ROWS} rows)"));
    }
    if execution_time_ms > 0 {
        summary.push_str(&format!(" | Execution time: {execution_time_ms}ms"));
    }
    summary
}
