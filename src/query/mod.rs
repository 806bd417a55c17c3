//! Question processing and result shaping.

pub mod pipeline;
pub mod result;
pub mod shaper;

pub use pipeline::QueryPipeline;
pub use result::{QueryResult, NO_RESULTS_MESSAGE};
pub use shaper::{prepare_report_result, to_table, to_table_from_report_input, Table};
