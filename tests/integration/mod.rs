//! Integration tests for SQL Assistant.

pub mod pipeline_test;
pub mod postgres_test;
pub mod server_test;
