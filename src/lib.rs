//! SQL Assistant - answers natural-language questions about a PostgreSQL
//! database by generating, vetting and running read-only SQL.
//!
//! This library exposes the core modules for the server binary and the
//! integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod logging;
pub mod query;
pub mod report;
pub mod safety;
pub mod server;
pub mod voice;
