//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for durable account storage
//! - An in-memory map for tests and ephemeral use

pub mod duckdb;
pub mod memory;
