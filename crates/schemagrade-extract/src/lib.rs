//! Database extraction adapters.
//!
//! Grading consumes schemas and row counts through the [`SchemaExtractor`]
//! and [`RowCountProbe`] traits; the postgres module provides the sqlx-backed
//! implementation.

pub mod adapter;
pub mod postgres;

pub use adapter::{RowCountProbe, SchemaExtractor};
pub use postgres::{PostgresExtractor, PostgresRowCountProbe};

pub use schemagrade_core::Schema;
