//! Core contracts and helpers for schemagrade.
//!
//! This crate defines the schema data model shared by the matching and
//! grading crates, the identifier normalizer, the grading configuration,
//! and validation helpers.

pub mod config;
pub mod error;
pub mod normalize;
pub mod schema;
pub mod validation;

pub use config::{CategoryWeights, GradingConfig};
pub use error::{Error, Result};
pub use normalize::NameNormalizer;
pub use schema::{ColumnDef, ForeignKeyDef, Schema, SchemaSource, TableDef, TypeCategory};
pub use validation::validate_schema;
