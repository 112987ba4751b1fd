use async_trait::async_trait;

use schemagrade_core::{Result, Schema, SchemaSource};

/// Trait implemented by database adapters that can extract a gradable schema.
#[async_trait]
pub trait SchemaExtractor: Send + Sync {
    /// Returns the engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    /// Extract tables, columns, primary keys, and foreign keys.
    async fn extract(&self, source: SchemaSource) -> Result<Schema>;
}

/// Trait for counting rows in a single table.
#[async_trait]
pub trait RowCountProbe: Send + Sync {
    /// Count rows using the table's **original** identifier, exactly as
    /// stored in the database.
    async fn count_rows(&self, original_table_name: &str) -> Result<i64>;
}
