use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::schema::Schema;

/// Validate internal consistency of an extracted schema.
///
/// This checks:
/// - table names unique after normalization (case-insensitive)
/// - column names unique within a table
/// - primary key columns exist
/// - foreign key arity, columns, and referenced targets
pub fn validate_schema(schema: &Schema) -> Result<()> {
    let mut catalog: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut tables_by_original: BTreeMap<String, &str> = BTreeMap::new();

    for table in &schema.tables {
        if catalog.contains_key(&table.normalized_name) {
            return Err(Error::InvalidSchema(format!(
                "duplicate table name after normalization: {}",
                table.normalized_name
            )));
        }

        let mut columns = BTreeSet::new();
        for column in &table.columns {
            if !columns.insert(column.original_name.to_lowercase()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate column name: {}.{}",
                    table.original_name, column.original_name
                )));
            }
        }

        tables_by_original.insert(table.original_name.to_lowercase(), &table.original_name);
        catalog.insert(table.normalized_name.clone(), columns);
    }

    for table in &schema.tables {
        let columns = catalog
            .get(&table.normalized_name)
            .ok_or_else(|| {
                Error::InvalidSchema(format!("missing table in catalog: {}", table.original_name))
            })?;

        for key_column in &table.primary_key {
            if !columns.contains(&key_column.to_lowercase()) {
                return Err(Error::InvalidSchema(format!(
                    "primary key column not found: {}.{}",
                    table.original_name, key_column
                )));
            }
        }

        for fk in &table.foreign_keys {
            if fk.source_columns.len() != fk.target_columns.len() {
                return Err(Error::InvalidSchema(format!(
                    "foreign key column count mismatch on {}: {} source vs {} target",
                    table.original_name,
                    fk.source_columns.len(),
                    fk.target_columns.len()
                )));
            }

            for column in &fk.source_columns {
                if !columns.contains(&column.to_lowercase()) {
                    return Err(Error::InvalidSchema(format!(
                        "foreign key column not found: {}.{}",
                        table.original_name, column
                    )));
                }
            }

            if !tables_by_original.contains_key(&fk.target_table.to_lowercase()) {
                return Err(Error::InvalidSchema(format!(
                    "referenced table not found: {}",
                    fk.target_table
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ForeignKeyDef, SchemaSource, TableDef, TypeCategory};

    fn column(name: &str) -> ColumnDef {
        ColumnDef {
            original_name: name.to_string(),
            normalized_name: name.to_lowercase(),
            type_category: TypeCategory::Text,
            is_nullable: true,
        }
    }

    fn table(name: &str, columns: Vec<ColumnDef>) -> TableDef {
        TableDef {
            original_name: name.to_string(),
            normalized_name: name.to_lowercase(),
            columns,
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    fn schema(tables: Vec<TableDef>) -> Schema {
        Schema {
            source: SchemaSource::Answer,
            database: None,
            tables,
        }
    }

    #[test]
    fn accepts_consistent_schema() {
        let mut orders = table("Orders", vec![column("Id"), column("CustomerId")]);
        orders.primary_key = vec!["Id".to_string()];
        orders.foreign_keys = vec![ForeignKeyDef {
            source_table: "Orders".to_string(),
            source_columns: vec!["CustomerId".to_string()],
            target_table: "Customers".to_string(),
            target_columns: vec!["Id".to_string()],
        }];
        let customers = table("Customers", vec![column("Id")]);
        validate_schema(&schema(vec![orders, customers])).expect("valid schema");
    }

    #[test]
    fn rejects_tables_colliding_after_normalization() {
        let result = validate_schema(&schema(vec![
            table("Orders", vec![column("Id")]),
            table("ORDERS", vec![column("Id")]),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_fk_arity_mismatch() {
        let mut orders = table("Orders", vec![column("Id"), column("CustomerId")]);
        orders.foreign_keys = vec![ForeignKeyDef {
            source_table: "Orders".to_string(),
            source_columns: vec!["CustomerId".to_string()],
            target_table: "Customers".to_string(),
            target_columns: vec!["Id".to_string(), "Region".to_string()],
        }];
        let customers = table("Customers", vec![column("Id")]);
        assert!(validate_schema(&schema(vec![orders, customers])).is_err());
    }

    #[test]
    fn rejects_missing_fk_target() {
        let mut orders = table("Orders", vec![column("Id"), column("CustomerId")]);
        orders.foreign_keys = vec![ForeignKeyDef {
            source_table: "Orders".to_string(),
            source_columns: vec!["CustomerId".to_string()],
            target_table: "Customers".to_string(),
            target_columns: vec!["Id".to_string()],
        }];
        assert!(validate_schema(&schema(vec![orders])).is_err());
    }
}
