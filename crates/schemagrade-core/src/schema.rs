use serde::{Deserialize, Serialize};

/// Which side of a grading run a schema came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SchemaSource {
    Answer,
    Student,
}

/// Snapshot of one database schema as extracted for grading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub source: SchemaSource,
    /// Database name when available.
    pub database: Option<String>,
    pub tables: Vec<TableDef>,
}

impl Schema {
    /// Look up a table by its normalized name.
    pub fn table(&self, normalized_name: &str) -> Option<&TableDef> {
        self.tables
            .iter()
            .find(|table| table.normalized_name == normalized_name)
    }
}

/// A table as stored in the database, carrying both identity forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    /// Identifier exactly as stored. Every row-count query uses this form,
    /// never the normalized one.
    pub original_name: String,
    pub normalized_name: String,
    pub columns: Vec<ColumnDef>,
    /// Primary key column names (original form), in key order.
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDef>,
}

impl TableDef {
    /// Look up a column by its normalized name.
    pub fn column(&self, normalized_name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|column| column.normalized_name == normalized_name)
    }

    /// Whether the named column participates in the primary key.
    pub fn is_primary_key(&self, original_name: &str) -> bool {
        self.primary_key
            .iter()
            .any(|column| column.eq_ignore_ascii_case(original_name))
    }
}

/// Column metadata relevant to matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub original_name: String,
    pub normalized_name: String,
    pub type_category: TypeCategory,
    pub is_nullable: bool,
}

/// Coarse declared-type family used as a matching tie-break.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    Numeric,
    Text,
    Date,
    Other,
}

impl TypeCategory {
    /// Classify a raw SQL type name into a category.
    pub fn from_sql_type(raw: &str) -> Self {
        let lowered = raw.trim().to_ascii_lowercase();
        let base = lowered.split('(').next().unwrap_or(&lowered).trim();
        match base {
            "int" | "integer" | "int2" | "int4" | "int8" | "smallint" | "bigint" | "tinyint"
            | "decimal" | "numeric" | "money" | "smallmoney" | "real" | "float" | "float4"
            | "float8" | "double precision" | "serial" | "bigserial" => Self::Numeric,
            "char" | "character" | "varchar" | "character varying" | "nchar" | "nvarchar"
            | "text" | "ntext" | "citext" => Self::Text,
            "date" | "datetime" | "datetime2" | "smalldatetime" | "time" | "timestamp"
            | "timestamptz" | "timestamp with time zone" | "timestamp without time zone"
            | "time with time zone" | "time without time zone" => Self::Date,
            _ => Self::Other,
        }
    }
}

/// Foreign key edge preserving column ordering on both sides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyDef {
    /// Table declaring the key (original name).
    pub source_table: String,
    pub source_columns: Vec<String>,
    /// Referenced table (original name).
    pub target_table: String,
    pub target_columns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_sql_types_into_categories() {
        assert_eq!(TypeCategory::from_sql_type("INT"), TypeCategory::Numeric);
        assert_eq!(
            TypeCategory::from_sql_type("numeric(10,2)"),
            TypeCategory::Numeric
        );
        assert_eq!(
            TypeCategory::from_sql_type("character varying(50)"),
            TypeCategory::Text
        );
        assert_eq!(
            TypeCategory::from_sql_type("timestamp without time zone"),
            TypeCategory::Date
        );
        assert_eq!(TypeCategory::from_sql_type("bytea"), TypeCategory::Other);
    }
}
