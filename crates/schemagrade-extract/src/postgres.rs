use async_trait::async_trait;
use sqlx::{PgPool, Row};

use schemagrade_core::{
    ColumnDef, Error, ForeignKeyDef, NameNormalizer, Result, Schema, SchemaSource, TableDef,
    TypeCategory,
};

use crate::adapter::{RowCountProbe, SchemaExtractor};

/// Extracts a gradable schema from a PostgreSQL database.
#[derive(Debug, Clone)]
pub struct PostgresExtractor {
    pool: PgPool,
    schema: String,
    normalizer: NameNormalizer,
}

impl PostgresExtractor {
    /// Create an extractor over the `public` schema.
    pub fn new(pool: PgPool, normalizer: NameNormalizer) -> Self {
        Self {
            pool,
            schema: "public".to_string(),
            normalizer,
        }
    }

    /// Override the namespace to extract from.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }
}

#[async_trait]
impl SchemaExtractor for PostgresExtractor {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn extract(&self, source: SchemaSource) -> Result<Schema> {
        let database = fetch_database_name(&self.pool).await?;
        let table_names = list_tables(&self.pool, &self.schema).await?;

        let mut tables = Vec::with_capacity(table_names.len());
        for name in table_names {
            let columns = list_columns(&self.pool, &self.schema, &name, &self.normalizer).await?;
            let primary_key = get_primary_key(&self.pool, &self.schema, &name).await?;
            let foreign_keys = list_foreign_keys(&self.pool, &self.schema, &name).await?;
            tables.push(TableDef {
                normalized_name: self.normalizer.normalize(&name),
                original_name: name,
                columns,
                primary_key,
                foreign_keys,
            });
        }
        tables.sort_by(|left, right| left.normalized_name.cmp(&right.normalized_name));

        tracing::debug!(
            event = "schema_extracted",
            database = %database,
            tables = tables.len()
        );

        Ok(Schema {
            source,
            database: Some(database),
            tables,
        })
    }
}

/// Counts rows via `select count(*)` against the original identifier.
#[derive(Debug, Clone)]
pub struct PostgresRowCountProbe {
    pool: PgPool,
}

impl PostgresRowCountProbe {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RowCountProbe for PostgresRowCountProbe {
    async fn count_rows(&self, original_table_name: &str) -> Result<i64> {
        // The identifier cannot be a bind parameter; quoting keeps names with
        // unexpected casing or punctuation queryable.
        let sql = format!(
            r#"select count(*) from "{}""#,
            original_table_name.replace('"', "\"\"")
        );
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| Error::Db(err.to_string()))
    }
}

async fn fetch_database_name(pool: &PgPool) -> Result<String> {
    sqlx::query_scalar::<_, String>("select current_database()")
        .fetch_one(pool)
        .await
        .map_err(|err| Error::Db(err.to_string()))
}

async fn list_tables(pool: &PgPool, schema: &str) -> Result<Vec<String>> {
    let rows = sqlx::query(
        r#"
        select c.relname as name
        from pg_class c
        join pg_namespace n on n.oid = c.relnamespace
        where n.nspname = $1
          and c.relkind = 'r'
        order by c.relname
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(|err| Error::Db(err.to_string()))?;

    rows.into_iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|err| Error::Db(err.to_string()))
}

async fn list_columns(
    pool: &PgPool,
    schema: &str,
    table: &str,
    normalizer: &NameNormalizer,
) -> Result<Vec<ColumnDef>> {
    let rows = sqlx::query(
        r#"
        select
          a.attname as name,
          pg_catalog.format_type(a.atttypid, a.atttypmod) as data_type,
          (not a.attnotnull) as is_nullable
        from pg_attribute a
        join pg_class c on c.oid = a.attrelid
        join pg_namespace n on n.oid = c.relnamespace
        where n.nspname = $1
          and c.relname = $2
          and a.attnum > 0
          and not a.attisdropped
        order by a.attnum
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|err| Error::Db(err.to_string()))?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row
            .try_get("name")
            .map_err(|err| Error::Db(err.to_string()))?;
        let data_type: String = row
            .try_get("data_type")
            .map_err(|err| Error::Db(err.to_string()))?;
        let is_nullable: bool = row
            .try_get("is_nullable")
            .map_err(|err| Error::Db(err.to_string()))?;
        columns.push(ColumnDef {
            normalized_name: normalizer.normalize(&name),
            original_name: name,
            type_category: TypeCategory::from_sql_type(&data_type),
            is_nullable,
        });
    }
    Ok(columns)
}

async fn get_primary_key(pool: &PgPool, schema: &str, table: &str) -> Result<Vec<String>> {
    let row = sqlx::query(
        r#"
        select array_agg(att.attname order by ord.ordinality) as columns
        from pg_constraint con
        join pg_class rel on rel.oid = con.conrelid
        join pg_namespace nsp on nsp.oid = rel.relnamespace
        join unnest(con.conkey) with ordinality as ord(attnum, ordinality) on true
        join pg_attribute att on att.attrelid = rel.oid and att.attnum = ord.attnum
        where nsp.nspname = $1
          and rel.relname = $2
          and con.contype = 'p'
        group by con.conname
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_optional(pool)
    .await
    .map_err(|err| Error::Db(err.to_string()))?;

    match row {
        Some(row) => row
            .try_get::<Vec<String>, _>("columns")
            .map_err(|err| Error::Db(err.to_string())),
        None => Ok(Vec::new()),
    }
}

async fn list_foreign_keys(pool: &PgPool, schema: &str, table: &str) -> Result<Vec<ForeignKeyDef>> {
    let rows = sqlx::query(
        r#"
        select
          array_agg(src_att.attname order by s_ord.ordinality) as columns,
          ref_rel.relname as referenced_table,
          array_agg(ref_att.attname order by t_ord.ordinality) as referenced_columns
        from pg_constraint con
        join pg_class src_rel on src_rel.oid = con.conrelid
        join pg_namespace src_nsp on src_nsp.oid = src_rel.relnamespace
        join pg_class ref_rel on ref_rel.oid = con.confrelid
        join unnest(con.conkey) with ordinality as s_ord(attnum, ordinality) on true
        join pg_attribute src_att
          on src_att.attrelid = src_rel.oid and src_att.attnum = s_ord.attnum
        join unnest(con.confkey) with ordinality as t_ord(attnum, ordinality)
          on t_ord.ordinality = s_ord.ordinality
        join pg_attribute ref_att
          on ref_att.attrelid = ref_rel.oid and ref_att.attnum = t_ord.attnum
        where src_nsp.nspname = $1
          and src_rel.relname = $2
          and con.contype = 'f'
        group by con.conname, ref_rel.relname
        order by con.conname
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|err| Error::Db(err.to_string()))?;

    let mut foreign_keys = Vec::with_capacity(rows.len());
    for row in rows {
        foreign_keys.push(ForeignKeyDef {
            source_table: table.to_string(),
            source_columns: row
                .try_get("columns")
                .map_err(|err| Error::Db(err.to_string()))?,
            target_table: row
                .try_get("referenced_table")
                .map_err(|err| Error::Db(err.to_string()))?,
            target_columns: row
                .try_get("referenced_columns")
                .map_err(|err| Error::Db(err.to_string()))?,
        });
    }
    Ok(foreign_keys)
}
