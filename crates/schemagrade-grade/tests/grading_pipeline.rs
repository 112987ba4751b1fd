use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use schemagrade_core::{
    ColumnDef, Error, ForeignKeyDef, GradingConfig, NameNormalizer, Result, Schema, SchemaSource,
    TableDef, TypeCategory,
};
use schemagrade_extract::RowCountProbe;
use schemagrade_grade::{GradingEngine, RowCountStatus, Submission, grade_batch};
use schemagrade_match::FkOutcome;

struct MapProbe(HashMap<String, i64>);

impl MapProbe {
    fn new(counts: &[(&str, i64)]) -> Self {
        Self(
            counts
                .iter()
                .map(|(name, count)| (name.to_string(), *count))
                .collect(),
        )
    }
}

#[async_trait]
impl RowCountProbe for MapProbe {
    async fn count_rows(&self, original_table_name: &str) -> Result<i64> {
        self.0
            .get(original_table_name)
            .copied()
            .ok_or_else(|| Error::Db(format!("relation not found: {original_table_name}")))
    }
}

fn column(name: &str, category: TypeCategory) -> ColumnDef {
    let normalizer = NameNormalizer::new(&["stage".to_string()]);
    ColumnDef {
        original_name: name.to_string(),
        normalized_name: normalizer.normalize(name),
        type_category: category,
        is_nullable: true,
    }
}

fn table(
    name: &str,
    columns: Vec<ColumnDef>,
    primary_key: &[&str],
    foreign_keys: Vec<ForeignKeyDef>,
) -> TableDef {
    let normalizer = NameNormalizer::new(&["stage".to_string()]);
    TableDef {
        original_name: name.to_string(),
        normalized_name: normalizer.normalize(name),
        columns,
        primary_key: primary_key.iter().map(|c| c.to_string()).collect(),
        foreign_keys,
    }
}

fn fk(source: &str, source_cols: &[&str], target: &str, target_cols: &[&str]) -> ForeignKeyDef {
    ForeignKeyDef {
        source_table: source.to_string(),
        source_columns: source_cols.iter().map(|c| c.to_string()).collect(),
        target_table: target.to_string(),
        target_columns: target_cols.iter().map(|c| c.to_string()).collect(),
    }
}

fn answer_schema() -> Schema {
    Schema {
        source: SchemaSource::Answer,
        database: Some("answer_db".to_string()),
        tables: vec![
            table(
                "Customers",
                vec![
                    column("Id", TypeCategory::Numeric),
                    column("Name", TypeCategory::Text),
                ],
                &["Id"],
                Vec::new(),
            ),
            table(
                "Orders",
                vec![
                    column("Id", TypeCategory::Numeric),
                    column("CustomerId", TypeCategory::Numeric),
                    column("OrderDate", TypeCategory::Date),
                ],
                &["Id"],
                vec![fk("Orders", &["CustomerId"], "Customers", &["Id"])],
            ),
            table(
                "01.HangTonKho",
                vec![
                    column("Id", TypeCategory::Numeric),
                    column("SoLuong", TypeCategory::Numeric),
                ],
                &["Id"],
                Vec::new(),
            ),
        ],
    }
}

fn student_schema() -> Schema {
    Schema {
        source: SchemaSource::Student,
        database: Some("student_db".to_string()),
        tables: vec![
            table(
                "customers",
                vec![
                    column("id", TypeCategory::Numeric),
                    column("name", TypeCategory::Text),
                ],
                &["id"],
                Vec::new(),
            ),
            table(
                "orders",
                vec![
                    column("id", TypeCategory::Numeric),
                    column("customer_id", TypeCategory::Numeric),
                    column("order_date", TypeCategory::Date),
                ],
                &["id"],
                vec![fk("orders", &["customer_id"], "customers", &["id"])],
            ),
            table(
                "01.HangTonKho",
                vec![
                    column("Id", TypeCategory::Numeric),
                    column("SoLuong", TypeCategory::Numeric),
                ],
                &["Id"],
                Vec::new(),
            ),
        ],
    }
}

fn business_config() -> GradingConfig {
    let mut business_logic_tables = BTreeMap::new();
    business_logic_tables.insert("01.HangTonKho".to_string(), 5);
    GradingConfig {
        semantic_enabled: false,
        business_logic_tables,
        ..GradingConfig::default()
    }
}

fn engine() -> GradingEngine {
    GradingEngine::new(business_config(), None).expect("valid config")
}

#[tokio::test]
async fn full_pipeline_grades_a_clean_submission() {
    let answer = answer_schema();
    let student = student_schema();
    let answer_probe = MapProbe::new(&[("Customers", 20), ("Orders", 100), ("01.HangTonKho", 100)]);
    // Business table gained exactly the expected 5 rows.
    let student_probe =
        MapProbe::new(&[("customers", 20), ("orders", 100), ("01.HangTonKho", 105)]);

    let result = engine()
        .grade("sv001", &answer, &student, &answer_probe, &student_probe)
        .await
        .expect("grading succeeds");

    assert_eq!(result.table_mapping.matched.len(), 3);
    assert!(result.table_mapping.missing.is_empty());
    assert_eq!(result.column_mappings.len(), 3);
    assert_eq!(result.fk_results.len(), 1);
    assert_eq!(result.fk_results[0].outcome, FkOutcome::Present);

    let business: Vec<_> = result
        .row_counts
        .iter()
        .filter(|record| record.is_business_logic_table)
        .collect();
    assert_eq!(business.len(), 1);
    assert_eq!(business[0].answer_table, "01.HangTonKho");
    assert_eq!(business[0].business_logic_correct, Some(true));
    assert_eq!(business[0].data_import_correct, Some(true));

    assert!((result.breakdown.overall_score - result.breakdown.max_total).abs() < 1e-9);
    assert!(!result.degraded_similarity);
}

#[tokio::test]
async fn regular_table_import_flag_tracks_count_equality() {
    let answer = answer_schema();
    let student = student_schema();
    let answer_probe = MapProbe::new(&[("Customers", 20), ("Orders", 100), ("01.HangTonKho", 100)]);
    // Customers imported fully, orders one row short.
    let student_probe =
        MapProbe::new(&[("customers", 20), ("orders", 99), ("01.HangTonKho", 105)]);

    let result = engine()
        .grade("sv001", &answer, &student, &answer_probe, &student_probe)
        .await
        .expect("grading succeeds");

    let record = |name: &str| {
        result
            .row_counts
            .iter()
            .find(|record| record.answer_table == name)
            .expect("record")
    };
    assert_eq!(record("Customers").data_import_correct, Some(true));
    assert_eq!(record("Orders").data_import_correct, Some(false));
    assert_eq!(record("Orders").difference, Some(-1));
}

#[tokio::test]
async fn row_count_probe_receives_original_names() {
    // The business table keeps its digit prefix; probing with the
    // normalized form would miss the map entry and surface as an error.
    let answer = answer_schema();
    let student = student_schema();
    let answer_probe = MapProbe::new(&[("Customers", 20), ("Orders", 100), ("01.HangTonKho", 100)]);
    let student_probe =
        MapProbe::new(&[("customers", 20), ("orders", 100), ("01.HangTonKho", 105)]);

    let result = engine()
        .grade("sv001", &answer, &student, &answer_probe, &student_probe)
        .await
        .expect("grading succeeds");

    assert!(
        result
            .row_counts
            .iter()
            .all(|record| record.status == RowCountStatus::Ok)
    );
}

#[tokio::test]
async fn wrong_business_increase_fails_only_business_logic() {
    let answer = answer_schema();
    let student = student_schema();
    let answer_probe = MapProbe::new(&[("Customers", 20), ("Orders", 100), ("01.HangTonKho", 100)]);
    // Only 3 new rows instead of the expected 5.
    let student_probe =
        MapProbe::new(&[("customers", 20), ("orders", 100), ("01.HangTonKho", 103)]);

    let result = engine()
        .grade("sv001", &answer, &student, &answer_probe, &student_probe)
        .await
        .expect("grading succeeds");

    let record = result
        .row_counts
        .iter()
        .find(|record| record.is_business_logic_table)
        .expect("business record");
    assert_eq!(record.business_logic_correct, Some(false));
    assert_eq!(record.difference, Some(3));
    assert_eq!(result.breakdown.business_logic.achieved, 0.0);
    // Regular tables still match, so the row count category stays perfect.
    assert!((result.breakdown.row_counts.ratio() - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn failed_count_degrades_one_record_not_the_run() {
    let answer = answer_schema();
    let student = student_schema();
    let answer_probe = MapProbe::new(&[("Customers", 20), ("Orders", 100), ("01.HangTonKho", 100)]);
    // Student probe is missing the orders table entirely.
    let student_probe = MapProbe::new(&[("customers", 20), ("01.HangTonKho", 105)]);

    let result = engine()
        .grade("sv001", &answer, &student, &answer_probe, &student_probe)
        .await
        .expect("grading succeeds");

    let orders = result
        .row_counts
        .iter()
        .find(|record| record.answer_table == "Orders")
        .expect("orders record");
    assert_eq!(orders.status, RowCountStatus::Error);
    assert!(orders.error.as_deref().is_some_and(|e| e.contains("orders")));

    let customers = result
        .row_counts
        .iter()
        .find(|record| record.answer_table == "Customers")
        .expect("customers record");
    assert_eq!(customers.status, RowCountStatus::Ok);
}

#[tokio::test]
async fn missing_table_is_unmapped_in_row_counts() {
    let answer = answer_schema();
    let mut student = student_schema();
    student.tables.retain(|table| table.original_name != "orders");
    let answer_probe = MapProbe::new(&[("Customers", 20), ("Orders", 100), ("01.HangTonKho", 100)]);
    let student_probe = MapProbe::new(&[("customers", 20), ("01.HangTonKho", 105)]);

    let result = engine()
        .grade("sv001", &answer, &student, &answer_probe, &student_probe)
        .await
        .expect("grading succeeds");

    assert_eq!(result.table_mapping.missing, vec!["Orders".to_string()]);
    let orders = result
        .row_counts
        .iter()
        .find(|record| record.answer_table == "Orders")
        .expect("orders record");
    assert_eq!(orders.status, RowCountStatus::Unmapped);
    assert_eq!(result.fk_results[0].outcome, FkOutcome::Missing);
}

struct InMemorySubmission {
    id: String,
    schema: Schema,
    probe: Arc<dyn RowCountProbe>,
}

impl Submission for InMemorySubmission {
    fn id(&self) -> &str {
        &self.id
    }

    fn student_schema(&self) -> &Schema {
        &self.schema
    }

    fn row_count_probe(&self) -> Arc<dyn RowCountProbe> {
        Arc::clone(&self.probe)
    }
}

#[tokio::test]
async fn batch_isolates_failures_and_sorts_by_id() {
    let engine = Arc::new(engine());
    let answer = Arc::new(answer_schema());
    let answer_probe: Arc<dyn RowCountProbe> = Arc::new(MapProbe::new(&[
        ("Customers", 20),
        ("Orders", 100),
        ("01.HangTonKho", 100),
    ]));

    let good_probe: Arc<dyn RowCountProbe> = Arc::new(MapProbe::new(&[
        ("customers", 20),
        ("orders", 100),
        ("01.HangTonKho", 105),
    ]));

    // An invalid schema (duplicate table names) must fail alone.
    let mut broken = student_schema();
    let duplicate = broken.tables[0].clone();
    broken.tables.push(duplicate);

    let submissions: Vec<Arc<dyn Submission>> = vec![
        Arc::new(InMemorySubmission {
            id: "sv002".to_string(),
            schema: broken,
            probe: Arc::clone(&good_probe),
        }),
        Arc::new(InMemorySubmission {
            id: "sv001".to_string(),
            schema: student_schema(),
            probe: Arc::clone(&good_probe),
        }),
    ];

    let entries = grade_batch(engine, answer, answer_probe, submissions, 2).await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, "sv001");
    assert!(entries[0].outcome.is_ok());
    assert_eq!(entries[1].id, "sv002");
    assert!(entries[1].outcome.is_err());
}

struct PanickingProbe;

#[async_trait]
impl RowCountProbe for PanickingProbe {
    async fn count_rows(&self, _original_table_name: &str) -> Result<i64> {
        panic!("probe blew up");
    }
}

#[tokio::test]
async fn batch_keeps_panicked_submissions_visible_as_errors() {
    let engine = Arc::new(engine());
    let answer = Arc::new(answer_schema());
    let answer_probe: Arc<dyn RowCountProbe> = Arc::new(MapProbe::new(&[
        ("Customers", 20),
        ("Orders", 100),
        ("01.HangTonKho", 100),
    ]));
    let good_probe: Arc<dyn RowCountProbe> = Arc::new(MapProbe::new(&[
        ("customers", 20),
        ("orders", 100),
        ("01.HangTonKho", 105),
    ]));

    let submissions: Vec<Arc<dyn Submission>> = vec![
        Arc::new(InMemorySubmission {
            id: "sv001".to_string(),
            schema: student_schema(),
            probe: good_probe,
        }),
        Arc::new(InMemorySubmission {
            id: "sv002".to_string(),
            schema: student_schema(),
            probe: Arc::new(PanickingProbe),
        }),
    ];

    let entries = grade_batch(engine, answer, answer_probe, submissions, 2).await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, "sv001");
    assert!(entries[0].outcome.is_ok());
    assert_eq!(entries[1].id, "sv002");
    assert!(entries[1].outcome.is_err());
}

#[tokio::test]
async fn grading_is_deterministic_across_runs() {
    let answer = answer_schema();
    let student = student_schema();
    let answer_probe = MapProbe::new(&[("Customers", 20), ("Orders", 100), ("01.HangTonKho", 100)]);
    let student_probe =
        MapProbe::new(&[("customers", 20), ("orders", 100), ("01.HangTonKho", 105)]);

    let engine = engine();
    let first = engine
        .grade("sv001", &answer, &student, &answer_probe, &student_probe)
        .await
        .expect("grading succeeds");
    let second = engine
        .grade("sv001", &answer, &student, &answer_probe, &student_probe)
        .await
        .expect("grading succeeds");

    let pairs = |result: &schemagrade_grade::GradingResult| {
        result
            .table_mapping
            .matched
            .iter()
            .map(|pair| (pair.answer.clone(), pair.student.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(pairs(&first), pairs(&second));
    assert_eq!(first.breakdown.overall_score, second.breakdown.overall_score);
}
