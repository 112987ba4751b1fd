use serde::{Deserialize, Serialize};

use schemagrade_core::{GradingConfig, NameNormalizer, Schema};
use schemagrade_extract::RowCountProbe;
use schemagrade_match::TableMapping;

/// Whether a row count comparison could be carried out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RowCountStatus {
    Ok,
    /// The answer table has no student counterpart; nothing to compare.
    Unmapped,
    /// A count query failed; the error text is carried on the record.
    Error,
}

/// Row count comparison for one answer table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowCountRecord {
    pub answer_table: String,
    pub student_table: Option<String>,
    pub status: RowCountStatus,
    pub answer_count: Option<i64>,
    pub student_count: Option<i64>,
    /// `student_count - answer_count` when both sides counted.
    pub difference: Option<i64>,
    pub is_business_logic_table: bool,
    /// Rows the graded exercise itself is expected to add, for business
    /// logic tables only.
    pub expected_increase: Option<i64>,
    /// The student imported the seed data correctly. Regular tables compare
    /// counts directly; business tables net out the expected increase first.
    pub data_import_correct: Option<bool>,
    /// Business tables: the exercise added exactly the expected rows.
    pub business_logic_correct: Option<bool>,
    pub error: Option<String>,
}

impl RowCountRecord {
    /// Whether a regular (non business logic) table has the expected count.
    pub fn counts_match(&self) -> bool {
        self.status == RowCountStatus::Ok && self.difference == Some(0)
    }
}

/// Compare row counts for every answer table, through the mapped student
/// table where one exists.
///
/// Counts always run against original identifiers. A failed count on either
/// side degrades that one record to `Error` rather than failing the run.
pub async fn analyze_row_counts(
    answer: &Schema,
    mapping: &TableMapping,
    answer_probe: &dyn RowCountProbe,
    student_probe: &dyn RowCountProbe,
    config: &GradingConfig,
) -> Vec<RowCountRecord> {
    let normalizer = NameNormalizer::new(&config.stage_markers);
    let expected_increases: Vec<(String, i64)> = config
        .business_logic_tables
        .iter()
        .map(|(name, increase)| (normalizer.normalize(name), *increase))
        .collect();

    let mut answer_tables: Vec<_> = answer.tables.iter().collect();
    answer_tables.sort_by(|left, right| left.normalized_name.cmp(&right.normalized_name));

    let mut records = Vec::with_capacity(answer_tables.len());
    for table in answer_tables {
        let expected_increase = expected_increases
            .iter()
            .find(|(name, _)| *name == table.normalized_name)
            .map(|(_, increase)| *increase);

        let student_table = mapping.student_for(&table.original_name);
        let mut record = RowCountRecord {
            answer_table: table.original_name.clone(),
            student_table: student_table.map(str::to_string),
            status: RowCountStatus::Ok,
            answer_count: None,
            student_count: None,
            difference: None,
            is_business_logic_table: expected_increase.is_some(),
            expected_increase,
            data_import_correct: None,
            business_logic_correct: None,
            error: None,
        };

        let Some(student_table) = student_table else {
            record.status = RowCountStatus::Unmapped;
            if record.is_business_logic_table {
                record.data_import_correct = Some(false);
                record.business_logic_correct = Some(false);
            }
            records.push(record);
            continue;
        };

        match answer_probe.count_rows(&table.original_name).await {
            Ok(count) => record.answer_count = Some(count),
            Err(err) => {
                record.status = RowCountStatus::Error;
                record.error = Some(format!("answer count failed: {err}"));
            }
        }
        if record.status == RowCountStatus::Ok {
            match student_probe.count_rows(student_table).await {
                Ok(count) => record.student_count = Some(count),
                Err(err) => {
                    record.status = RowCountStatus::Error;
                    record.error = Some(format!("student count failed: {err}"));
                }
            }
        }

        if let (Some(answer_count), Some(student_count)) =
            (record.answer_count, record.student_count)
        {
            record.difference = Some(student_count - answer_count);
            if let Some(increase) = record.expected_increase {
                record.business_logic_correct = Some(student_count - answer_count == increase);
                record.data_import_correct = Some(student_count - increase == answer_count);
            } else {
                record.data_import_correct = Some(student_count == answer_count);
            }
        } else if record.is_business_logic_table {
            record.data_import_correct = Some(false);
            record.business_logic_correct = Some(false);
        }

        records.push(record);
    }

    tracing::debug!(
        event = "row_counts_analyzed",
        total = records.len(),
        errors = records
            .iter()
            .filter(|r| r.status == RowCountStatus::Error)
            .count()
    );
    records
}
