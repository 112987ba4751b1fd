use serde::{Deserialize, Serialize};

use schemagrade_core::{ForeignKeyDef, Schema};

use crate::mapping::{ColumnMapping, TableMapping};

/// Verdict for one expected foreign key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FkOutcome {
    /// Same table pair, same column sets after name translation.
    Present,
    /// The right tables are linked, but through different columns.
    Partial,
    Missing,
}

/// One expected foreign key checked against the student schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkComparisonResult {
    /// The answer-side relationship, e.g. `Orders(CustomerId) -> Customers(Id)`.
    pub answer_fk: String,
    /// What the student was expected to declare, in student names. Absent
    /// when a participating table is unmapped.
    pub expected: Option<String>,
    /// The closest student foreign key on the same table pair, if any.
    pub found: Option<String>,
    pub outcome: FkOutcome,
}

/// Check every answer foreign key against the student schema, using the
/// table and column mappings to translate names.
///
/// A key whose source or target table is unmapped is missing outright; a
/// student key joining the right tables through the wrong columns is
/// partial.
pub fn compare_foreign_keys(
    answer: &Schema,
    student: &Schema,
    tables: &TableMapping,
    columns: &[ColumnMapping],
) -> Vec<FkComparisonResult> {
    let mut answer_tables: Vec<_> = answer.tables.iter().collect();
    answer_tables.sort_by(|left, right| left.normalized_name.cmp(&right.normalized_name));

    let mut results = Vec::new();
    for answer_table in answer_tables {
        for fk in &answer_table.foreign_keys {
            results.push(check_one(fk, student, tables, columns));
        }
    }
    tracing::debug!(
        event = "foreign_keys_compared",
        total = results.len(),
        present = results
            .iter()
            .filter(|r| r.outcome == FkOutcome::Present)
            .count()
    );
    results
}

fn check_one(
    fk: &ForeignKeyDef,
    student: &Schema,
    tables: &TableMapping,
    columns: &[ColumnMapping],
) -> FkComparisonResult {
    let answer_fk = render_fk(fk);

    let (Some(student_source), Some(student_target)) = (
        tables.student_for(&fk.source_table),
        tables.student_for(&fk.target_table),
    ) else {
        return FkComparisonResult {
            answer_fk,
            expected: None,
            found: None,
            outcome: FkOutcome::Missing,
        };
    };

    let expected_source_cols =
        translate_columns(&fk.source_table, &fk.source_columns, columns);
    let expected_target_cols =
        translate_columns(&fk.target_table, &fk.target_columns, columns);
    let expected = match (&expected_source_cols, &expected_target_cols) {
        (Some(source), Some(target)) => Some(format!(
            "{}({}) -> {}({})",
            student_source,
            source.join(", "),
            student_target,
            target.join(", ")
        )),
        _ => None,
    };

    // Student keys joining the mapped table pair, regardless of columns.
    let on_pair: Vec<&ForeignKeyDef> = student
        .tables
        .iter()
        .find(|table| table.original_name == student_source)
        .map(|table| {
            table
                .foreign_keys
                .iter()
                .filter(|candidate| candidate.target_table.eq_ignore_ascii_case(student_target))
                .collect()
        })
        .unwrap_or_default();

    if let (Some(source), Some(target)) = (&expected_source_cols, &expected_target_cols) {
        for candidate in &on_pair {
            if column_sets_equal(&candidate.source_columns, source)
                && column_sets_equal(&candidate.target_columns, target)
            {
                return FkComparisonResult {
                    answer_fk,
                    expected,
                    found: Some(render_fk(candidate)),
                    outcome: FkOutcome::Present,
                };
            }
        }
    }

    if let Some(candidate) = on_pair.first() {
        return FkComparisonResult {
            answer_fk,
            expected,
            found: Some(render_fk(candidate)),
            outcome: FkOutcome::Partial,
        };
    }

    FkComparisonResult {
        answer_fk,
        expected,
        found: None,
        outcome: FkOutcome::Missing,
    }
}

/// Translate answer column names to student names through the column
/// mapping for that table. Any untranslatable column fails the whole set.
fn translate_columns(
    answer_table: &str,
    answer_columns: &[String],
    columns: &[ColumnMapping],
) -> Option<Vec<String>> {
    let mapping = columns
        .iter()
        .find(|mapping| mapping.answer_table == answer_table)?;
    answer_columns
        .iter()
        .map(|name| mapping.student_column(name).map(str::to_string))
        .collect()
}

/// Order-insensitive, case-insensitive column set equality.
fn column_sets_equal(left: &[String], right: &[String]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut left: Vec<String> = left.iter().map(|c| c.to_lowercase()).collect();
    let mut right: Vec<String> = right.iter().map(|c| c.to_lowercase()).collect();
    left.sort();
    right.sort();
    left == right
}

fn render_fk(fk: &ForeignKeyDef) -> String {
    format!(
        "{}({}) -> {}({})",
        fk.source_table,
        fk.source_columns.join(", "),
        fk.target_table,
        fk.target_columns.join(", ")
    )
}
