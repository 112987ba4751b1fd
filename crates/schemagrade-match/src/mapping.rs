use serde::{Deserialize, Serialize};

use crate::score::MatchMethod;

/// A matched answer/student entity pair, carrying original names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityPair {
    pub answer: String,
    pub student: String,
    pub confidence: f64,
    pub method: MatchMethod,
}

/// 1:1 table correspondence between the two schemas.
///
/// `matched` is a partial bijection: no table on either side appears twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMapping {
    pub matched: Vec<EntityPair>,
    /// Answer tables with no student counterpart above the threshold.
    pub missing: Vec<String>,
    /// Student tables no answer table claimed (informational).
    pub extra: Vec<String>,
}

impl TableMapping {
    /// Student original name matched to the given answer table, if any.
    pub fn student_for(&self, answer_original: &str) -> Option<&str> {
        self.matched
            .iter()
            .find(|pair| pair.answer == answer_original)
            .map(|pair| pair.student.as_str())
    }
}

/// Column correspondence for one matched table pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Answer table original name.
    pub answer_table: String,
    /// Student table original name.
    pub student_table: String,
    pub matched: Vec<EntityPair>,
    /// Answer columns with no counterpart above the threshold.
    pub missing: Vec<String>,
    /// Student columns left unclaimed.
    pub extra: Vec<String>,
    /// Structural warnings, e.g. a primary key column that failed the
    /// stricter key threshold.
    pub warnings: Vec<String>,
}

impl ColumnMapping {
    /// Student original column matched to the given answer column, if any.
    pub fn student_column(&self, answer_column: &str) -> Option<&str> {
        self.matched
            .iter()
            .find(|pair| pair.answer == answer_column)
            .map(|pair| pair.student.as_str())
    }
}
