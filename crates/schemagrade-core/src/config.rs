use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Weight applied to each scoring category when aggregating the total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub tables: f64,
    pub columns: f64,
    pub foreign_keys: f64,
    pub row_counts: f64,
    pub business_logic: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            tables: 0.25,
            columns: 0.30,
            foreign_keys: 0.20,
            row_counts: 0.15,
            business_logic: 0.10,
        }
    }
}

impl CategoryWeights {
    fn sum(&self) -> f64 {
        self.tables + self.columns + self.foreign_keys + self.row_counts + self.business_logic
    }
}

/// Configuration for one grading run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    /// Minimum confidence for a table pair to count as matched.
    pub table_match_threshold: f64,
    /// Minimum confidence for a column pair to count as matched.
    pub column_match_threshold: f64,
    /// Stricter floor applied to primary key columns.
    pub pk_match_threshold: f64,
    /// Lexical weight when averaging disagreeing similarity signals.
    pub lexical_weight: f64,
    /// Semantic weight when averaging disagreeing similarity signals.
    pub semantic_weight: f64,
    /// Toggle for the semantic similarity path.
    pub semantic_enabled: bool,
    /// Count unmatched student tables against the table score.
    pub penalize_extra_tables: bool,
    /// Upper bound for the aggregated total.
    pub max_total: f64,
    pub weights: CategoryWeights,
    /// Expected extra rows per business-logic table, keyed by answer table
    /// name. Keys are normalized before lookup, so config casing is free.
    pub business_logic_tables: BTreeMap<String, i64>,
    /// Markers that introduce a numeric stage prefix (`Stage1.Orders`).
    pub stage_markers: Vec<String>,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            table_match_threshold: 0.65,
            column_match_threshold: 0.75,
            pk_match_threshold: 0.85,
            lexical_weight: 0.4,
            semantic_weight: 0.6,
            semantic_enabled: true,
            penalize_extra_tables: false,
            max_total: 10.0,
            weights: CategoryWeights::default(),
            business_logic_tables: BTreeMap::new(),
            stage_markers: vec!["stage".to_string()],
        }
    }
}

impl GradingConfig {
    /// Reject out-of-range thresholds and weights before any grading starts.
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("table_match_threshold", self.table_match_threshold),
            ("column_match_threshold", self.column_match_threshold),
            ("pk_match_threshold", self.pk_match_threshold),
            ("lexical_weight", self.lexical_weight),
            ("semantic_weight", self.semantic_weight),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if self.lexical_weight + self.semantic_weight <= 0.0 {
            return Err(Error::InvalidConfig(
                "lexical_weight + semantic_weight must be positive".to_string(),
            ));
        }
        let categories = [
            ("tables", self.weights.tables),
            ("columns", self.weights.columns),
            ("foreign_keys", self.weights.foreign_keys),
            ("row_counts", self.weights.row_counts),
            ("business_logic", self.weights.business_logic),
        ];
        for (name, value) in categories {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "category weight {name} must be non-negative, got {value}"
                )));
            }
        }
        if self.weights.sum() <= 0.0 {
            return Err(Error::InvalidConfig(
                "category weights must not all be zero".to_string(),
            ));
        }
        if !self.max_total.is_finite() || self.max_total <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "max_total must be positive, got {}",
                self.max_total
            )));
        }
        Ok(())
    }
}
