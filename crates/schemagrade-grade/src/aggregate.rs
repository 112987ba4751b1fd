use serde::{Deserialize, Serialize};

use schemagrade_core::{GradingConfig, Schema};
use schemagrade_match::{ColumnMapping, FkComparisonResult, FkOutcome, TableMapping};

use crate::rowcount::RowCountRecord;

/// Achieved points over maximum for one scoring category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CategoryScore {
    pub achieved: f64,
    pub maximum: f64,
    pub weight: f64,
}

impl CategoryScore {
    fn new(achieved: f64, maximum: f64, weight: f64) -> Self {
        Self {
            achieved,
            maximum,
            weight,
        }
    }

    /// Achievement ratio in `[0, 1]`; zero-maximum categories report 0 and
    /// are excluded from the overall score instead.
    pub fn ratio(&self) -> f64 {
        if self.maximum > 0.0 {
            (self.achieved / self.maximum).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn applies(&self) -> bool {
        self.maximum > 0.0
    }
}

/// Per-category scores and the weighted overall total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub tables: CategoryScore,
    pub columns: CategoryScore,
    pub foreign_keys: CategoryScore,
    pub row_counts: CategoryScore,
    pub business_logic: CategoryScore,
    pub overall_score: f64,
    pub max_total: f64,
}

/// Aggregate the matching and row-count results into the final score.
///
/// Categories with nothing to grade (an answer schema with no foreign keys,
/// no business logic tables configured) drop out of the weighted average
/// entirely rather than contributing a zero.
pub fn compute_breakdown(
    config: &GradingConfig,
    answer: &Schema,
    tables: &TableMapping,
    columns: &[ColumnMapping],
    foreign_keys: &[FkComparisonResult],
    row_counts: &[RowCountRecord],
) -> ScoreBreakdown {
    let table_maximum = answer.tables.len() as f64;
    let mut table_achieved = tables.matched.len() as f64;
    if config.penalize_extra_tables {
        table_achieved = (table_achieved - tables.extra.len() as f64).max(0.0);
    }

    let column_maximum: f64 = answer
        .tables
        .iter()
        .map(|table| table.columns.len() as f64)
        .sum();
    let column_achieved: f64 = columns
        .iter()
        .map(|mapping| mapping.matched.len() as f64)
        .sum();

    let fk_maximum = foreign_keys.len() as f64;
    let fk_achieved: f64 = foreign_keys
        .iter()
        .map(|result| match result.outcome {
            FkOutcome::Present => 1.0,
            FkOutcome::Partial => 0.5,
            FkOutcome::Missing => 0.0,
        })
        .sum();

    let regular: Vec<_> = row_counts
        .iter()
        .filter(|record| !record.is_business_logic_table)
        .collect();
    let row_maximum = regular.len() as f64;
    let row_achieved = regular
        .iter()
        .filter(|record| record.counts_match())
        .count() as f64;

    let business: Vec<_> = row_counts
        .iter()
        .filter(|record| record.is_business_logic_table)
        .collect();
    let business_maximum = business.len() as f64;
    let business_achieved = business
        .iter()
        .filter(|record| record.business_logic_correct == Some(true))
        .count() as f64;

    let weights = &config.weights;
    let breakdown = ScoreBreakdown {
        tables: CategoryScore::new(table_achieved, table_maximum, weights.tables),
        columns: CategoryScore::new(column_achieved, column_maximum, weights.columns),
        foreign_keys: CategoryScore::new(fk_achieved, fk_maximum, weights.foreign_keys),
        row_counts: CategoryScore::new(row_achieved, row_maximum, weights.row_counts),
        business_logic: CategoryScore::new(
            business_achieved,
            business_maximum,
            weights.business_logic,
        ),
        overall_score: 0.0,
        max_total: config.max_total,
    };

    let categories = [
        &breakdown.tables,
        &breakdown.columns,
        &breakdown.foreign_keys,
        &breakdown.row_counts,
        &breakdown.business_logic,
    ];
    let weight_sum: f64 = categories
        .iter()
        .filter(|category| category.applies())
        .map(|category| category.weight)
        .sum();
    let weighted_sum: f64 = categories
        .iter()
        .filter(|category| category.applies())
        .map(|category| category.weight * category.ratio())
        .sum();
    let overall = if weight_sum > 0.0 {
        (config.max_total * weighted_sum / weight_sum).clamp(0.0, config.max_total)
    } else {
        0.0
    };

    ScoreBreakdown {
        overall_score: overall,
        ..breakdown
    }
}
