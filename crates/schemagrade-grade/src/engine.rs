use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use schemagrade_core::{GradingConfig, Schema, validate_schema};
use schemagrade_embed::SimilarityProvider;
use schemagrade_extract::RowCountProbe;
use schemagrade_match::{
    ColumnMapping, FkComparisonResult, SimilarityScorer, TableMapping, compare_foreign_keys,
    match_columns, match_tables,
};

use crate::aggregate::{ScoreBreakdown, compute_breakdown};
use crate::errors::GradeError;
use crate::rowcount::{RowCountRecord, analyze_row_counts};

/// Everything produced by grading one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingResult {
    pub run_id: String,
    pub submission: String,
    pub graded_at: DateTime<Utc>,
    pub table_mapping: TableMapping,
    pub column_mappings: Vec<ColumnMapping>,
    pub fk_results: Vec<FkComparisonResult>,
    pub row_counts: Vec<RowCountRecord>,
    pub breakdown: ScoreBreakdown,
    /// True when the semantic provider failed mid-run and scoring fell back
    /// to lexical similarity only.
    pub degraded_similarity: bool,
}

/// One student database to grade.
pub trait Submission: Send + Sync {
    fn id(&self) -> &str;
    fn student_schema(&self) -> &Schema;
    fn row_count_probe(&self) -> Arc<dyn RowCountProbe>;
}

/// Outcome of one submission inside a batch. Failures stay attached to
/// their submission instead of aborting the batch.
pub struct BatchEntry {
    pub id: String,
    pub outcome: Result<GradingResult, GradeError>,
}

/// Runs the full grading pipeline for one or many submissions.
pub struct GradingEngine {
    config: GradingConfig,
    provider: Option<Arc<dyn SimilarityProvider>>,
}

impl GradingEngine {
    pub fn new(
        config: GradingConfig,
        provider: Option<Arc<dyn SimilarityProvider>>,
    ) -> Result<Self, GradeError> {
        config.validate()?;
        Ok(Self { config, provider })
    }

    pub fn config(&self) -> &GradingConfig {
        &self.config
    }

    /// Grade one submission: match tables, then columns per matched pair,
    /// then foreign keys, then row counts, and aggregate.
    pub async fn grade(
        &self,
        submission_id: &str,
        answer: &Schema,
        student: &Schema,
        answer_probe: &dyn RowCountProbe,
        student_probe: &dyn RowCountProbe,
    ) -> Result<GradingResult, GradeError> {
        validate_schema(answer)?;
        validate_schema(student)?;

        // A fresh scorer per run keeps the semantic cache and the degraded
        // latch scoped to this submission.
        let scorer = SimilarityScorer::new(&self.config, self.provider.clone());

        let table_mapping =
            match_tables(&scorer, answer, student, self.config.table_match_threshold).await;

        let mut column_mappings = Vec::with_capacity(table_mapping.matched.len());
        for pair in &table_mapping.matched {
            let answer_table = answer
                .tables
                .iter()
                .find(|table| table.original_name == pair.answer);
            let student_table = student
                .tables
                .iter()
                .find(|table| table.original_name == pair.student);
            let (Some(answer_table), Some(student_table)) = (answer_table, student_table) else {
                continue;
            };
            column_mappings.push(
                match_columns(
                    &scorer,
                    answer_table,
                    student_table,
                    self.config.column_match_threshold,
                    self.config.pk_match_threshold,
                )
                .await,
            );
        }

        let fk_results = compare_foreign_keys(answer, student, &table_mapping, &column_mappings);
        let row_counts = analyze_row_counts(
            answer,
            &table_mapping,
            answer_probe,
            student_probe,
            &self.config,
        )
        .await;
        let breakdown = compute_breakdown(
            &self.config,
            answer,
            &table_mapping,
            &column_mappings,
            &fk_results,
            &row_counts,
        );

        let result = GradingResult {
            run_id: Uuid::new_v4().to_string(),
            submission: submission_id.to_string(),
            graded_at: Utc::now(),
            table_mapping,
            column_mappings,
            fk_results,
            row_counts,
            breakdown,
            degraded_similarity: scorer.is_degraded(),
        };
        tracing::info!(
            event = "submission_graded",
            submission = %result.submission,
            overall = result.breakdown.overall_score,
            degraded = result.degraded_similarity
        );
        Ok(result)
    }
}

/// Grade a set of submissions against one answer schema, at most
/// `max_concurrency` at a time. Entries come back sorted by submission id.
pub async fn grade_batch(
    engine: Arc<GradingEngine>,
    answer: Arc<Schema>,
    answer_probe: Arc<dyn RowCountProbe>,
    submissions: Vec<Arc<dyn Submission>>,
    max_concurrency: usize,
) -> Vec<BatchEntry> {
    let permits = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let expected_ids: Vec<String> = submissions
        .iter()
        .map(|submission| submission.id().to_string())
        .collect();

    for submission in submissions {
        let engine = Arc::clone(&engine);
        let answer = Arc::clone(&answer);
        let answer_probe = Arc::clone(&answer_probe);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let id = submission.id().to_string();
            let outcome = engine
                .grade(
                    &id,
                    &answer,
                    submission.student_schema(),
                    answer_probe.as_ref(),
                    submission.row_count_probe().as_ref(),
                )
                .await;
            if let Err(err) = &outcome {
                tracing::warn!(event = "submission_failed", submission = %id, error = %err);
            }
            BatchEntry { id, outcome }
        });
    }

    let mut entries = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                tracing::error!(event = "grading_task_aborted", error = %err);
            }
        }
    }
    // A panicked task never returns its entry; synthesize an errored one so
    // the submission stays visible in the batch output.
    for id in expected_ids {
        if !entries.iter().any(|entry| entry.id == id) {
            entries.push(BatchEntry {
                id,
                outcome: Err(GradeError::Task(
                    "grading task panicked or was aborted".to_string(),
                )),
            });
        }
    }
    entries.sort_by(|left, right| left.id.cmp(&right.id));
    entries
}
