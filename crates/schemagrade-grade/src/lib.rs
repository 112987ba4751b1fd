//! The grading pipeline: orchestration, row count analysis, score
//! aggregation, and artifact export.

pub mod aggregate;
pub mod engine;
pub mod errors;
pub mod export;
pub mod report;
pub mod rowcount;

pub use aggregate::{CategoryScore, ScoreBreakdown, compute_breakdown};
pub use engine::{BatchEntry, GradingEngine, GradingResult, Submission, grade_batch};
pub use errors::GradeError;
pub use export::{ExportedArtifacts, export_result};
pub use report::render_report;
pub use rowcount::{RowCountRecord, RowCountStatus, analyze_row_counts};
