use std::path::{Path, PathBuf};

use crate::engine::GradingResult;
use crate::errors::GradeError;
use crate::report::render_report;
use crate::rowcount::RowCountStatus;

/// Paths of everything written for one submission.
#[derive(Debug, Clone)]
pub struct ExportedArtifacts {
    pub score_path: PathBuf,
    pub report_path: PathBuf,
    pub column_pairs_path: PathBuf,
    pub foreign_keys_path: PathBuf,
    pub row_counts_path: PathBuf,
}

/// Write the full artifact set for one graded submission into `out_dir`.
pub fn export_result(result: &GradingResult, out_dir: &Path) -> Result<ExportedArtifacts, GradeError> {
    std::fs::create_dir_all(out_dir)?;

    let score_path = out_dir.join("score.json");
    std::fs::write(&score_path, serde_json::to_vec_pretty(result)?)?;

    let report_path = out_dir.join("report.md");
    std::fs::write(&report_path, render_report(result).as_bytes())?;

    let column_pairs_path = out_dir.join("column_pairs.csv");
    write_column_pairs_csv(result, &column_pairs_path)?;

    let foreign_keys_path = out_dir.join("foreign_keys.csv");
    write_fk_csv(result, &foreign_keys_path)?;

    let row_counts_path = out_dir.join("row_counts.csv");
    write_row_counts_csv(result, &row_counts_path)?;

    Ok(ExportedArtifacts {
        score_path,
        report_path,
        column_pairs_path,
        foreign_keys_path,
        row_counts_path,
    })
}

/// One row per matched column pair, plus rows for missing answer columns.
pub fn write_column_pairs_csv(result: &GradingResult, path: &Path) -> Result<(), GradeError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "answer_table",
        "student_table",
        "answer_column",
        "student_column",
        "confidence",
        "method",
    ])?;
    for mapping in &result.column_mappings {
        for pair in &mapping.matched {
            writer.write_record([
                mapping.answer_table.as_str(),
                mapping.student_table.as_str(),
                pair.answer.as_str(),
                pair.student.as_str(),
                &format!("{:.4}", pair.confidence),
                &format!("{:?}", pair.method).to_lowercase(),
            ])?;
        }
        for missing in &mapping.missing {
            writer.write_record([
                mapping.answer_table.as_str(),
                mapping.student_table.as_str(),
                missing.as_str(),
                "",
                "",
                "missing",
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_fk_csv(result: &GradingResult, path: &Path) -> Result<(), GradeError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["answer_fk", "expected", "found", "outcome"])?;
    for fk in &result.fk_results {
        writer.write_record([
            fk.answer_fk.as_str(),
            fk.expected.as_deref().unwrap_or(""),
            fk.found.as_deref().unwrap_or(""),
            &format!("{:?}", fk.outcome).to_lowercase(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_row_counts_csv(result: &GradingResult, path: &Path) -> Result<(), GradeError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "answer_table",
        "student_table",
        "status",
        "answer_count",
        "student_count",
        "difference",
        "business_logic",
        "expected_increase",
        "business_logic_correct",
        "data_import_correct",
        "error",
    ])?;
    for record in &result.row_counts {
        let status = match record.status {
            RowCountStatus::Ok => "ok",
            RowCountStatus::Unmapped => "unmapped",
            RowCountStatus::Error => "error",
        };
        writer.write_record([
            record.answer_table.as_str(),
            record.student_table.as_deref().unwrap_or(""),
            status,
            &opt_string(record.answer_count),
            &opt_string(record.student_count),
            &opt_string(record.difference),
            if record.is_business_logic_table {
                "true"
            } else {
                "false"
            },
            &opt_string(record.expected_increase),
            &opt_bool(record.business_logic_correct),
            &opt_bool(record.data_import_correct),
            record.error.as_deref().unwrap_or(""),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn opt_string(value: Option<i64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

fn opt_bool(value: Option<bool>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}
