use schemagrade_match::FkOutcome;

use crate::engine::GradingResult;
use crate::rowcount::RowCountStatus;

/// Render a deterministic markdown report for one graded submission.
pub fn render_report(result: &GradingResult) -> String {
    let mut lines = Vec::new();

    lines.push("# Schema Grading Report".to_string());
    lines.push(String::new());
    lines.push("## Run summary".to_string());
    lines.push(format!("- run_id: {}", result.run_id));
    lines.push(format!("- submission: {}", result.submission));
    lines.push(format!(
        "- graded_at: {}",
        result.graded_at.format("%Y-%m-%dT%H:%M:%SZ")
    ));
    lines.push(format!(
        "- overall: {:.2} / {:.2}",
        result.breakdown.overall_score, result.breakdown.max_total
    ));
    if result.degraded_similarity {
        lines.push("- note: semantic similarity was unavailable; lexical only".to_string());
    }
    lines.push(String::new());

    lines.push("## Score breakdown".to_string());
    lines.push("| category | achieved | maximum | weight |".to_string());
    lines.push("| --- | --- | --- | --- |".to_string());
    let breakdown = &result.breakdown;
    for (name, category) in [
        ("tables", &breakdown.tables),
        ("columns", &breakdown.columns),
        ("foreign_keys", &breakdown.foreign_keys),
        ("row_counts", &breakdown.row_counts),
        ("business_logic", &breakdown.business_logic),
    ] {
        let line = if category.maximum > 0.0 {
            format!(
                "| {} | {:.1} | {:.1} | {:.2} |",
                name, category.achieved, category.maximum, category.weight
            )
        } else {
            format!("| {name} | - | - | excluded |")
        };
        lines.push(line);
    }
    lines.push(String::new());

    lines.push("## Table matching".to_string());
    lines.push("| answer | student | confidence | method |".to_string());
    lines.push("| --- | --- | --- | --- |".to_string());
    for pair in &result.table_mapping.matched {
        lines.push(format!(
            "| {} | {} | {:.3} | {:?} |",
            pair.answer, pair.student, pair.confidence, pair.method
        ));
    }
    for missing in &result.table_mapping.missing {
        lines.push(format!("| {missing} | (missing) | - | - |"));
    }
    for extra in &result.table_mapping.extra {
        lines.push(format!("| (extra) | {extra} | - | - |"));
    }
    lines.push(String::new());

    let warnings: Vec<&String> = result
        .column_mappings
        .iter()
        .flat_map(|mapping| mapping.warnings.iter())
        .collect();
    if !warnings.is_empty() {
        lines.push("## Structural warnings".to_string());
        for warning in warnings {
            lines.push(format!("- {warning}"));
        }
        lines.push(String::new());
    }

    if !result.fk_results.is_empty() {
        lines.push("## Foreign keys".to_string());
        lines.push("| expected relationship | outcome | found |".to_string());
        lines.push("| --- | --- | --- |".to_string());
        for fk in &result.fk_results {
            let outcome = match fk.outcome {
                FkOutcome::Present => "present",
                FkOutcome::Partial => "partial",
                FkOutcome::Missing => "missing",
            };
            lines.push(format!(
                "| {} | {} | {} |",
                fk.answer_fk,
                outcome,
                fk.found.as_deref().unwrap_or("-")
            ));
        }
        lines.push(String::new());
    }

    lines.push("## Row counts".to_string());
    lines.push("| answer table | student table | answer | student | diff | verdict |".to_string());
    lines.push("| --- | --- | --- | --- | --- | --- |".to_string());
    for record in &result.row_counts {
        let verdict = match record.status {
            RowCountStatus::Unmapped => "unmapped".to_string(),
            RowCountStatus::Error => "error".to_string(),
            RowCountStatus::Ok => {
                if record.is_business_logic_table {
                    match (record.business_logic_correct, record.data_import_correct) {
                        (Some(true), _) => "business logic correct".to_string(),
                        (_, Some(true)) => "import correct".to_string(),
                        _ => "incorrect".to_string(),
                    }
                } else if record.counts_match() {
                    "match".to_string()
                } else {
                    "mismatch".to_string()
                }
            }
        };
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} |",
            record.answer_table,
            record.student_table.as_deref().unwrap_or("-"),
            opt_count(record.answer_count),
            opt_count(record.student_count),
            opt_count(record.difference),
            verdict
        ));
    }
    lines.push(String::new());

    lines.join("\n")
}

fn opt_count(value: Option<i64>) -> String {
    value
        .map(|value| value.to_string())
        .unwrap_or_else(|| "-".to_string())
}
