use std::cmp::Ordering;
use std::collections::BTreeSet;

use schemagrade_core::TableDef;

use crate::mapping::{ColumnMapping, EntityPair};
use crate::score::{MatchMethod, SimilarityScorer, edit_distance};

struct Candidate {
    confidence: f64,
    method: MatchMethod,
    types_agree: bool,
    distance: usize,
    answer_idx: usize,
    student_idx: usize,
    answer_key: String,
    student_key: String,
}

/// Match the columns of one answer/student table pair.
///
/// Primary key columns are checked first at the stricter `pk_threshold`; a
/// key column that fails it produces a structural warning but remains
/// eligible for the general pass, so a renamed key still counts as a
/// column match even when it no longer counts as a key match.
pub async fn match_columns(
    scorer: &SimilarityScorer,
    answer_table: &TableDef,
    student_table: &TableDef,
    column_threshold: f64,
    pk_threshold: f64,
) -> ColumnMapping {
    let answer_order = sorted_indices(answer_table);
    let student_order = sorted_indices(student_table);

    let mut warnings = Vec::new();
    let mut used_answer = BTreeSet::new();
    let mut used_student = BTreeSet::new();
    let mut matched = Vec::new();

    // Key pre-pass. Claims made here are final; failures only warn.
    let mut key_candidates = Vec::new();
    for &i in &answer_order {
        let column = &answer_table.columns[i];
        if !answer_table.is_primary_key(&column.original_name) {
            continue;
        }
        for &j in &student_order {
            let candidate = build_candidate(scorer, answer_table, student_table, i, j).await;
            if candidate.confidence >= pk_threshold {
                key_candidates.push(candidate);
            }
        }
    }
    sort_candidates(&mut key_candidates);
    claim(
        key_candidates,
        answer_table,
        student_table,
        &mut used_answer,
        &mut used_student,
        &mut matched,
    );
    for &i in &answer_order {
        let column = &answer_table.columns[i];
        if answer_table.is_primary_key(&column.original_name) && !used_answer.contains(&i) {
            warnings.push(format!(
                "primary key column {}.{} has no confident student counterpart",
                answer_table.original_name, column.original_name
            ));
        }
    }

    // General pass over whatever both sides still have unclaimed.
    let mut candidates = Vec::new();
    for &i in &answer_order {
        if used_answer.contains(&i) {
            continue;
        }
        for &j in &student_order {
            if used_student.contains(&j) {
                continue;
            }
            let candidate = build_candidate(scorer, answer_table, student_table, i, j).await;
            if candidate.confidence >= column_threshold {
                candidates.push(candidate);
            }
        }
    }
    sort_candidates(&mut candidates);
    claim(
        candidates,
        answer_table,
        student_table,
        &mut used_answer,
        &mut used_student,
        &mut matched,
    );
    matched.sort_by(|left, right| left.answer.cmp(&right.answer));

    let missing = answer_order
        .iter()
        .filter(|idx| !used_answer.contains(idx))
        .map(|&idx| answer_table.columns[idx].original_name.clone())
        .collect();
    let extra = student_order
        .iter()
        .filter(|idx| !used_student.contains(idx))
        .map(|&idx| student_table.columns[idx].original_name.clone())
        .collect();

    let mapping = ColumnMapping {
        answer_table: answer_table.original_name.clone(),
        student_table: student_table.original_name.clone(),
        matched,
        missing,
        extra,
        warnings,
    };
    tracing::debug!(
        event = "columns_matched",
        table = %mapping.answer_table,
        matched = mapping.matched.len(),
        missing = mapping.missing.len(),
        warnings = mapping.warnings.len()
    );
    mapping
}

async fn build_candidate(
    scorer: &SimilarityScorer,
    answer_table: &TableDef,
    student_table: &TableDef,
    answer_idx: usize,
    student_idx: usize,
) -> Candidate {
    let answer = &answer_table.columns[answer_idx];
    let student = &student_table.columns[student_idx];
    let confidence = scorer
        .score(&answer.normalized_name, &student.normalized_name)
        .await;
    Candidate {
        confidence: confidence.value,
        method: confidence.method,
        types_agree: answer.type_category == student.type_category,
        distance: edit_distance(&answer.normalized_name, &student.normalized_name),
        answer_idx,
        student_idx,
        answer_key: answer.normalized_name.clone(),
        student_key: student.normalized_name.clone(),
    }
}

fn sorted_indices(table: &TableDef) -> Vec<usize> {
    let mut order: Vec<usize> = (0..table.columns.len()).collect();
    order.sort_by(|&left, &right| {
        table.columns[left]
            .normalized_name
            .cmp(&table.columns[right].normalized_name)
    });
    order
}

fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|left, right| {
        right
            .confidence
            .partial_cmp(&left.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| right.types_agree.cmp(&left.types_agree))
            .then_with(|| left.distance.cmp(&right.distance))
            .then_with(|| left.student_key.cmp(&right.student_key))
            .then_with(|| left.answer_key.cmp(&right.answer_key))
    });
}

fn claim(
    candidates: Vec<Candidate>,
    answer_table: &TableDef,
    student_table: &TableDef,
    used_answer: &mut BTreeSet<usize>,
    used_student: &mut BTreeSet<usize>,
    matched: &mut Vec<EntityPair>,
) {
    for candidate in candidates {
        if used_answer.contains(&candidate.answer_idx)
            || used_student.contains(&candidate.student_idx)
        {
            continue;
        }
        used_answer.insert(candidate.answer_idx);
        used_student.insert(candidate.student_idx);
        matched.push(EntityPair {
            answer: answer_table.columns[candidate.answer_idx]
                .original_name
                .clone(),
            student: student_table.columns[candidate.student_idx]
                .original_name
                .clone(),
            confidence: candidate.confidence,
            method: candidate.method,
        });
    }
}
