use std::cmp::Ordering;
use std::collections::BTreeSet;

use schemagrade_core::Schema;

use crate::mapping::{EntityPair, TableMapping};
use crate::score::{MatchMethod, SimilarityScorer, edit_distance};

struct Candidate {
    confidence: f64,
    method: MatchMethod,
    distance: usize,
    answer_idx: usize,
    student_idx: usize,
    answer_key: String,
    student_key: String,
}

/// Produce the 1:1 table mapping between answer and student schemas.
///
/// Greedy by descending confidence rather than a global assignment: short
/// table names tie constantly, and the fixed tie-break (shorter edit
/// distance, then lexical order of the student name) keeps reruns and
/// reordered inputs reproducible.
pub async fn match_tables(
    scorer: &SimilarityScorer,
    answer: &Schema,
    student: &Schema,
    threshold: f64,
) -> TableMapping {
    let answer_order = sorted_indices(answer);
    let student_order = sorted_indices(student);

    let mut candidates = Vec::new();
    for &i in &answer_order {
        for &j in &student_order {
            let answer_name = &answer.tables[i].normalized_name;
            let student_name = &student.tables[j].normalized_name;
            let confidence = scorer.score(answer_name, student_name).await;
            if confidence.value < threshold {
                continue;
            }
            candidates.push(Candidate {
                confidence: confidence.value,
                method: confidence.method,
                distance: edit_distance(answer_name, student_name),
                answer_idx: i,
                student_idx: j,
                answer_key: answer_name.clone(),
                student_key: student_name.clone(),
            });
        }
    }
    sort_candidates(&mut candidates);

    let mut used_answer = BTreeSet::new();
    let mut used_student = BTreeSet::new();
    let mut matched = Vec::new();
    for candidate in candidates {
        if used_answer.contains(&candidate.answer_idx)
            || used_student.contains(&candidate.student_idx)
        {
            continue;
        }
        used_answer.insert(candidate.answer_idx);
        used_student.insert(candidate.student_idx);
        matched.push(EntityPair {
            answer: answer.tables[candidate.answer_idx].original_name.clone(),
            student: student.tables[candidate.student_idx].original_name.clone(),
            confidence: candidate.confidence,
            method: candidate.method,
        });
    }
    matched.sort_by(|left, right| left.answer.cmp(&right.answer));

    let missing = answer_order
        .iter()
        .filter(|idx| !used_answer.contains(idx))
        .map(|&idx| answer.tables[idx].original_name.clone())
        .collect();
    let extra = student_order
        .iter()
        .filter(|idx| !used_student.contains(idx))
        .map(|&idx| student.tables[idx].original_name.clone())
        .collect();

    let mapping = TableMapping {
        matched,
        missing,
        extra,
    };
    tracing::debug!(
        event = "tables_matched",
        matched = mapping.matched.len(),
        missing = mapping.missing.len(),
        extra = mapping.extra.len()
    );
    mapping
}

fn sorted_indices(schema: &Schema) -> Vec<usize> {
    let mut order: Vec<usize> = (0..schema.tables.len()).collect();
    order.sort_by(|&left, &right| {
        schema.tables[left]
            .normalized_name
            .cmp(&schema.tables[right].normalized_name)
    });
    order
}

fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|left, right| {
        right
            .confidence
            .partial_cmp(&left.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| left.distance.cmp(&right.distance))
            .then_with(|| left.student_key.cmp(&right.student_key))
            .then_with(|| left.answer_key.cmp(&right.answer_key))
    });
}
