use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use rapidfuzz::distance::{jaro_winkler, levenshtein};
use serde::{Deserialize, Serialize};

use schemagrade_core::GradingConfig;
use schemagrade_embed::SimilarityProvider;

/// How a confidence value was produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Fuzzy,
    Semantic,
    Combined,
}

/// A similarity judgment for one name pair.
#[derive(Debug, Clone, Copy)]
pub struct Confidence {
    pub value: f64,
    pub method: MatchMethod,
}

/// Combines lexical and optional semantic similarity into one confidence.
///
/// The semantic cache lives on the scorer, so one instance is scoped to one
/// grading run; sharing it across submissions would leak scores between
/// students.
pub struct SimilarityScorer {
    provider: Option<Arc<dyn SimilarityProvider>>,
    lexical_weight: f64,
    semantic_weight: f64,
    cache: Mutex<HashMap<(String, String), f64>>,
    degraded: AtomicBool,
}

impl SimilarityScorer {
    pub fn new(config: &GradingConfig, provider: Option<Arc<dyn SimilarityProvider>>) -> Self {
        let provider = if config.semantic_enabled {
            provider
        } else {
            None
        };
        Self {
            provider,
            lexical_weight: config.lexical_weight,
            semantic_weight: config.semantic_weight,
            cache: Mutex::new(HashMap::new()),
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether the semantic path has been switched off by a provider failure.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Score two normalized names.
    ///
    /// Exact equality short-circuits to 1.0 before any provider call, so an
    /// identical name can never be degraded by semantic noise.
    pub async fn score(&self, a: &str, b: &str) -> Confidence {
        if a == b {
            return Confidence {
                value: 1.0,
                method: MatchMethod::Exact,
            };
        }

        let lexical = lexical_similarity(a, b);
        let Some(semantic) = self.semantic(a, b).await else {
            return Confidence {
                value: lexical,
                method: MatchMethod::Fuzzy,
            };
        };

        // Either strong signal is sufficient when both point the same way;
        // disagreeing signals are averaged so one low value cannot be masked.
        if (lexical >= 0.5) == (semantic >= 0.5) {
            if semantic > lexical {
                Confidence {
                    value: semantic,
                    method: MatchMethod::Semantic,
                }
            } else {
                Confidence {
                    value: lexical,
                    method: MatchMethod::Fuzzy,
                }
            }
        } else {
            let total = self.lexical_weight + self.semantic_weight;
            Confidence {
                value: (lexical * self.lexical_weight + semantic * self.semantic_weight) / total,
                method: MatchMethod::Combined,
            }
        }
    }

    async fn semantic(&self, a: &str, b: &str) -> Option<f64> {
        let provider = self.provider.as_ref()?;
        if self.is_degraded() {
            return None;
        }

        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return Some(*hit);
            }
        }

        match provider.similarity(&key.0, &key.1).await {
            Ok(score) => {
                let score = score.clamp(0.0, 1.0);
                if let Ok(mut cache) = self.cache.lock() {
                    cache.insert(key, score);
                }
                Some(score)
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "semantic similarity unavailable, continuing lexical-only"
                );
                self.degraded.store(true, Ordering::Relaxed);
                None
            }
        }
    }
}

/// Lexical similarity in `[0, 1]`: the stronger of Jaro-Winkler on the
/// normalized names and normalized Levenshtein on the separator-stripped
/// forms, so spacing differences do not drown real matches.
pub fn lexical_similarity(a: &str, b: &str) -> f64 {
    let jw = jaro_winkler::similarity(a.chars(), b.chars());
    let stripped_a = strip_separators(a);
    let stripped_b = strip_separators(b);
    let lev = levenshtein::normalized_similarity(stripped_a.chars(), stripped_b.chars());
    jw.max(lev)
}

/// Raw edit distance used as a deterministic tie-break.
pub fn edit_distance(a: &str, b: &str) -> usize {
    levenshtein::distance(a.chars(), b.chars())
}

fn strip_separators(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-' && *c != '.')
        .collect()
}
