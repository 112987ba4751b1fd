//! The matching engine: similarity scoring, table and column
//! correspondence, and foreign key comparison.
//!
//! Data flows strictly downward: the scorer feeds the table matcher, whose
//! output scopes the column matcher, and the foreign key comparator reads
//! both mappings.

pub mod column;
pub mod fk;
pub mod mapping;
pub mod score;
pub mod table;

pub use column::match_columns;
pub use fk::{FkComparisonResult, FkOutcome, compare_foreign_keys};
pub use mapping::{ColumnMapping, EntityPair, TableMapping};
pub use score::{Confidence, MatchMethod, SimilarityScorer, edit_distance, lexical_similarity};
pub use table::match_tables;
