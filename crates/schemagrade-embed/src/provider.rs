use async_trait::async_trait;

use crate::error::EmbedError;

/// Collaborator that judges semantic relatedness of two identifiers.
///
/// Implementations may block on external I/O; callers are expected to treat
/// any error as a signal to continue without the semantic path.
#[async_trait]
pub trait SimilarityProvider: Send + Sync {
    /// Semantic similarity in `[0, 1]` between two strings.
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, EmbedError>;
}
