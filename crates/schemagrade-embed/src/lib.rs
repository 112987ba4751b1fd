//! Embedding-backed semantic similarity collaborator.
//!
//! The matching engine only sees the [`SimilarityProvider`] trait; the
//! Gemini client here is one implementation of it.

pub mod error;
pub mod gemini;
pub mod provider;

pub use error::EmbedError;
pub use gemini::GeminiProvider;
pub use provider::SimilarityProvider;
