use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::EmbedError;
use crate::provider::SimilarityProvider;

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "models/text-embedding-004";

/// Gemini embedding client with bounded concurrency and a request timeout.
///
/// One client is shared across batch workers; the semaphore keeps the number
/// of in-flight embedding calls within the external API quota.
#[derive(Clone)]
pub struct GeminiProvider {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl GeminiProvider {
    /// Build a client with default limits (4 in-flight calls, 10s timeout).
    pub fn new(api_key: impl Into<String>) -> Result<Self, EmbedError> {
        Self::with_options(api_key, 4, Duration::from_secs(10))
    }

    pub fn with_options(
        api_key: impl Into<String>,
        max_in_flight: usize,
        timeout: Duration,
    ) -> Result<Self, EmbedError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            timeout,
        })
    }

    /// Override the API endpoint, mainly for tests against a local stub.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbedError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| EmbedError::Api("embedding client closed".to_string()))?;

        let url = format!(
            "{}/{}:embedContent?key={}",
            self.endpoint, self.model, self.api_key
        );
        let body = EmbedRequest {
            model: &self.model,
            content: Content {
                parts: vec![Part { text }],
            },
        };

        let request = self.http.post(&url).json(&body).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| EmbedError::Timeout)??;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(EmbedError::Api(format!("{status}: {detail}")));
        }

        let payload: EmbedResponse = response.json().await?;
        if payload.embedding.values.is_empty() {
            return Err(EmbedError::Api("empty embedding returned".to_string()));
        }
        Ok(payload.embedding.values)
    }
}

#[async_trait]
impl SimilarityProvider for GeminiProvider {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, EmbedError> {
        let left = self.embed(a).await?;
        let right = self.embed(b).await?;
        Ok(cosine(&left, &right).clamp(0.0, 1.0))
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f64>,
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.5, 0.25, -0.1];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_handles_zero_vectors() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }
}
