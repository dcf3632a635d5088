//! Embedding collaborator: an HTTP embedding service behind the `Embedder`
//! trait, plus in-process cosine similarity over the returned vectors.
//!
//! ARCHITECTURAL RULE: this is the only module that talks to the embedding
//! service. Stages depend on the trait, never on the client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::EvalError;

const MAX_RETRIES: u32 = 3;

/// Turns text into a fixed-length vector. Implementations must be safe for
/// concurrent use from multiple pipeline runs.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EvalError>;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Client for an HTTP embedding endpoint.
/// Retries on 429 and 5xx with exponential backoff.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
}

impl HttpEmbedder {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            endpoint,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EvalError> {
        let body = EmbedRequest { input: text };
        let mut last_error: Option<String> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Embedding attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.post(&self.endpoint).json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(format!("transport error: {e}"));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(format!("service returned {status}: {body}"));
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(EvalError::Embedding(format!(
                    "service returned {status}: {body}"
                )));
            }

            let parsed: EmbedResponse = response
                .json()
                .await
                .map_err(|e| EvalError::Embedding(format!("malformed response: {e}")))?;
            return validate_vector(parsed.embedding);
        }

        Err(EvalError::Embedding(
            last_error.unwrap_or_else(|| "embedding service unavailable".into()),
        ))
    }
}

fn validate_vector(vector: Vec<f32>) -> Result<Vec<f32>, EvalError> {
    if vector.is_empty() {
        return Err(EvalError::Embedding("service returned an empty vector".into()));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(EvalError::Embedding(
            "service returned a non-finite component".into(),
        ));
    }
    debug!("Embedding generated: dim={}", vector.len());
    Ok(vector)
}

/// Cosine similarity between two vectors of equal dimension, clamped to
/// [0, 1]. Mismatched dimensions are a `SimilarityError`; a zero-norm vector
/// has no direction and scores 0.
pub fn similarity(a: &[f32], b: &[f32]) -> Result<f64, EvalError> {
    if a.len() != b.len() {
        return Err(EvalError::Similarity(format!(
            "vector dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    if a.is_empty() {
        return Err(EvalError::Similarity("vectors are empty".into()));
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors_score_one() {
        let v = vec![0.5, -0.2, 0.8];
        assert!((similarity(&v, &v).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_orthogonal_vectors_score_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert_eq!(similarity(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_opposite_vectors_clamp_to_zero() {
        let a = vec![1.0, 1.0];
        let b = vec![-1.0, -1.0];
        assert_eq!(similarity(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch_is_similarity_error() {
        let err = similarity(&[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, EvalError::Similarity(_)));
    }

    #[test]
    fn test_zero_norm_scores_zero() {
        assert_eq!(similarity(&[0.0, 0.0], &[1.0, 2.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_validate_vector_rejects_empty_and_nan() {
        assert!(validate_vector(vec![]).is_err());
        assert!(validate_vector(vec![1.0, f32::NAN]).is_err());
        assert!(validate_vector(vec![0.1, 0.2]).is_ok());
    }
}
