//! Entity extraction module - LLM-backed triple extraction
//!
//! The remote model is unreliable: it may fail at the transport level, be
//! rate limited, or return something that is not the requested JSON shape.
//! Everything it returns is resolved into [`ExtractionValue`] exactly once
//! at this boundary; downstream code never inspects raw JSON shapes.

pub mod openai;
pub mod prompt;

pub use openai::{get_api_key, has_api_key, OpenAiExtractor};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::graph::EntityRelation;

// ============================================================================
// Errors
// ============================================================================

/// Failure modes of one extraction call. All of these are retryable from
/// the pipeline's point of view.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Network-level failure talking to the model endpoint
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status
    #[error("extraction API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body did not have the expected envelope
    #[error("malformed extraction response: {0}")]
    Malformed(String),
}

// ============================================================================
// Extraction Value
// ============================================================================

/// Resolved model output.
///
/// The model is asked for either a bare JSON array of relations or an
/// object wrapping them under an `entities` key; both resolve to
/// `Entities` (possibly empty, meaning "no relations found"). Anything
/// else keeps its raw value for the error record.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionValue {
    Entities(Vec<EntityRelation>),
    Invalid(Value),
}

impl ExtractionValue {
    /// Resolve a raw JSON value once, at the service boundary.
    pub fn from_value(value: Value) -> Self {
        let candidate = match &value {
            Value::Object(map) => match map.get("entities") {
                Some(entities) => entities.clone(),
                None => return Self::Invalid(value),
            },
            Value::Array(_) => value.clone(),
            _ => return Self::Invalid(value),
        };

        match serde_json::from_value::<Vec<EntityRelation>>(candidate) {
            Ok(entities) => Self::Entities(entities),
            Err(_) => Self::Invalid(value),
        }
    }
}

// ============================================================================
// Extractor Contract
// ============================================================================

/// An opaque extraction service: article text in, relation tuples out.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Extract relations from one article.
    async fn extract_one(&self, text: &str) -> Result<ExtractionValue, ExtractError>;

    /// Extract relations for a whole batch, one result slot per input in
    /// matching order. The default submits every item concurrently and
    /// fails the whole batch when any item fails; callers fall back to
    /// per-item handling in that case.
    async fn extract_batch(&self, texts: &[String]) -> Result<Vec<ExtractionValue>, ExtractError> {
        futures::future::try_join_all(texts.iter().map(|t| self.extract_one(t))).await
    }
}

// ============================================================================
// Tests
// ============================================================================
