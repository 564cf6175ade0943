// Proxy module - provider abstraction and the per-request call shapes

pub mod normalizer;
pub mod shaper;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ProviderError;

/// A normalized text/multimodal generation request, ready for the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationCall {
    pub model: String,
    /// Model handle options, merged into the provider request as-is.
    pub config: Map<String, Value>,
    pub contents: Value,
}

/// A normalized single-image generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCall {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_images: Option<Vec<Value>>,
}

/// Completed generation as returned by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    text: Result<String, ProviderError>,
    function_calls: Option<Vec<Value>>,
    candidates: Option<Vec<Value>>,
}

impl GenerationResult {
    pub fn new(
        text: impl Into<String>,
        function_calls: Option<Vec<Value>>,
        candidates: Option<Vec<Value>>,
    ) -> Self {
        Self {
            text: Ok(text.into()),
            function_calls,
            candidates,
        }
    }

    /// A result whose text is unavailable, e.g. because the prompt was blocked.
    pub fn blocked(reason: ProviderError, candidates: Option<Vec<Value>>) -> Self {
        Self {
            text: Err(reason),
            function_calls: None,
            candidates,
        }
    }

    pub fn text(&self) -> Result<String, ProviderError> {
        self.text.clone()
    }

    pub fn function_calls(&self) -> Option<&[Value]> {
        self.function_calls.as_deref().filter(|calls| !calls.is_empty())
    }

    pub fn candidates(&self) -> Option<&[Value]> {
        self.candidates.as_deref()
    }
}

/// Images returned by the provider, possibly none.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageResult {
    pub images: Vec<Value>,
}

/// The generative-AI backend the HTTP layer talks to.
///
/// One instance is built at startup and shared by every request, so
/// implementations must be safe for concurrent use.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    async fn generate(&self, call: GenerationCall) -> Result<GenerationResult, ProviderError>;

    async fn generate_image(&self, call: ImageCall) -> Result<ImageResult, ProviderError>;
}
