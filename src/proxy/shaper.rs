// Response shaper - builds the client-facing success envelopes

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{GenerationResult, ImageResult};
use crate::error::ProviderError;

/// Success body of `POST /api/gemini/generate`.
///
/// Optional fields serialize as `null` rather than being omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub text: String,
    pub function_calls: Option<Vec<Value>>,
    pub candidates: Option<Vec<Value>>,
}

/// Success body of `POST /api/gemini/generate-image`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGenerationResponse {
    pub images: Vec<Value>,
}

pub fn shape_generation(result: &GenerationResult) -> Result<GenerationResponse, ProviderError> {
    Ok(GenerationResponse {
        text: result.text()?,
        function_calls: result.function_calls().map(|calls| calls.to_vec()),
        candidates: result.candidates().map(|candidates| candidates.to_vec()),
    })
}

pub fn shape_image(result: ImageResult) -> ImageGenerationResponse {
    ImageGenerationResponse {
        images: result.images,
    }
}
