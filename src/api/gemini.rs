// Gemini API client for proxying requests
// Uses the public Generative Language REST endpoint with an API key

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::fmt;
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::ProviderError;
use crate::proxy::{GenerationCall, GenerationResult, GenerativeProvider, ImageCall, ImageResult};

const USER_AGENT: &str = concat!("petvision-proxy/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Every image request asks for exactly one picture.
const IMAGES_PER_REQUEST: u32 = 1;

/// Finish reasons for which the SDK refuses to hand out text.
const BLOCKED_FINISH_REASONS: &[&str] = &["SAFETY", "RECITATION", "LANGUAGE"];

#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    image_model: String,
    http_client: reqwest::Client,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("image_model", &self.image_model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            image_model: image_model.into(),
            http_client,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        Self::new(&config.gemini_api_key, &config.base_url, &config.image_model)
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        let (collection, id) = match model.split_once('/') {
            Some((collection @ "tunedModels", id)) => (collection, id),
            Some(("models", id)) => ("models", id),
            _ => ("models", model),
        };
        format!(
            "{}/{}/{}:{}",
            self.base_url,
            collection,
            urlencoding::encode(id),
            method
        )
    }

    /// POST a JSON payload and return the decoded body, mapping non-2xx
    /// answers to a `ProviderError` carrying the upstream status.
    async fn post_json(&self, url: &str, payload: &Value) -> Result<Value, ProviderError> {
        let response = self
            .http_client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(upstream_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::new(format!("Invalid JSON from provider: {}", e)))
    }
}

#[async_trait]
impl GenerativeProvider for GeminiClient {
    async fn generate(&self, call: GenerationCall) -> Result<GenerationResult, ProviderError> {
        let payload = build_generate_payload(&call)?;
        let url = self.model_url(&call.model, "generateContent");

        tracing::debug!(model = %call.model, "Sending generateContent request");
        let body = self.post_json(&url, &payload).await?;
        Ok(parse_generate_response(body))
    }

    async fn generate_image(&self, call: ImageCall) -> Result<ImageResult, ProviderError> {
        let payload = build_predict_payload(&call);
        let url = self.model_url(&self.image_model, "predict");

        tracing::debug!(model = %self.image_model, "Sending predict request");
        let body = self.post_json(&url, &payload).await?;
        Ok(parse_predict_response(body))
    }
}

/// Merge the model handle options with the contents into a generateContent body.
pub fn build_generate_payload(call: &GenerationCall) -> Result<Value, ProviderError> {
    let mut payload = call.config.clone();

    // The SDK accepts a bare string here, the REST API wants a Content.
    let system_text = payload
        .get("systemInstruction")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(text) = system_text {
        let instruction = json!({ "role": "system", "parts": [{ "text": text }] });
        payload.insert("systemInstruction".to_string(), instruction);
    }

    payload.insert("contents".to_string(), to_provider_contents(&call.contents)?);
    Ok(Value::Object(payload))
}

/// Convert the loose `contents` accepted from clients into `Content[]`.
///
/// Accepts a prompt string, a list of strings/parts (one user turn), a list
/// of `{role, parts}` turns, a single turn, or a request object that carries
/// its own `contents`.
pub fn to_provider_contents(contents: &Value) -> Result<Value, ProviderError> {
    match contents {
        Value::String(text) => Ok(json!([user_turn(vec![json!({ "text": text })])])),
        Value::Array(items) if items.is_empty() => Err(invalid_contents("contents must not be empty")),
        Value::Array(items) if items.iter().any(is_turn) => {
            let turns = items
                .iter()
                .map(|item| match item {
                    Value::Object(turn) if turn.contains_key("parts") => Ok(with_default_role(turn)),
                    _ => Err(invalid_contents("every turn must be an object with `parts`")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(turns))
        }
        Value::Array(items) => {
            let parts = items.iter().map(to_part).collect::<Result<Vec<_>, _>>()?;
            Ok(json!([user_turn(parts)]))
        }
        Value::Object(obj) => {
            if let Some(inner) = obj.get("contents") {
                return to_provider_contents(inner);
            }
            if obj.contains_key("parts") {
                return Ok(json!([with_default_role(obj)]));
            }
            Ok(json!([user_turn(vec![contents.clone()])]))
        }
        _ => Err(invalid_contents("expected a string, an array or an object")),
    }
}

fn is_turn(item: &Value) -> bool {
    item.get("parts").is_some()
}

fn to_part(item: &Value) -> Result<Value, ProviderError> {
    match item {
        Value::String(text) => Ok(json!({ "text": text })),
        Value::Object(_) => Ok(item.clone()),
        _ => Err(invalid_contents("parts must be strings or objects")),
    }
}

fn user_turn(parts: Vec<Value>) -> Value {
    json!({ "role": "user", "parts": parts })
}

fn with_default_role(turn: &Map<String, Value>) -> Value {
    let mut turn = turn.clone();
    if !turn.get("role").map(Value::is_string).unwrap_or(false) {
        turn.insert("role".to_string(), json!("user"));
    }
    Value::Object(turn)
}

fn invalid_contents(reason: &str) -> ProviderError {
    ProviderError::new(format!("Invalid contents: {}", reason))
}

/// Build a `:predict` body requesting a single image.
pub fn build_predict_payload(call: &ImageCall) -> Value {
    let mut instance = Map::new();
    instance.insert("prompt".to_string(), json!(call.prompt));
    if let Some(images) = call.reference_images.as_ref().filter(|images| !images.is_empty()) {
        instance.insert("referenceImages".to_string(), json!(images));
    }

    json!({
        "instances": [Value::Object(instance)],
        "parameters": { "sampleCount": IMAGES_PER_REQUEST }
    })
}

/// Read text, function calls and candidates out of a generateContent body.
pub fn parse_generate_response(body: Value) -> GenerationResult {
    let root = match body {
        Value::Object(mut obj) if obj.contains_key("response") && !obj.contains_key("candidates") => {
            obj.remove("response").unwrap_or(Value::Null)
        }
        other => other,
    };

    let candidates = root.get("candidates").and_then(Value::as_array).cloned();
    let first = candidates.as_ref().and_then(|c| c.first()).cloned();

    let Some(candidate) = first else {
        if let Some(reason) = root
            .get("promptFeedback")
            .and_then(|f| f.get("blockReason"))
            .and_then(Value::as_str)
        {
            let message = format!("Text not available. Response was blocked due to {}", reason);
            return GenerationResult::blocked(ProviderError::new(message), candidates);
        }
        return GenerationResult::new(String::new(), None, candidates);
    };

    if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str) {
        if BLOCKED_FINISH_REASONS.contains(&reason) {
            let message = format!("Candidate was blocked due to {}", reason);
            return GenerationResult::blocked(ProviderError::new(message), candidates);
        }
    }

    let parts = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array);

    let mut text = String::new();
    let mut function_calls = Vec::new();
    for part in parts.into_iter().flatten() {
        let is_thought = part.get("thought").and_then(Value::as_bool).unwrap_or(false);
        if let Some(part_text) = part.get("text").and_then(Value::as_str) {
            if !is_thought {
                text.push_str(part_text);
            }
        }
        if let Some(call) = part.get("functionCall") {
            function_calls.push(call.clone());
        }
    }

    let function_calls = if function_calls.is_empty() {
        None
    } else {
        Some(function_calls)
    };

    GenerationResult::new(text, function_calls, candidates)
}

pub fn parse_predict_response(body: Value) -> ImageResult {
    let images = body
        .get("predictions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    ImageResult { images }
}

/// Longest slice of a non-JSON error body echoed back to clients.
const MAX_RAW_ERROR_CHARS: usize = 200;

/// Build an error from a non-2xx answer, preferring Google's `error.message`.
/// Non-JSON bodies (HTML error pages and the like) are cut short.
fn upstream_error(status: u16, body: &str) -> ProviderError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("Provider request failed with status {}", status)
            } else if trimmed.chars().count() > MAX_RAW_ERROR_CHARS {
                let prefix: String = trimmed.chars().take(MAX_RAW_ERROR_CHARS).collect();
                format!("{}...", prefix)
            } else {
                trimmed.to_string()
            }
        });

    ProviderError::with_status(status, message)
}
