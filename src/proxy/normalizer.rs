// Request normalizer - validates raw JSON bodies and applies defaults

use serde_json::{Map, Value};

use super::{GenerationCall, ImageCall};
use crate::config::AppConfig;
use crate::error::ProxyError;

/// Pull `model`, `config` and `contents` out of a generate request body.
///
/// `model` falls back to the configured default when absent, null or empty,
/// and must otherwise be a bare model id, optionally prefixed with
/// `models/` or `tunedModels/`.
/// `config` keys must be on the allow-list; their values are not inspected.
/// `contents` must be present, its shape is checked by the provider adapter.
pub fn normalize_generation(body: Value, config: &AppConfig) -> Result<GenerationCall, ProxyError> {
    let mut body = into_object(body)?;

    let model = match body.remove("model") {
        None | Some(Value::Null) => config.default_model.clone(),
        Some(Value::String(model)) if model.trim().is_empty() => config.default_model.clone(),
        Some(Value::String(model)) => validate_model(model.trim())?,
        Some(_) => return Err(invalid("`model` must be a string")),
    };

    let handle_config = match body.remove("config") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(invalid("`config` must be an object")),
    };

    let mut unsupported: Vec<String> = handle_config
        .keys()
        .filter(|key| !config.is_config_key_allowed(key))
        .cloned()
        .collect();
    if !unsupported.is_empty() {
        unsupported.sort();
        return Err(ProxyError::UnsupportedConfig(unsupported));
    }

    let contents = match body.remove("contents") {
        None | Some(Value::Null) => return Err(invalid("`contents` is required")),
        Some(contents) => contents,
    };

    Ok(GenerationCall {
        model,
        config: handle_config,
        contents,
    })
}

/// Pull `prompt` and `referenceImages` out of an image request body.
/// An empty `referenceImages` list is dropped entirely.
pub fn normalize_image(body: Value) -> Result<ImageCall, ProxyError> {
    let mut body = into_object(body)?;

    let prompt = match body.remove("prompt") {
        Some(Value::String(prompt)) if !prompt.trim().is_empty() => prompt,
        Some(Value::String(_)) | None | Some(Value::Null) => {
            return Err(invalid("`prompt` is required"))
        }
        Some(_) => return Err(invalid("`prompt` must be a string")),
    };

    let reference_images = match body.remove("referenceImages") {
        None | Some(Value::Null) => None,
        Some(Value::Array(images)) if images.is_empty() => None,
        Some(Value::Array(images)) => Some(images),
        Some(_) => return Err(invalid("`referenceImages` must be an array")),
    };

    Ok(ImageCall {
        prompt,
        reference_images,
    })
}

const MODEL_PREFIXES: &[&str] = &["models/", "tunedModels/"];

/// A model id ends up as a URL path segment, so only `[A-Za-z0-9._-]` is
/// accepted and `.`/`..` alone are refused.
fn validate_model(model: &str) -> Result<String, ProxyError> {
    let id = MODEL_PREFIXES
        .iter()
        .find_map(|prefix| model.strip_prefix(prefix))
        .unwrap_or(model);

    let well_formed = !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if well_formed {
        Ok(model.to_string())
    } else {
        Err(ProxyError::InvalidRequest(format!(
            "`model` is not a valid model name: {:?}",
            model
        )))
    }
}

fn into_object(body: Value) -> Result<Map<String, Value>, ProxyError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(invalid("Request body must be a JSON object")),
    }
}

fn invalid(message: &str) -> ProxyError {
    ProxyError::InvalidRequest(message.to_string())
}
