// API request handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{Method, Uri},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::Instrument;

use super::AppState;
use crate::error::{ProviderError, ProxyError};
use crate::proxy::normalizer;
use crate::proxy::shaper::{self, GenerationResponse, ImageGenerationResponse};

pub const GENERATE_FAILED_MESSAGE: &str = "Failed to generate content";
pub const GENERATE_IMAGE_FAILED_MESSAGE: &str = "Failed to generate image";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}

// Liveness probe, never touches the provider
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })
}

pub async fn generate(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("generate", %request_id);

    async move {
        match run_generate(&state, body).await {
            Ok(response) => Json(response).into_response(),
            Err(e) => e.into_response_with(GENERATE_FAILED_MESSAGE),
        }
    }
    .instrument(span)
    .await
}

async fn run_generate(
    state: &AppState,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<GenerationResponse, ProxyError> {
    let Json(body) = body?;
    let call = normalizer::normalize_generation(body, &state.config)?;

    tracing::info!(model = %call.model, config_keys = call.config.len(), "Forwarding generation request");
    let result = with_deadline(state.config.request_timeout(), state.provider.generate(call)).await?;

    Ok(shaper::shape_generation(&result)?)
}

pub async fn generate_image(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("generate_image", %request_id);

    async move {
        match run_generate_image(&state, body).await {
            Ok(response) => Json(response).into_response(),
            Err(e) => e.into_response_with(GENERATE_IMAGE_FAILED_MESSAGE),
        }
    }
    .instrument(span)
    .await
}

async fn run_generate_image(
    state: &AppState,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<ImageGenerationResponse, ProxyError> {
    let Json(body) = body?;
    let call = normalizer::normalize_image(body)?;

    tracing::info!(
        reference_images = call.reference_images.as_ref().map(|r| r.len()).unwrap_or(0),
        "Forwarding image request"
    );
    let result =
        with_deadline(state.config.request_timeout(), state.provider.generate_image(call)).await?;

    Ok(shaper::shape_image(result))
}

pub async fn not_found(uri: Uri) -> Response {
    ProxyError::NotFound(uri.path().to_string()).into_response()
}

pub async fn method_not_allowed(method: Method, uri: Uri) -> Response {
    ProxyError::MethodNotAllowed(format!("{} {}", method, uri.path())).into_response()
}

/// Await a provider call, giving up once `deadline` has passed.
/// Dropping the future cancels the in-flight upstream request.
async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, ProxyError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result.map_err(ProxyError::from),
        Err(_) => Err(ProxyError::Timeout(deadline)),
    }
}
