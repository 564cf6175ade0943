use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::ProviderError;
use crate::proxy::{GenerationCall, GenerationResult, GenerativeProvider, ImageCall, ImageResult};

pub fn test_config() -> AppConfig {
    AppConfig {
        gemini_api_key: "test-key".to_string(),
        ..AppConfig::default()
    }
}

/// Deterministic provider that records every call it receives.
pub struct StubProvider {
    generation: Result<GenerationResult, ProviderError>,
    images: Result<Vec<Value>, ProviderError>,
    delay: Option<Duration>,
    pub generation_calls: Mutex<Vec<GenerationCall>>,
    pub image_calls: Mutex<Vec<ImageCall>>,
}

impl StubProvider {
    pub fn with_text(text: &str) -> Self {
        Self {
            generation: Ok(GenerationResult::new(text, None, None)),
            images: Ok(Vec::new()),
            delay: None,
            generation_calls: Mutex::new(Vec::new()),
            image_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_result(result: GenerationResult) -> Self {
        Self {
            generation: Ok(result),
            ..Self::with_text("")
        }
    }

    pub fn with_images(images: Vec<Value>) -> Self {
        Self {
            images: Ok(images),
            ..Self::with_text("")
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            generation: Err(ProviderError::new(message)),
            images: Err(ProviderError::new(message)),
            ..Self::with_text("")
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn generation_calls(&self) -> Vec<GenerationCall> {
        self.generation_calls.lock().unwrap().clone()
    }

    pub fn image_calls(&self) -> Vec<ImageCall> {
        self.image_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeProvider for StubProvider {
    async fn generate(&self, call: GenerationCall) -> Result<GenerationResult, ProviderError> {
        self.generation_calls.lock().unwrap().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.generation.clone()
    }

    async fn generate_image(&self, call: ImageCall) -> Result<ImageResult, ProviderError> {
        self.image_calls.lock().unwrap().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.images.clone().map(|images| ImageResult { images })
    }
}
