//! Generation step: turns an enriched prompt into an output image.
//!
//! Only a mock provider ships here. It stands in for an external image
//! API: it sleeps, fails at a configurable rate, retries a bounded number
//! of times, and returns a deterministic placeholder URL.

use async_trait::async_trait;
use kura_core::category::FALLBACK_STYLE;
use kura_core::image::{ImageMetadata, DEFAULT_IMAGE_HEIGHT, DEFAULT_IMAGE_WIDTH};
use kura_core::prompt::GenerationPrompt;
use rand::Rng;

use crate::latency::SimulatedLatency;

/// Provider tag stamped on results produced by [`MockGenerationProvider`].
pub const PROVIDER_MOCK_AI: &str = "mock-ai";

pub const DEFAULT_FAILURE_RATE: f64 = 0.15;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("AI generation API failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Output of a single successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub url: String,
    pub provider: String,
    pub style: String,
    pub metadata: ImageMetadata,
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<GeneratedImage, GenerationError>;
}

/// Simulated generation API.
pub struct MockGenerationProvider {
    latency: SimulatedLatency,
    retry_pause: SimulatedLatency,
    failure_rate: f64,
    max_attempts: u32,
}

impl Default for MockGenerationProvider {
    fn default() -> Self {
        Self {
            latency: SimulatedLatency::new(1_500, 3_500),
            retry_pause: SimulatedLatency::new(500, 1_000),
            failure_rate: DEFAULT_FAILURE_RATE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl MockGenerationProvider {
    pub fn new(latency: SimulatedLatency, failure_rate: f64) -> Self {
        Self {
            latency,
            failure_rate: if failure_rate.is_nan() {
                0.0
            } else {
                failure_rate.clamp(0.0, 1.0)
            },
            ..Default::default()
        }
    }

    pub fn with_retry_pause(mut self, pause: SimulatedLatency) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    fn roll_failure(&self) -> bool {
        rand::rng().random_bool(self.failure_rate)
    }
}

#[async_trait]
impl GenerationProvider for MockGenerationProvider {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<GeneratedImage, GenerationError> {
        tracing::debug!(index = prompt.index, "Generating image");
        self.latency.wait().await;

        let mut attempts = 0;
        loop {
            attempts += 1;
            if !self.roll_failure() {
                break;
            }
            if attempts >= self.max_attempts {
                return Err(GenerationError::RetriesExhausted { attempts });
            }
            tracing::debug!(
                index = prompt.index,
                attempt = attempts,
                max_attempts = self.max_attempts,
                "Generation attempt failed, retrying",
            );
            self.retry_pause.wait().await;
        }

        let style = if prompt.options.style.is_empty() {
            FALLBACK_STYLE.to_string()
        } else {
            prompt.options.style.clone()
        };

        Ok(GeneratedImage {
            url: placeholder_url(&prompt.text, prompt.index),
            provider: PROVIDER_MOCK_AI.to_string(),
            style,
            metadata: ImageMetadata {
                width: DEFAULT_IMAGE_WIDTH,
                height: DEFAULT_IMAGE_HEIGHT,
                format: "jpg".to_string(),
            },
        })
    }
}

/// Deterministic placeholder image URL for a prompt/index pair.
pub fn placeholder_url(prompt: &str, index: usize) -> String {
    let seed = prompt_seed(prompt) + index as u64;
    format!("https://picsum.photos/seed/{seed}/{DEFAULT_IMAGE_WIDTH}/{DEFAULT_IMAGE_HEIGHT}")
}

/// 32-bit string hash (`h = h * 31 + unit` over UTF-16 code units),
/// returned as its absolute value.
fn prompt_seed(prompt: &str) -> u64 {
    let hash = prompt.encode_utf16().fold(0i32, |acc, unit| {
        acc.wrapping_shl(5)
            .wrapping_sub(acc)
            .wrapping_add(i32::from(unit))
    });
    u64::from(hash.unsigned_abs())
}
