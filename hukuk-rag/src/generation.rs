//! Generative model seam: request/response types and the [`Generator`] trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Content categories the model's safety filter can block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

/// Probability level at which a category gets blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

/// A threshold for one harm category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// Sampling and safety configuration sent with every generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub safety_settings: Vec<SafetySetting>,
}

impl GenerationSettings {
    /// Settings for answering legal questions.
    ///
    /// Legal text routinely discusses crimes and violence, so only
    /// high-probability harmful content is blocked.
    pub fn for_legal_text(temperature: f32) -> Self {
        let safety_settings = [
            HarmCategory::Harassment,
            HarmCategory::HateSpeech,
            HarmCategory::SexuallyExplicit,
            HarmCategory::DangerousContent,
        ]
        .into_iter()
        .map(|category| SafetySetting { category, threshold: HarmBlockThreshold::BlockOnlyHigh })
        .collect();

        Self { temperature, safety_settings }
    }
}

/// One prompt to the generative model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub settings: GenerationSettings,
}

/// The parts of a model response the synthesizer needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Concatenated text of the first candidate. Empty when nothing was produced.
    pub text: String,
    /// Why the prompt or answer was blocked, if it was.
    pub block_reason: Option<String>,
}

impl GenerationResponse {
    /// A plain text response.
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), block_reason: None }
    }

    /// A response with no text, blocked for `reason`.
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self { text: String::new(), block_reason: Some(reason.into()) }
    }

    /// Whether the model withheld its answer for safety reasons.
    pub fn is_blocked(&self) -> bool {
        self.text.trim().is_empty() && self.block_reason.is_some()
    }
}

/// A generative language model.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a completion for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;
}
