//! Turning retrieved passages into a grounded answer.
//!
//! [`AnswerSynthesizer::answer`] never fails. Every path, including safety
//! blocks and upstream errors, ends in user-facing Turkish text; what went
//! wrong travels separately in [`SynthesizedAnswer::diagnostics`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::RagConfig;
use crate::error::{RagError, Result};
use crate::generation::{GenerationRequest, GenerationSettings, Generator};
use crate::prompt::PromptTemplate;
use crate::retriever::{RetrievalResult, Retriever};

/// Context handed to the model when retrieval found nothing.
pub const NO_CONTEXT: &str = "İlgili bilgi bulunamadı.";

/// Substring that marks an answer as "no information found".
pub const NOT_FOUND_MARKER: &str = "bulunamadı";

/// Shown instead of an answer the safety filter withheld.
pub const BLOCKED_ANSWER: &str =
    "Üzgünüm, ürettiğim yanıt güvenlik politikalarımız nedeniyle engellendi.";

/// Shown when the model returned no usable text.
pub const RESPONSE_ERROR_ANSWER: &str = "Yanıt alınırken bir hata oluştu.";

/// Shown when anything else went wrong.
pub const GENERIC_ERROR_ANSWER: &str = "Üzgünüm, cevap üretilirken genel bir hata oluştu.";

/// Heading placed above the source list appended to an answer.
pub const CITATION_HEADING: &str = "\n\n---\n*Kaynaklar (İlgili Orijinal Sorular):*\n";

/// The outcome of one chat turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedAnswer {
    /// The text to show the user, citations included.
    pub text: String,
    /// Whether the model's answer was withheld by the safety filter.
    pub blocked: bool,
    /// Deduplicated source labels of the retrieved passages.
    pub sources: Vec<String>,
    /// Problems encountered along the way, for logs and operators.
    pub diagnostics: Vec<String>,
}

impl SynthesizedAnswer {
    fn fallback(text: &str, diagnostic: String) -> Self {
        Self { text: text.to_string(), diagnostics: vec![diagnostic], ..Self::default() }
    }
}

/// Composes the prompt, calls the model and post-processes its answer.
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
    settings: GenerationSettings,
}

impl AnswerSynthesizer {
    /// A synthesizer using the legal template and safety settings at `temperature`.
    pub fn new(generator: Arc<dyn Generator>, temperature: f32) -> Self {
        Self {
            generator,
            template: PromptTemplate::legal_qa(),
            settings: GenerationSettings::for_legal_text(temperature),
        }
    }

    /// A synthesizer configured from `config`.
    pub fn from_config(generator: Arc<dyn Generator>, config: &RagConfig) -> Self {
        Self::new(generator, config.temperature)
    }

    /// Replace the prompt template. It must use the `context` and `question` fields.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Answer `query` from the passages `retriever` finds for it.
    pub async fn answer(&self, query: &str, retriever: &Retriever) -> SynthesizedAnswer {
        let retrieval = retriever.retrieve(query, retriever.top_k()).await;
        self.answer_with(query, retrieval).await
    }

    /// Answer `query` from an existing retrieval result.
    pub async fn answer_with(&self, query: &str, retrieval: RetrievalResult) -> SynthesizedAnswer {
        let mut diagnostics: Vec<String> = retrieval.diagnostic.iter().cloned().collect();
        match self.generate(query, &retrieval).await {
            Ok(mut answer) => {
                diagnostics.append(&mut answer.diagnostics);
                answer.diagnostics = diagnostics;
                answer
            }
            Err(e) => {
                error!(error = %e, "answer synthesis failed");
                diagnostics.push(e.to_string());
                SynthesizedAnswer {
                    text: GENERIC_ERROR_ANSWER.to_string(),
                    diagnostics,
                    ..SynthesizedAnswer::default()
                }
            }
        }
    }

    async fn generate(
        &self,
        query: &str,
        retrieval: &RetrievalResult,
    ) -> Result<SynthesizedAnswer> {
        let context =
            if retrieval.is_empty() { NO_CONTEXT.to_string() } else { retrieval.context() };
        let prompt = self.template.render(&[("context", context.as_str()), ("question", query)])?;

        let request = GenerationRequest { prompt, settings: self.settings.clone() };
        let response = self.generator.generate(&request).await?;

        if response.is_blocked() {
            let reason = response.block_reason.unwrap_or_default();
            warn!(block_reason = %reason, "answer blocked by safety filter");
            return Ok(SynthesizedAnswer {
                text: BLOCKED_ANSWER.to_string(),
                blocked: true,
                sources: Vec::new(),
                diagnostics: vec![format!("answer blocked: {reason}")],
            });
        }

        if response.text.trim().is_empty() {
            return Ok(SynthesizedAnswer::fallback(
                RESPONSE_ERROR_ANSWER,
                RagError::GenerationError {
                    provider: "synthesizer".into(),
                    message: "model returned no text".into(),
                }
                .to_string(),
            ));
        }

        let sources = retrieval.sources();
        let mut text = response.text;
        if !sources.is_empty() && !text.contains(NOT_FOUND_MARKER) {
            text.push_str(CITATION_HEADING);
            text.push_str(&retrieval.source_block());
        }
        info!(sources = sources.len(), answer_len = text.len(), "answer synthesized");

        Ok(SynthesizedAnswer { text, blocked: false, sources, diagnostics: Vec::new() })
    }
}
