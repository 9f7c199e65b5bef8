//! Carbohydrate estimation backed by an external completion provider.
//!
//! [`CarbEstimator`] owns prompt construction, the bounded provider call and
//! interpretation of the reply. Transport failures surface as
//! [`PipelineError::EstimationUnavailable`]; unreadable replies degrade to the
//! fallback estimate in [`parse`].

pub mod parse;
pub mod prompts;
pub mod provider;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

pub use provider::{CompletionProvider, CompletionRequest, OpenAiCompatibleProvider};

use crate::config::EstimatorConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::meals::model::{Confidence, Food};

/// Transient AI-derived breakdown of a meal. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbEstimate {
    pub foods: Vec<Food>,
    pub total_carbs: f64,
    pub confidence: Confidence,
    pub needs_more_info: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clarifications: Vec<String>,
}

impl CarbEstimate {
    /// True when the caller should be asked the clarifying questions
    /// instead of committing the meal.
    pub fn wants_clarification(&self) -> bool {
        self.needs_more_info && !self.clarifications.is_empty()
    }
}

pub struct CarbEstimator {
    provider: Arc<dyn CompletionProvider>,
    config: EstimatorConfig,
}

impl CarbEstimator {
    pub fn new(config: EstimatorConfig) -> anyhow::Result<Self> {
        let provider = Arc::new(OpenAiCompatibleProvider::new(&config)?);
        info!(base_url = %config.base_url, model = %config.model, "carb estimator ready");
        Ok(Self::with_provider(provider, config))
    }

    pub fn with_provider(provider: Arc<dyn CompletionProvider>, config: EstimatorConfig) -> Self {
        Self { provider, config }
    }

    fn request_for(&self, description: &str, allow_clarifications: bool) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model.clone(),
            system: prompts::SYSTEM_PROMPT.to_string(),
            user: prompts::user_prompt(description, allow_clarifications),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    #[instrument(skip(self), fields(model = %self.config.model))]
    pub async fn estimate(
        &self,
        description: &str,
        allow_clarifications: bool,
    ) -> PipelineResult<CarbEstimate> {
        let request = self.request_for(description, allow_clarifications);
        let bound = Duration::from_millis(self.config.timeout_ms);

        let text = match tokio::time::timeout(bound, self.provider.complete(&request)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(error = %e, "completion provider failed");
                return Err(PipelineError::EstimationUnavailable(e.to_string()));
            }
            Err(_) => {
                warn!(timeout_ms = self.config.timeout_ms, "completion provider timed out");
                return Err(PipelineError::EstimationUnavailable(format!(
                    "no reply within {} ms",
                    self.config.timeout_ms
                )));
            }
        };

        Ok(parse::interpret(&text, description, allow_clarifications))
    }
}
