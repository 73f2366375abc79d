//! Model access for the planner
//!
//! Planning decisions and the generative tools both go through [`LlmService`].
//! [`ModelRegistry`] resolves which hosted models the configured credentials
//! can reach and hands out services wrapped in [`LoggingService`].

mod anthropic;
mod error;
mod models;
mod registry;
mod types;

pub use anthropic::AnthropicService;
pub use error::{LlmError, LlmErrorKind};
pub use registry::{LlmConfig, ModelRegistry};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// One hosted model able to answer a completion request
#[async_trait]
pub trait LlmService: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    fn model_id(&self) -> &str;
}

/// Records latency, token usage and failure class for every request
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();
        let result = self.inner.complete(request).await;
        let duration_ms = start.elapsed().as_millis();

        match &result {
            Ok(response) => tracing::info!(
                model = %self.model_id,
                duration_ms = %duration_ms,
                messages = request.messages.len(),
                offered_tools = request.tools.len(),
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                tool_uses = response.tool_uses().len(),
                "LLM request completed"
            ),
            Err(e) => tracing::error!(
                model = %self.model_id,
                duration_ms = %duration_ms,
                kind = ?e.kind,
                retryable = e.kind.is_retryable(),
                retry_after_ms = e.retry_after.map(|d| d.as_millis()),
                error = %e.message,
                "LLM request failed"
            ),
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
