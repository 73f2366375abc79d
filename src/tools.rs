//! External capabilities the planner can call
//!
//! Tools are stateless singletons; everything a call needs arrives through
//! [`ToolContext`]. [`ToolRegistry::dispatch`] turns every outcome into an
//! [`Observation`] the reasoning model can read back.

mod calculator;
mod currency;
mod flights;
mod generative;
mod hotels;
mod places;
mod weather;

pub use calculator::CalculatorTool;
pub use currency::CurrencyConverterTool;
pub use flights::FlightSearchTool;
pub use generative::{CreateMulticityRouteTool, GenerateItineraryTool};
pub use hotels::HotelSearchTool;
pub use places::SearchPlaceTool;
pub use weather::WeatherInfoTool;

use crate::llm::{ModelRegistry, ToolDefinition};
use crate::plan::ValidationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Default bound on a single tool call
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Result from tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    /// Structured result, serialized for the model
    pub fn json(value: &impl Serialize) -> Self {
        match serde_json::to_string(value) {
            Ok(output) => Self::success(output),
            Err(e) => Self::error(format!("failed to serialize tool result: {e}")),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }

    /// Failure shaped like the tool's list result: `[{"error": ...}]`
    pub fn error_list(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: json!([{ "error": message.into() }]).to_string(),
        }
    }
}

/// Normalized result of one tool call, fed back to the reasoning model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub tool_use_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl Observation {
    pub fn success(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// `{"error": message}`
    pub fn error(tool_use_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: json!({ "error": message.into() }).to_string(),
            is_error: true,
        }
    }

    /// Rejected plan update, with the offending field path
    pub fn invalid_update(tool_use_id: impl Into<String>, error: &ValidationError) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: json!({ "error": error.message, "path": error.path }).to_string(),
            is_error: true,
        }
    }

    /// Structured failures pass through as-is, plain messages get wrapped
    pub fn from_output(tool_use_id: impl Into<String>, output: ToolOutput) -> Self {
        if output.success {
            return Self::success(tool_use_id, output.output);
        }
        match serde_json::from_str::<Value>(&output.output) {
            Ok(Value::Object(_) | Value::Array(_)) => Self {
                tool_use_id: tool_use_id.into(),
                content: output.output,
                is_error: true,
            },
            _ => Self::error(tool_use_id, output.output),
        }
    }
}

/// Credentials for the informational tools
#[derive(Debug, Clone, Default)]
pub struct ToolConfig {
    pub weather_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub exchange_rates_api_key: Option<String>,
    pub rapidapi_key: Option<String>,
}

impl ToolConfig {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            weather_api_key: var("WEATHER_API_KEY"),
            google_api_key: var("GOOGLE_API_KEY"),
            exchange_rates_api_key: var("EXCHANGE_RATES_API_KEY"),
            rapidapi_key: var("RAPIDAPI_KEY"),
        }
    }
}

/// All context needed for a tool invocation.
///
/// Created fresh for each call. Tools derive everything from this struct.
#[derive(Clone)]
pub struct ToolContext {
    /// Cancellation signal for the whole turn
    pub cancel: CancellationToken,

    /// The session this tool is executing within
    pub session_key: String,

    http: reqwest::Client,
    config: Arc<ToolConfig>,
    llm_registry: Arc<ModelRegistry>,
}

impl ToolContext {
    pub fn new(
        cancel: CancellationToken,
        session_key: String,
        http: reqwest::Client,
        config: Arc<ToolConfig>,
        llm_registry: Arc<ModelRegistry>,
    ) -> Self {
        Self {
            cancel,
            session_key,
            http,
            config,
            llm_registry,
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    pub fn llm_registry(&self) -> &Arc<ModelRegistry> {
        &self.llm_registry
    }
}

/// Trait for tools that can be executed by the planner
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Execute the tool. Failures are reported in the output, never raised.
    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput;
}

/// Collection of tools available to the planner
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// The full travel tool set
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(CreateMulticityRouteTool),
            Arc::new(GenerateItineraryTool),
            Arc::new(WeatherInfoTool),
            Arc::new(SearchPlaceTool),
            Arc::new(CalculatorTool),
            Arc::new(CurrencyConverterTool),
            Arc::new(FlightSearchTool),
            Arc::new(HotelSearchTool),
        ])
    }

    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// Get all tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    fn find(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Run one call to completion, bounded by `timeout` and the context's
    /// cancellation token. Always yields an observation.
    pub async fn dispatch(
        &self,
        tool_use_id: &str,
        name: &str,
        input: Value,
        ctx: ToolContext,
        timeout: Duration,
    ) -> Observation {
        let Some(tool) = self.find(name) else {
            tracing::warn!(tool = name, "Unknown tool requested");
            return Observation::error(tool_use_id, format!("unknown tool '{name}'"));
        };

        let cancel = ctx.cancel.clone();
        let session = ctx.session_key.clone();
        let started = Instant::now();
        // Spawned so a panicking tool surfaces as a join error, not a crash
        let mut handle = tokio::spawn(async move { tool.run(input, ctx).await });

        let observation = tokio::select! {
            () = cancel.cancelled() => {
                handle.abort();
                Observation::error(tool_use_id, "cancelled")
            }
            () = tokio::time::sleep(timeout) => {
                handle.abort();
                Observation::error(
                    tool_use_id,
                    format!("tool '{name}' timed out after {}s", timeout.as_secs()),
                )
            }
            joined = &mut handle => match joined {
                Ok(output) => Observation::from_output(tool_use_id, output),
                Err(e) => Observation::error(tool_use_id, format!("tool '{name}' failed: {e}")),
            },
        };

        tracing::info!(
            session = %session,
            tool = name,
            duration_ms = started.elapsed().as_millis(),
            is_error = observation.is_error,
            "Tool call finished"
        );
        observation
    }
}

/// Context for tool tests; no credentials and no models
#[cfg(test)]
pub(crate) fn test_context() -> ToolContext {
    ToolContext::new(
        CancellationToken::new(),
        "test-session".to_string(),
        reqwest::Client::new(),
        Arc::new(ToolConfig::default()),
        Arc::new(ModelRegistry::new_empty()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn description(&self) -> String {
            "never finishes in time".to_string()
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn run(&self, _input: Value, _ctx: ToolContext) -> ToolOutput {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            ToolOutput::success("late")
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &'static str {
            "explode"
        }

        fn description(&self) -> String {
            "panics".to_string()
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn run(&self, _input: Value, _ctx: ToolContext) -> ToolOutput {
            panic!("boom")
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(vec![
            Arc::new(CalculatorTool),
            Arc::new(SlowTool),
            Arc::new(PanickingTool),
        ])
    }

    #[test]
    fn test_standard_registry_names() {
        let names: Vec<_> = ToolRegistry::standard()
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        for expected in [
            "create_multicity_route",
            "generate_itinerary",
            "weather_info",
            "search_place",
            "calculator",
            "currency_converter",
            "flight_search",
            "hotel_search",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_observation_from_output() {
        let ok = Observation::from_output("a", ToolOutput::success("Result: 4"));
        assert_eq!(ok.content, "Result: 4");
        assert!(!ok.is_error);

        let plain = Observation::from_output("b", ToolOutput::error("no key"));
        assert_eq!(plain.content, r#"{"error":"no key"}"#);
        assert!(plain.is_error);

        let listed = Observation::from_output("c", ToolOutput::error_list("nothing found"));
        assert_eq!(listed.content, r#"[{"error":"nothing found"}]"#);
        assert!(listed.is_error);
    }

    #[test]
    fn test_invalid_update_observation_has_path() {
        let err = ValidationError::new("route[0].city", "must not be empty");
        let obs = Observation::invalid_update("u1", &err);
        let value: Value = serde_json::from_str(&obs.content).unwrap();
        assert_eq!(value["path"], "route[0].city");
        assert_eq!(value["error"], "must not be empty");
    }

    #[tokio::test]
    async fn test_dispatch_runs_tool() {
        let obs = registry()
            .dispatch(
                "t1",
                "calculator",
                json!({"expression": "2 + 2"}),
                test_context(),
                DEFAULT_TOOL_TIMEOUT,
            )
            .await;
        assert_eq!(obs, Observation::success("t1", "Result: 4"));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let obs = registry()
            .dispatch("t1", "teleport", json!({}), test_context(), DEFAULT_TOOL_TIMEOUT)
            .await;
        assert!(obs.is_error);
        assert!(obs.content.contains("unknown tool 'teleport'"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_timeout() {
        let obs = registry()
            .dispatch("t1", "slow", json!({}), test_context(), Duration::from_secs(5))
            .await;
        assert_eq!(
            obs,
            Observation::error("t1", "tool 'slow' timed out after 5s")
        );
    }

    #[tokio::test]
    async fn test_dispatch_cancelled() {
        let ctx = test_context();
        ctx.cancel.cancel();
        let obs = registry()
            .dispatch("t1", "slow", json!({}), ctx, DEFAULT_TOOL_TIMEOUT)
            .await;
        assert_eq!(obs, Observation::error("t1", "cancelled"));
    }

    #[tokio::test]
    async fn test_dispatch_survives_panic() {
        let obs = registry()
            .dispatch("t1", "explode", json!({}), test_context(), DEFAULT_TOOL_TIMEOUT)
            .await;
        assert!(obs.is_error);
        assert!(obs.content.contains("explode"));
    }
}
