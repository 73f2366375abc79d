//! HTTP request handlers

use super::types::{ErrorResponse, QueryRequest, WelcomeResponse};
use super::AppState;
use crate::plan::{ActionCategory, Plan, UpdatePayload, ValidationError};
use crate::runtime::{OrchestratorError, TurnOutcome};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Longest error message returned to clients
const MAX_ERROR_CHARS: usize = 200;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/version", get(get_version))
        .route("/api/query", post(run_query))
        .route(
            "/api/sessions/:key/plan",
            get(get_plan).post(update_plan),
        )
        .route("/api/sessions/:key/next-action", get(next_action))
        .with_state(state)
}

// ============================================================
// Planning turns
// ============================================================

async fn run_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    let session_key = req.session_key.trim().to_string();
    if session_key.is_empty() {
        return Err(AppError::BadRequest("session_key is required".to_string()));
    }
    if req.query.trim().is_empty() {
        return Err(AppError::BadRequest("query is required".to_string()));
    }

    // Dropping this handler (client gone) cancels the turn
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let runtime = Arc::clone(&state.runtime);
    let turn = tokio::spawn(async move { runtime.run_turn(&session_key, &req.query, cancel).await });

    let outcome = turn
        .await
        .map_err(|e| AppError::Internal(format!("turn task failed: {e}")))??;
    Ok(Json(outcome))
}

// ============================================================
// Plans
// ============================================================

async fn get_plan(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Plan>, AppError> {
    Ok(Json(state.runtime.plan(&key).await?))
}

async fn next_action(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ActionCategory>, AppError> {
    Ok(Json(state.runtime.next_action(&key).await?))
}

async fn update_plan(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Plan>, AppError> {
    let payload = UpdatePayload::from_value(body)?;
    Ok(Json(state.runtime.apply_update(&key, &payload).await?))
}

// ============================================================
// Misc
// ============================================================

async fn welcome() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the Trip Planner API",
    })
}

async fn get_version() -> &'static str {
    concat!("trip-planner ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Invalid(ValidationError),
    Conflict(String),
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Invalid(err)
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Validation(e) => AppError::Invalid(e),
            e @ OrchestratorError::SessionConflict { .. } => AppError::Conflict(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg)),
            AppError::Invalid(e) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::at(e.message, e.path),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ErrorResponse::new(msg)),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                let short: String = msg.chars().take(MAX_ERROR_CHARS).collect();
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(short))
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::{InMemoryPlanStore, MockToolExecutor, ScriptedReasoner};
    use crate::runtime::{Decision, RuntimeManager, TurnLimits};
    use crate::state_machine::ToolCall;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    fn app(reasoner: ScriptedReasoner, store: Arc<InMemoryPlanStore>) -> Router {
        let runtime = RuntimeManager::new(
            Arc::new(reasoner),
            store,
            Arc::new(MockToolExecutor::new()),
            TurnLimits::default(),
        );
        create_router(AppState::new(runtime))
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_query_runs_turn() {
        let reasoner = ScriptedReasoner::new()
            .then(Decision::calls(vec![ToolCall::update(
                "u1",
                UpdatePayload::from_value(json!({"destination": "Europe"})).unwrap(),
            )]))
            .then(Decision::answer("Noted."));
        let store = Arc::new(InMemoryPlanStore::new());

        let (status, body) = send(
            app(reasoner, store.clone()),
            "POST",
            "/api/query",
            Some(json!({"query": "Europe please", "session_id": "abc"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Noted.");
        assert_eq!(body["plan"]["destination"], "Europe");
        assert!(body.get("note").is_none());
        assert_eq!(store.get("abc").unwrap().destination.as_deref(), Some("Europe"));
    }

    #[tokio::test]
    async fn test_query_requires_session_and_text() {
        let store = Arc::new(InMemoryPlanStore::new());
        let (status, body) = send(
            app(ScriptedReasoner::new(), store.clone()),
            "POST",
            "/api/query",
            Some(json!({"query": "hi", "session_key": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "session_key is required");

        let (status, _) = send(
            app(ScriptedReasoner::new(), store),
            "POST",
            "/api/query",
            Some(json!({"query": "", "session_key": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reasoning_failure_is_500() {
        let reasoner =
            ScriptedReasoner::new().then_fail(crate::llm::LlmError::auth("x".repeat(500)));
        let (status, body) = send(
            app(reasoner, Arc::new(InMemoryPlanStore::new())),
            "POST",
            "/api/query",
            Some(json!({"query": "hi", "session_key": "abc"})),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"].as_str().unwrap().chars().count(), MAX_ERROR_CHARS);
    }

    #[tokio::test]
    async fn test_get_plan_creates_empty() {
        let (status, body) = send(
            app(ScriptedReasoner::new(), Arc::new(InMemoryPlanStore::new())),
            "GET",
            "/api/sessions/new-trip/plan",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_key"], "new-trip");
        assert_eq!(body["route"], json!([]));
        assert_eq!(body["status"], "planning");
    }

    #[tokio::test]
    async fn test_update_plan_and_next_action() {
        let store = Arc::new(InMemoryPlanStore::new());
        let (status, body) = send(
            app(ScriptedReasoner::new(), store.clone()),
            "POST",
            "/api/sessions/trip/plan",
            Some(json!({"route": [{"city": "Rome", "country": "Italy", "num_days": 2}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["route"][0]["city"], "Rome");

        let (status, body) = send(
            app(ScriptedReasoner::new(), store),
            "GET",
            "/api/sessions/trip/next-action",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["category"], "plan_current_city");
        assert_eq!(body["step"], "generate_itinerary");
    }

    #[tokio::test]
    async fn test_malformed_update_reports_path() {
        let store = Arc::new(InMemoryPlanStore::new());
        let (status, body) = send(
            app(ScriptedReasoner::new(), store.clone()),
            "POST",
            "/api/sessions/trip/plan",
            Some(json!({"route": "Paris"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["path"], "route");
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_welcome_and_version() {
        let (status, body) = send(
            app(ScriptedReasoner::new(), Arc::new(InMemoryPlanStore::new())),
            "GET",
            "/",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Welcome to the Trip Planner API");

        let request = Request::builder().uri("/version").body(Body::empty()).unwrap();
        let response = app(ScriptedReasoner::new(), Arc::new(InMemoryPlanStore::new()))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
