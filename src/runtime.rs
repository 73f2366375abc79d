//! Session orchestration
//!
//! [`RuntimeManager`] serializes turns per session key and hands each turn to
//! a [`TurnRunner`]. Direct plan edits go through the same lock.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{TurnOutcome, TurnRunner};
pub use traits::*;

use crate::plan::{guard_update, merge, route, ActionCategory, Plan, UpdatePayload, ValidationError};
use crate::state_machine::state::{TurnContext, DEFAULT_MAX_STEPS};
use crate::state_machine::TransitionError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

/// Errors surfaced by the orchestrator
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("session {session_key} is busy or was modified concurrently")]
    SessionConflict { session_key: String },
    #[error("reasoning failed: {0}")]
    Reasoning(String),
    #[error("{0}")]
    Store(String),
    #[error("turn cancelled")]
    Cancelled,
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { session_key, .. } => {
                OrchestratorError::SessionConflict { session_key }
            }
            StoreError::Backend(message) => OrchestratorError::Store(message),
        }
    }
}

/// Bounds applied to every turn
#[derive(Debug, Clone, Copy)]
pub struct TurnLimits {
    pub max_steps: u32,
    pub decision_timeout: Duration,
    /// How long a request waits for a busy session
    pub lock_wait: Duration,
}

impl Default for TurnLimits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            decision_timeout: Duration::from_secs(120),
            lock_wait: Duration::from_secs(30),
        }
    }
}

/// Runs turns and plan edits, one at a time per session
pub struct RuntimeManager {
    reasoner: Arc<dyn Reasoner>,
    store: Arc<dyn PlanStore>,
    tools: Arc<dyn ToolExecutor>,
    limits: TurnLimits,
    /// Per-session locks; the map lock is only held for lookup
    sessions: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RuntimeManager {
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        store: Arc<dyn PlanStore>,
        tools: Arc<dyn ToolExecutor>,
        limits: TurnLimits,
    ) -> Self {
        Self {
            reasoner,
            store,
            tools,
            limits,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_session(&self, session_key: &str) -> Result<OwnedMutexGuard<()>, OrchestratorError> {
        let lock = {
            let mut sessions = self.sessions.lock().await;
            Arc::clone(sessions.entry(session_key.to_string()).or_default())
        };

        tokio::time::timeout(self.limits.lock_wait, lock.lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(session = session_key, "Session busy");
                OrchestratorError::SessionConflict {
                    session_key: session_key.to_string(),
                }
            })
    }

    /// Handle one query end to end
    pub async fn run_turn(
        &self,
        session_key: &str,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, OrchestratorError> {
        let _guard = self.lock_session(session_key).await?;
        let plan = self.store.load(session_key).await?;

        TurnRunner::new(
            TurnContext::new(session_key, self.limits.max_steps),
            plan,
            Arc::clone(&self.reasoner),
            Arc::clone(&self.store),
            Arc::clone(&self.tools),
            self.limits.decision_timeout,
            cancel,
        )
        .run(query)
        .await
    }

    /// Current plan, created empty on first access
    pub async fn plan(&self, session_key: &str) -> Result<Plan, OrchestratorError> {
        Ok(self.store.load(session_key).await?)
    }

    /// Category of the next step for the stored plan
    pub async fn next_action(&self, session_key: &str) -> Result<ActionCategory, OrchestratorError> {
        Ok(route(&self.plan(session_key).await?))
    }

    /// Merge an update outside of a turn
    pub async fn apply_update(
        &self,
        session_key: &str,
        payload: &UpdatePayload,
    ) -> Result<Plan, OrchestratorError> {
        let _guard = self.lock_session(session_key).await?;
        let plan = self.store.load(session_key).await?;

        guard_update(&plan, payload)?;
        let mut merged = merge(&plan, payload)?;
        if merged != plan {
            merged.version = self.store.save(session_key, &merged).await?;
            tracing::info!(session = session_key, version = merged.version, "Plan updated directly");
        }
        Ok(merged)
    }
}
