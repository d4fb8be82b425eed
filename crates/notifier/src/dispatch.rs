//! Dispatch gateway — sends a payload to a recipient's token set.
//!
//! Branches on token-set cardinality: exactly one token goes through
//! `PushGateway::send_one`, more than one through `send_many`. Both paths
//! yield the same `DispatchOutcome` shape. The gateway call is wrapped in a
//! timeout so a hung network call cannot stall the invocation.
//!
//! Lifecycle per call: `Idle → Sending → Completed | Failed`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use chatping_common::error::DispatchError;
use chatping_common::types::{
    DispatchOutcome, DispatchResult, NotificationPayload, TokenErrorKind, TokenSet, redact_token,
};

use crate::gateway::PushGateway;

/// Default bound on one gateway call (10 seconds).
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// State of one dispatch attempt. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DispatchState {
    #[default]
    Idle,
    Sending,
    Completed(DispatchOutcome),
    Failed(DispatchError),
}

/// A transition the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Illegal dispatch transition: {from} -> {to}")]
pub struct IllegalTransition {
    pub from: &'static str,
    pub to: &'static str,
}

impl DispatchState {
    pub fn name(&self) -> &'static str {
        match self {
            DispatchState::Idle => "idle",
            DispatchState::Sending => "sending",
            DispatchState::Completed(_) => "completed",
            DispatchState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchState::Completed(_) | DispatchState::Failed(_))
    }

    /// `Idle → Sending`.
    pub fn start(&mut self) -> Result<(), IllegalTransition> {
        match self {
            DispatchState::Idle => {
                *self = DispatchState::Sending;
                Ok(())
            }
            other => Err(IllegalTransition {
                from: other.name(),
                to: "sending",
            }),
        }
    }

    /// `Sending → Completed`.
    pub fn complete(&mut self, outcome: DispatchOutcome) -> Result<(), IllegalTransition> {
        match self {
            DispatchState::Sending => {
                *self = DispatchState::Completed(outcome);
                Ok(())
            }
            other => Err(IllegalTransition {
                from: other.name(),
                to: "completed",
            }),
        }
    }

    /// `Sending → Failed`.
    pub fn fail(&mut self, error: DispatchError) -> Result<(), IllegalTransition> {
        match self {
            DispatchState::Sending => {
                *self = DispatchState::Failed(error);
                Ok(())
            }
            other => Err(IllegalTransition {
                from: other.name(),
                to: "failed",
            }),
        }
    }

    /// Final result of a terminal state; `None` while the attempt is still open.
    pub fn into_result(self) -> Option<Result<DispatchOutcome, DispatchError>> {
        match self {
            DispatchState::Completed(outcome) => Some(Ok(outcome)),
            DispatchState::Failed(error) => Some(Err(error)),
            DispatchState::Idle | DispatchState::Sending => None,
        }
    }
}

/// Sends payloads through a `PushGateway` with a bounded wait.
#[derive(Clone)]
pub struct DispatchGateway {
    gateway: Arc<dyn PushGateway>,
    timeout: Duration,
}

impl DispatchGateway {
    pub fn new(gateway: Arc<dyn PushGateway>, timeout: Duration) -> Self {
        Self { gateway, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn gateway_name(&self) -> &'static str {
        self.gateway.name()
    }

    /// Send `payload` to every token in `tokens`.
    ///
    /// Per-token rejections land in the outcome; only a fatal gateway failure
    /// or the timeout produce `Err`. An empty set returns an empty outcome
    /// without touching the gateway.
    pub async fn send(
        &self,
        tokens: &TokenSet,
        payload: &NotificationPayload,
    ) -> Result<DispatchOutcome, DispatchError> {
        if tokens.is_empty() {
            tracing::debug!("Dispatch skipped — empty token set");
            return Ok(DispatchOutcome::default());
        }

        self.send_tracked(tokens, payload)
            .await
            .into_result()
            .unwrap_or_else(|| {
                Err(DispatchError::Transport(
                    "dispatch did not reach a terminal state".to_string(),
                ))
            })
    }

    /// Run one attempt through the state machine and return its final state.
    pub async fn send_tracked(
        &self,
        tokens: &TokenSet,
        payload: &NotificationPayload,
    ) -> DispatchState {
        let mut state = DispatchState::default();
        if let Err(e) = state.start() {
            tracing::error!(error = %e, "Dispatch state machine rejected start");
            return state;
        }

        let mode = if tokens.single().is_some() { "single" } else { "multi" };
        tracing::info!(
            gateway = self.gateway.name(),
            mode,
            token_count = tokens.len(),
            timeout_ms = self.timeout.as_millis() as u64,
            "Dispatch started"
        );

        let sent = tokio::time::timeout(self.timeout, self.call_gateway(tokens, payload)).await;
        let result = match sent {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout(self.timeout)),
        };

        let transition = match result {
            Ok(outcome) => {
                tracing::info!(
                    success_count = outcome.success_count,
                    failure_count = outcome.failure_count,
                    "Dispatch completed"
                );
                state.complete(outcome)
            }
            Err(error) => {
                tracing::error!(error = %error, "Dispatch failed");
                state.fail(error)
            }
        };
        if let Err(e) = transition {
            tracing::error!(error = %e, "Dispatch state machine rejected transition");
        }

        state
    }

    async fn call_gateway(
        &self,
        tokens: &TokenSet,
        payload: &NotificationPayload,
    ) -> Result<DispatchOutcome, DispatchError> {
        let results = match tokens.single() {
            Some(token) => vec![self.gateway.send_one(token, payload).await?],
            None => {
                let tokens = tokens.to_vec();
                let results = self.gateway.send_many(&tokens, payload).await?;
                align_results(&tokens, results)
            }
        };

        for failed in results.iter().filter(|r| !r.success) {
            tracing::warn!(
                token = %redact_token(&failed.token),
                error_kind = %failed
                    .error
                    .as_ref()
                    .map(|e| e.kind.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                "Token rejected by push gateway"
            );
        }

        Ok(DispatchOutcome::from_results(results))
    }
}

/// Match gateway results to `tokens`, one per token in token order.
///
/// A token the gateway returned nothing for is recorded as an `Unknown`
/// failure; results for tokens that were never sent are discarded.
fn align_results(tokens: &[String], results: Vec<DispatchResult>) -> Vec<DispatchResult> {
    if results.len() != tokens.len() {
        tracing::warn!(
            expected = tokens.len(),
            received = results.len(),
            "Gateway returned a result count that does not match the token count"
        );
    }

    let mut by_token: HashMap<String, DispatchResult> = results
        .into_iter()
        .map(|result| (result.token.clone(), result))
        .collect();

    tokens
        .iter()
        .map(|token| {
            by_token.remove(token).unwrap_or_else(|| {
                DispatchResult::failed(
                    token.as_str(),
                    TokenErrorKind::Unknown,
                    "push gateway returned no result for token",
                )
            })
        })
        .collect()
}
