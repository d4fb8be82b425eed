//! Outcome reporter — logs the result of one pipeline invocation.
//!
//! Reporting is a side effect only. It never returns an error; if the report
//! cannot be serialized the final line is still logged, without the rendered
//! report.

use serde::Serialize;

use chatping_common::error::PipelineError;
use chatping_common::types::{DispatchOutcome, redact_token};

/// One rejected token in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedToken {
    /// Redacted token identity.
    pub token: String,
    pub error_kind: String,
    pub message: String,
}

/// Pipeline-level failure in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSummary {
    pub stage: &'static str,
    pub kind: &'static str,
    pub message: String,
}

/// Structured summary of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeReport {
    pub status: &'static str,
    pub success_count: usize,
    pub failure_count: usize,
    pub failed_tokens: Vec<FailedToken>,
    pub error: Option<FailureSummary>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeReporter;

impl OutcomeReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn summarize(result: &Result<DispatchOutcome, PipelineError>) -> OutcomeReport {
        match result {
            Ok(outcome) => OutcomeReport {
                status: if outcome.failure_count == 0 {
                    "delivered"
                } else if outcome.success_count == 0 {
                    "undelivered"
                } else {
                    "partially_delivered"
                },
                success_count: outcome.success_count,
                failure_count: outcome.failure_count,
                failed_tokens: outcome
                    .failures()
                    .map(|r| FailedToken {
                        token: redact_token(&r.token),
                        error_kind: r
                            .error
                            .as_ref()
                            .map(|e| e.kind.to_string())
                            .unwrap_or_else(|| "unknown".to_string()),
                        message: r
                            .error
                            .as_ref()
                            .map(|e| e.message.clone())
                            .unwrap_or_default(),
                    })
                    .collect(),
                error: None,
            },
            Err(err) => OutcomeReport {
                status: "failed",
                success_count: 0,
                failure_count: 0,
                failed_tokens: Vec::new(),
                error: Some(FailureSummary {
                    stage: err.stage(),
                    kind: err.kind(),
                    message: err.to_string(),
                }),
            },
        }
    }

    /// Emit the report for `result`.
    pub fn record(&self, result: &Result<DispatchOutcome, PipelineError>) {
        let report = Self::summarize(result);

        for failed in &report.failed_tokens {
            tracing::warn!(
                token = %failed.token,
                error_kind = %failed.error_kind,
                error = %failed.message,
                "Notification not delivered to token"
            );
        }

        let rendered = serde_json::to_string(&report)
            .inspect_err(|e| tracing::warn!(error = %e, "Failed to serialize outcome report"))
            .ok();

        Self::emit(&report, rendered.as_deref());
    }

    /// Final log line for a report; `rendered` is omitted when serialization failed.
    fn emit(report: &OutcomeReport, rendered: Option<&str>) {
        match &report.error {
            None => tracing::info!(
                status = report.status,
                success_count = report.success_count,
                failure_count = report.failure_count,
                report = rendered,
                "Notification dispatch finished"
            ),
            Some(failure) => tracing::error!(
                stage = failure.stage,
                error_kind = failure.kind,
                error = %failure.message,
                report = rendered,
                "Notification pipeline failed"
            ),
        }
    }
}
