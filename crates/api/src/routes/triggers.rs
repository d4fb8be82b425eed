//! Document-creation trigger route.
//!
//! The request body is the created message document. It is parsed leniently:
//! an empty or malformed body reaches the pipeline as a missing document and
//! is rejected there, so validation stays in one place.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use chatping_common::types::RawMessageEvent;
use chatping_engine::reporter::OutcomeReporter;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/triggers/chats/{chat_id}/messages/{message_id}",
        post(message_created),
    )
}

/// POST /triggers/chats/{chat_id}/messages/{message_id} — run the pipeline for one message.
///
/// Always answers 200; the body tells the caller what happened.
async fn message_created(
    State(state): State<AppState>,
    Path((chat_id, message_id)): Path<(String, String)>,
    body: Bytes,
) -> Json<Value> {
    let document = serde_json::from_slice::<Value>(&body).ok();
    let raw = RawMessageEvent {
        chat_id,
        message_id,
        document,
    };

    let result = state.pipeline.run(&raw).await;
    let response = match &result {
        Ok(outcome) => json!({
            "status": OutcomeReporter::summarize(&result).status,
            "successCount": outcome.success_count,
            "failureCount": outcome.failure_count,
        }),
        Err(err) => {
            // Dispatch failures happened after validation; anything earlier is a skip.
            let status = if err.stage() == "dispatch" { "failed" } else { "skipped" };
            json!({
                "status": status,
                "stage": err.stage(),
                "error": err.kind(),
                "message": err.to_string(),
            })
        }
    };

    Json(response)
}
