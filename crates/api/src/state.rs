//! Shared application state for the trigger adapter.

use std::sync::Arc;

use chatping_engine::NotificationPipeline;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<NotificationPipeline>,
}

impl AppState {
    pub fn new(pipeline: NotificationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}
