//! HTTP trigger adapter for the chat notification pipeline.
//!
//! Maps a "message created under chats/{chatId}/messages/{messageId}"
//! callback onto `NotificationPipeline::run`. Every request is acknowledged
//! with 200 so the hosting platform never retries a non-transient failure.

pub mod routes;
pub mod state;
