//! Sender profile resolver — best-effort display name lookup.
//!
//! Never fails: a missing record, a blank name, or a store fault all fall back
//! to the sender id so delivery is not blocked by incomplete metadata.

use std::sync::Arc;

use crate::directory::DirectoryStore;

/// Resolves the display name shown in the notification title.
#[derive(Clone)]
pub struct SenderProfileResolver {
    directory: Arc<dyn DirectoryStore>,
}

impl SenderProfileResolver {
    pub fn new(directory: Arc<dyn DirectoryStore>) -> Self {
        Self { directory }
    }

    pub async fn resolve(&self, sender_id: &str) -> String {
        let display_name = match self.directory.get_user(sender_id).await {
            Ok(record) => record.and_then(|r| r.preferred_name().map(str::to_string)),
            Err(e) => {
                tracing::warn!(sender_id, error = %e, "Sender lookup failed, using sender id");
                None
            }
        };

        match display_name {
            Some(name) => {
                tracing::debug!(sender_id, sender_name = %name, "Resolved sender name");
                name
            }
            None => {
                tracing::debug!(sender_id, "No sender display name, using sender id");
                sender_id.to_string()
            }
        }
    }
}
