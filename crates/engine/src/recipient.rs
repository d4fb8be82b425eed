//! Recipient resolver — turns a receiver id into a normalized token set.
//!
//! Stored user records come in two shapes: a `fcmTokens` collection or a
//! single legacy `fcmToken`. Both normalize to the same `TokenSet`, so callers
//! never need to know which shape a record uses.

use std::sync::Arc;

use chatping_common::error::LookupError;
use chatping_common::types::{TokenSet, UserRecord};

use crate::directory::DirectoryStore;

/// Resolves the device tokens of a message recipient.
#[derive(Clone)]
pub struct RecipientResolver {
    directory: Arc<dyn DirectoryStore>,
}

impl RecipientResolver {
    pub fn new(directory: Arc<dyn DirectoryStore>) -> Self {
        Self { directory }
    }

    /// Look up `receiver_id` and return its non-empty token set.
    pub async fn resolve(&self, receiver_id: &str) -> Result<TokenSet, LookupError> {
        let record = match self.directory.get_user(receiver_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!(receiver_id, "Recipient record not found");
                return Err(LookupError::NotFound(receiver_id.to_string()));
            }
            Err(e) => {
                tracing::warn!(receiver_id, error = %e, "Recipient lookup failed");
                return Err(e.into());
            }
        };

        let tokens = Self::normalize_tokens(&record);
        if tokens.is_empty() {
            tracing::warn!(receiver_id, "Recipient has no device tokens");
            return Err(LookupError::EmptyTokenSet(receiver_id.to_string()));
        }

        tracing::info!(
            receiver_id,
            token_count = tokens.len(),
            "Resolved recipient tokens"
        );
        Ok(tokens)
    }

    /// Collection field first; the legacy single token only when the
    /// collection is absent or holds no usable entries.
    pub fn normalize_tokens(record: &UserRecord) -> TokenSet {
        let collection: TokenSet = record
            .fcm_tokens
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        if !collection.is_empty() {
            return collection;
        }

        record.fcm_token.iter().map(String::as_str).collect()
    }
}
