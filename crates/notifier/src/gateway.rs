//! Push gateway contract.
//!
//! A gateway accepts a notification payload and one or more device tokens and
//! reports a per-token result. Only request-level failures (gateway
//! unreachable, credentials refused) surface as `DispatchError`; a token the
//! gateway refuses comes back as a failed `DispatchResult`.

use async_trait::async_trait;

use chatping_common::error::DispatchError;
use chatping_common::types::{DispatchResult, NotificationPayload};

/// Trait that every push delivery backend must implement.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Human-readable backend name (e.g., "FCM v1").
    fn name(&self) -> &'static str;

    /// Deliver `payload` to a single device token.
    async fn send_one(
        &self,
        token: &str,
        payload: &NotificationPayload,
    ) -> Result<DispatchResult, DispatchError>;

    /// Deliver `payload` to every token in `tokens`.
    ///
    /// Returns exactly one result per token, in input order.
    async fn send_many(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<Vec<DispatchResult>, DispatchError>;
}
