//! Firebase Cloud Messaging (HTTP v1) gateway.
//!
//! FCM v1 has no batch endpoint, so multi-token delivery issues one
//! `messages:send` request per token concurrently and collects the results in
//! input order. The message body is rendered once and only the `token` field
//! differs between requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::task::JoinSet;

use chatping_common::error::DispatchError;
use chatping_common::types::{DispatchResult, NotificationPayload, TokenErrorKind};

use crate::gateway::PushGateway;

/// Failure of a single `messages:send` request.
#[derive(Debug, Error)]
enum FcmSendError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{kind}: {message}")]
    Token {
        kind: TokenErrorKind,
        message: String,
    },

    #[error("HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct FcmErrorResponse {
    error: FcmErrorBody,
}

#[derive(Debug, Deserialize)]
struct FcmErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<FcmErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct FcmErrorDetail {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

/// FCM HTTP v1 client.
#[derive(Clone)]
pub struct FcmGateway {
    http: reqwest::Client,
    send_url: String,
    access_token: String,
}

impl FcmGateway {
    /// Build a client for `project_id` against `endpoint`.
    ///
    /// `request_timeout` bounds each individual HTTP request; the caller's
    /// dispatch timeout still bounds the whole fan-out.
    pub fn new(
        endpoint: &str,
        project_id: &str,
        access_token: &str,
        request_timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| DispatchError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            send_url: format!(
                "{}/v1/projects/{}/messages:send",
                endpoint.trim_end_matches('/'),
                project_id.trim()
            ),
            access_token: access_token.trim().to_string(),
        })
    }

    /// Render the v1 `message` object for `payload`, without a target token.
    pub fn render_message(payload: &NotificationPayload) -> Value {
        json!({
            "notification": {
                "title": payload.title,
                "body": payload.body,
            },
            "data": payload.data,
            "android": {
                "notification": {
                    "sound": payload.android.sound,
                },
            },
            "apns": {
                "payload": {
                    "aps": {
                        "sound": payload.apns.sound,
                    },
                },
            },
        })
    }

    async fn post_message(&self, token: &str, message: &Value) -> Result<(), FcmSendError> {
        let mut message = message.clone();
        if let Some(obj) = message.as_object_mut() {
            obj.insert("token".to_string(), Value::String(token.to_string()));
        }

        let response = self
            .http
            .post(&self.send_url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "message": message }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_error(status.as_u16(), &body))
    }

    fn to_result(token: &str, sent: Result<(), FcmSendError>) -> SendAttempt {
        match sent {
            Ok(()) => SendAttempt::Result(DispatchResult::delivered(token)),
            Err(FcmSendError::Token { kind, message }) => {
                SendAttempt::Result(DispatchResult::failed(token, kind, message))
            }
            Err(FcmSendError::Transport(e)) => SendAttempt::Transport(DispatchResult::failed(
                token,
                TokenErrorKind::Transport,
                e.to_string(),
            )),
            Err(err @ FcmSendError::Rejected { .. }) => SendAttempt::Rejected(err.to_string()),
        }
    }
}

/// How one per-token request ended, before aggregation.
enum SendAttempt {
    Result(DispatchResult),
    Transport(DispatchResult),
    Rejected(String),
}

/// Map an FCM error response onto a per-token kind or a request-level rejection.
fn classify_error(status: u16, body: &str) -> FcmSendError {
    let parsed = serde_json::from_str::<FcmErrorResponse>(body).ok();
    let (message, google_status, error_code) = match parsed {
        Some(resp) => {
            let code = resp
                .error
                .details
                .into_iter()
                .find_map(|d| d.error_code);
            (resp.error.message, resp.error.status, code)
        }
        None => (body.trim().to_string(), String::new(), None),
    };

    if let Some(code) = error_code.as_deref() {
        let kind = match code {
            "UNREGISTERED" => TokenErrorKind::Unregistered,
            "INVALID_ARGUMENT" => TokenErrorKind::InvalidArgument,
            "SENDER_ID_MISMATCH" => TokenErrorKind::SenderIdMismatch,
            "QUOTA_EXCEEDED" => TokenErrorKind::QuotaExceeded,
            "UNAVAILABLE" => TokenErrorKind::Unavailable,
            "INTERNAL" => TokenErrorKind::Internal,
            "THIRD_PARTY_AUTH_ERROR" => TokenErrorKind::ThirdPartyAuth,
            _ => TokenErrorKind::Unknown,
        };
        return FcmSendError::Token { kind, message };
    }

    if status == 401 || status == 403 {
        return FcmSendError::Rejected { status, message };
    }

    let kind = match google_status.as_str() {
        "NOT_FOUND" => TokenErrorKind::Unregistered,
        "INVALID_ARGUMENT" => TokenErrorKind::InvalidArgument,
        "RESOURCE_EXHAUSTED" => TokenErrorKind::QuotaExceeded,
        "UNAVAILABLE" => TokenErrorKind::Unavailable,
        "INTERNAL" => TokenErrorKind::Internal,
        _ => match status {
            404 => TokenErrorKind::Unregistered,
            400 => TokenErrorKind::InvalidArgument,
            429 => TokenErrorKind::QuotaExceeded,
            503 => TokenErrorKind::Unavailable,
            500 => TokenErrorKind::Internal,
            _ => TokenErrorKind::Unknown,
        },
    };
    FcmSendError::Token { kind, message }
}

#[async_trait]
impl PushGateway for FcmGateway {
    fn name(&self) -> &'static str {
        "FCM v1"
    }

    async fn send_one(
        &self,
        token: &str,
        payload: &NotificationPayload,
    ) -> Result<DispatchResult, DispatchError> {
        let message = Self::render_message(payload);
        match Self::to_result(token, self.post_message(token, &message).await) {
            SendAttempt::Result(result) => Ok(result),
            SendAttempt::Transport(result) => Err(DispatchError::Transport(
                result.error.map(|e| e.message).unwrap_or_default(),
            )),
            SendAttempt::Rejected(message) => Err(DispatchError::Rejected(message)),
        }
    }

    async fn send_many(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<Vec<DispatchResult>, DispatchError> {
        let message = Arc::new(Self::render_message(payload));

        let attempts = fan_out(tokens, |token| {
            let gateway = self.clone();
            let message = Arc::clone(&message);
            async move {
                let sent = gateway.post_message(&token, &message).await;
                Self::to_result(&token, sent)
            }
        })
        .await;

        let mut results = Vec::with_capacity(tokens.len());
        let mut transport_failures = 0usize;
        let mut rejection = None;

        for (token, attempt) in tokens.iter().zip(attempts) {
            match attempt {
                Some(SendAttempt::Result(result)) => results.push(result),
                Some(SendAttempt::Transport(result)) => {
                    transport_failures += 1;
                    results.push(result);
                }
                Some(SendAttempt::Rejected(message)) => {
                    rejection.get_or_insert(message);
                }
                None => results.push(DispatchResult::failed(
                    token.as_str(),
                    TokenErrorKind::Internal,
                    "send task did not complete",
                )),
            }
        }

        if let Some(message) = rejection {
            return Err(DispatchError::Rejected(message));
        }

        if !tokens.is_empty() && transport_failures == tokens.len() {
            let detail = results
                .first()
                .and_then(|r| r.error.as_ref())
                .map(|e| e.message.clone())
                .unwrap_or_default();
            return Err(DispatchError::Transport(detail));
        }

        Ok(results)
    }
}

/// Run one send per token concurrently, returning outputs in token order.
///
/// The tasks live in a `JoinSet`, so dropping the returned future (for example
/// when the dispatch timeout fires) aborts every send still in flight. A slot
/// is `None` when its task panicked.
async fn fan_out<T, F, Fut>(tokens: &[String], send: F) -> Vec<Option<T>>
where
    T: Send + 'static,
    F: Fn(String) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for (index, token) in tokens.iter().enumerate() {
        let sending = send(token.clone());
        tasks.spawn(async move { (index, sending.await) });
    }

    let mut slots: Vec<Option<T>> = tokens.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, output)) => slots[index] = Some(output),
            Err(e) => tracing::warn!(error = %e, "FCM send task failed"),
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chatping_common::types::{AndroidConfig, ApnsConfig};
    use httpmock::Method::POST;
    use httpmock::MockServer;

    use super::*;

    const SEND_PATH: &str = "/v1/projects/demo-project/messages:send";

    fn payload() -> NotificationPayload {
        let mut data = BTreeMap::new();
        data.insert("chatId".to_string(), "c1".to_string());
        data.insert("type".to_string(), "chat".to_string());
        NotificationPayload {
            title: "New Message from Alice".to_string(),
            body: "hi".to_string(),
            data,
            android: AndroidConfig {
                sound: "notification".to_string(),
            },
            apns: ApnsConfig {
                sound: "notification.mp3".to_string(),
            },
        }
    }

    fn gateway(base_url: &str) -> FcmGateway {
        FcmGateway::new(base_url, "demo-project", "test-token", Duration::from_secs(5)).unwrap()
    }

    fn unregistered_body() -> Value {
        json!({
            "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": "NOT_FOUND",
                "details": [{
                    "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                    "errorCode": "UNREGISTERED"
                }]
            }
        })
    }

    #[test]
    fn test_render_message_carries_both_platform_sounds() {
        let message = FcmGateway::render_message(&payload());
        assert_eq!(message["notification"]["title"], "New Message from Alice");
        assert_eq!(message["android"]["notification"]["sound"], "notification");
        assert_eq!(message["apns"]["payload"]["aps"]["sound"], "notification.mp3");
        assert_eq!(message["data"]["type"], "chat");
        assert!(message.get("token").is_none());
    }

    #[test]
    fn test_classify_error_prefers_fcm_error_code() {
        let err = classify_error(404, &unregistered_body().to_string());
        assert!(matches!(
            err,
            FcmSendError::Token {
                kind: TokenErrorKind::Unregistered,
                ..
            }
        ));
    }

    #[test]
    fn test_classify_error_auth_failure_is_rejected() {
        let body = json!({"error": {"code": 401, "message": "bad creds", "status": "UNAUTHENTICATED"}});
        let err = classify_error(401, &body.to_string());
        assert!(matches!(err, FcmSendError::Rejected { status: 401, .. }));
    }

    #[test]
    fn test_classify_error_unparsable_body_uses_http_status() {
        let err = classify_error(429, "slow down");
        assert!(matches!(
            err,
            FcmSendError::Token {
                kind: TokenErrorKind::QuotaExceeded,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_send_one_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(SEND_PATH)
                .header("authorization", "Bearer test-token")
                .body_includes("\"token\":\"tokA\"")
                .body_includes("\"sound\":\"notification.mp3\"");
            then.status(200)
                .json_body(json!({"name": "projects/demo-project/messages/1"}));
        });

        let result = gateway(&server.base_url())
            .send_one("tokA", &payload())
            .await
            .unwrap();

        mock.assert_calls(1);
        assert!(result.success);
        assert_eq!(result.token, "tokA");
    }

    #[tokio::test]
    async fn test_send_many_mixed_results_in_input_order() {
        let server = MockServer::start();
        let ok = server.mock(|when, then| {
            when.method(POST)
                .path(SEND_PATH)
                .body_includes("\"token\":\"tokA\"");
            then.status(200)
                .json_body(json!({"name": "projects/demo-project/messages/1"}));
        });
        let gone = server.mock(|when, then| {
            when.method(POST)
                .path(SEND_PATH)
                .body_includes("\"token\":\"tokB\"");
            then.status(404).json_body(unregistered_body());
        });

        let tokens = vec!["tokA".to_string(), "tokB".to_string()];
        let results = gateway(&server.base_url())
            .send_many(&tokens, &payload())
            .await
            .unwrap();

        ok.assert_calls(1);
        gone.assert_calls(1);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].token, "tokA");
        assert!(results[0].success);
        assert_eq!(results[1].token, "tokB");
        assert!(!results[1].success);
        assert_eq!(
            results[1].error.as_ref().map(|e| e.kind),
            Some(TokenErrorKind::Unregistered)
        );
    }

    #[tokio::test]
    async fn test_send_many_auth_failure_is_fatal() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(SEND_PATH);
            then.status(401).json_body(json!({
                "error": {"code": 401, "message": "Request had invalid authentication credentials.", "status": "UNAUTHENTICATED"}
            }));
        });

        let tokens = vec!["tokA".to_string(), "tokB".to_string()];
        let err = gateway(&server.base_url())
            .send_many(&tokens, &payload())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transport_error() {
        // Nothing listens on port 9 (discard) in the test environment.
        let gw = gateway("http://127.0.0.1:9");

        let single = gw.send_one("tokA", &payload()).await.unwrap_err();
        assert!(matches!(single, DispatchError::Transport(_)));

        let tokens = vec!["tokA".to_string(), "tokB".to_string()];
        let many = gw.send_many(&tokens, &payload()).await.unwrap_err();
        assert!(matches!(many, DispatchError::Transport(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_keeps_token_order() {
        let tokens = vec!["slow".to_string(), "fast".to_string()];
        let outputs = fan_out(&tokens, |token| async move {
            let delay = if token == "slow" { 200 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            token
        })
        .await;

        assert_eq!(
            outputs,
            vec![Some("slow".to_string()), Some("fast".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_aborts_pending_sends_on_timeout() {
        let finished = Arc::new(AtomicUsize::new(0));
        let tokens = vec!["tokA".to_string(), "tokB".to_string()];

        let pending = fan_out(&tokens, |_token| {
            let finished = Arc::clone(&finished);
            async move {
                tokio::time::sleep(Duration::from_millis(600)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            }
        });
        let outcome = tokio::time::timeout(Duration::from_millis(100), pending).await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
