//! End-to-end pipeline tests against an in-memory directory and a recording gateway.

use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use chatping_common::error::{DispatchError, LookupError, PipelineError, ValidationError};
use chatping_common::types::{
    DispatchResult, NotificationPayload, RawMessageEvent, TokenErrorKind, UserRecord,
};
use chatping_engine::reporter::OutcomeReporter;
use chatping_engine::{MemoryDirectory, NotificationPipeline, PipelineSettings};
use chatping_notifier::PushGateway;

// ============================================================
// Shared helpers
// ============================================================

#[derive(Debug, Clone, PartialEq)]
enum GatewayCall {
    One(String, NotificationPayload),
    Many(Vec<String>, NotificationPayload),
}

/// Records every call; tokens listed in `rejected` come back as unregistered.
#[derive(Default)]
struct FakeGateway {
    rejected: Vec<String>,
    fatal: Option<DispatchError>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl FakeGateway {
    fn rejecting(tokens: &[&str]) -> Self {
        Self {
            rejected: tokens.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    fn result_for(&self, token: &str) -> DispatchResult {
        if self.rejected.iter().any(|t| t == token) {
            DispatchResult::failed(token, TokenErrorKind::Unregistered, "Requested entity was not found.")
        } else {
            DispatchResult::delivered(token)
        }
    }
}

#[async_trait]
impl PushGateway for FakeGateway {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn send_one(
        &self,
        token: &str,
        payload: &NotificationPayload,
    ) -> Result<DispatchResult, DispatchError> {
        self.calls
            .lock()
            .unwrap()
            .push(GatewayCall::One(token.to_string(), payload.clone()));
        if let Some(err) = &self.fatal {
            return Err(err.clone());
        }
        Ok(self.result_for(token))
    }

    async fn send_many(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<Vec<DispatchResult>, DispatchError> {
        self.calls
            .lock()
            .unwrap()
            .push(GatewayCall::Many(tokens.to_vec(), payload.clone()));
        if let Some(err) = &self.fatal {
            return Err(err.clone());
        }
        Ok(tokens.iter().map(|t| self.result_for(t)).collect())
    }
}

fn user(id: &str, name: Option<&str>, token: Option<&str>, tokens: Option<&[&str]>) -> UserRecord {
    UserRecord {
        user_id: id.to_string(),
        display_name: name.map(str::to_string),
        first_name: None,
        fcm_token: token.map(str::to_string),
        fcm_tokens: tokens.map(|t| t.iter().map(|s| s.to_string()).collect()),
    }
}

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn event(document: serde_json::Value) -> RawMessageEvent {
    RawMessageEvent {
        chat_id: "chat-42".to_string(),
        message_id: "msg-7".to_string(),
        document: Some(document),
    }
}

fn pipeline(directory: MemoryDirectory, gateway: Arc<FakeGateway>) -> NotificationPipeline {
    NotificationPipeline::new(Arc::new(directory), gateway, PipelineSettings::default())
}

fn standard_directory() -> MemoryDirectory {
    MemoryDirectory::new()
        .with_user(user("u1", Some("Alice"), None, None))
        .with_user(user("u2", Some("Bob"), None, Some(&["tokA", "tokB"][..])))
}

// ============================================================
// Scenarios
// ============================================================

#[tokio::test]
async fn test_scenario_a_multi_token_delivery() {
    let gateway = Arc::new(FakeGateway::default());
    let outcome = pipeline(standard_directory(), gateway.clone())
        .handle(&event(json!({"senderId": "u1", "receiverId": "u2", "body": "hi"})))
        .await
        .unwrap();

    let calls = gateway.calls();
    assert_eq!(calls.len(), 1);
    let GatewayCall::Many(tokens, payload) = &calls[0] else {
        panic!("expected a multi-token send, got {:?}", calls[0]);
    };
    assert_eq!(tokens, &vec!["tokA".to_string(), "tokB".to_string()]);
    assert_eq!(payload.title, "New Message from Alice");
    assert_eq!(payload.body, "hi");
    assert_eq!(payload.data["chatId"], "chat-42");
    assert_eq!(payload.data["type"], "chat");
    assert_eq!(payload.data["senderId"], "u1");
    assert_eq!(payload.data["receiverId"], "u2");
    assert_eq!(payload.android.sound, "notification");
    assert_eq!(payload.apns.sound, "notification.mp3");

    assert_eq!(outcome.success_count, 2);
    assert_eq!(outcome.failure_count, 0);
}

#[tokio::test]
async fn test_scenario_b_missing_receiver_stops_at_parse() {
    let gateway = Arc::new(FakeGateway::default());
    let err = pipeline(standard_directory(), gateway.clone())
        .run(&event(json!({"senderId": "u1", "body": "hi"})))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PipelineError::Validation(ValidationError::MissingField("receiverId"))
    );
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_scenario_c_recipient_without_tokens_stops_before_dispatch() {
    let directory = MemoryDirectory::new()
        .with_user(user("u1", Some("Alice"), None, None))
        .with_user(user("u2", Some("Bob"), None, Some(&[][..])));
    let gateway = Arc::new(FakeGateway::default());

    let err = pipeline(directory, gateway.clone())
        .run(&event(json!({"senderId": "u1", "receiverId": "u2"})))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PipelineError::Lookup(LookupError::EmptyTokenSet("u2".to_string()))
    );
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_scenario_d_partial_failure_is_reported_not_raised() {
    let gateway = Arc::new(FakeGateway::rejecting(&["tokB"]));
    let result = pipeline(standard_directory(), gateway.clone())
        .run(&event(json!({"senderId": "u1", "receiverId": "u2", "body": "hi"})))
        .await;

    let outcome = result.clone().unwrap();
    assert_eq!(outcome.success_count, 1);
    assert_eq!(outcome.failure_count, 1);

    let report = OutcomeReporter::summarize(&result);
    assert_eq!(report.status, "partially_delivered");
    assert_eq!(report.failed_tokens.len(), 1);
    assert_eq!(report.failed_tokens[0].token, "tokB");
    assert_eq!(report.failed_tokens[0].error_kind, "unregistered");
}

#[tokio::test]
async fn test_scenario_d_failed_token_is_logged() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let gateway = Arc::new(FakeGateway::rejecting(&["tokB"]));
    pipeline(standard_directory(), gateway)
        .run(&event(json!({"senderId": "u1", "receiverId": "u2", "body": "hi"})))
        .await
        .unwrap();

    let output = logs.contents();
    let line = output
        .lines()
        .find(|line| line.contains("Notification not delivered to token"))
        .unwrap_or_else(|| panic!("no per-token failure logged:\n{output}"));
    assert!(line.contains("tokB"));
    assert!(line.contains("unregistered"));
    assert!(output.contains("partially_delivered"));
}

// ============================================================
// Other pipeline properties
// ============================================================

#[tokio::test]
async fn test_single_legacy_token_uses_single_send() {
    let directory = MemoryDirectory::new().with_user(user("u2", None, Some("legacyTok"), None));
    let gateway = Arc::new(FakeGateway::default());

    let outcome = pipeline(directory, gateway.clone())
        .handle(&event(json!({"senderId": "u1", "receiverId": "u2"})))
        .await
        .unwrap();

    let calls = gateway.calls();
    let [GatewayCall::One(token, payload)] = calls.as_slice() else {
        panic!("expected one single-token send, got {calls:?}");
    };
    assert_eq!(token, "legacyTok");
    // No sender record: the title falls back to the sender id.
    assert_eq!(payload.title, "New Message from u1");
    assert_eq!(payload.body, "You have a new message");
    assert_eq!(outcome.success_count, 1);
}

#[tokio::test]
async fn test_unknown_recipient_is_not_found() {
    let gateway = Arc::new(FakeGateway::default());
    let err = pipeline(standard_directory(), gateway.clone())
        .handle(&event(json!({"senderId": "u1", "receiverId": "ghost"})))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PipelineError::Lookup(LookupError::NotFound("ghost".to_string()))
    );
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_fatal_gateway_failure_surfaces_as_dispatch_error() {
    let gateway = Arc::new(FakeGateway {
        fatal: Some(DispatchError::Transport("connection refused".to_string())),
        ..Default::default()
    });
    let err = pipeline(standard_directory(), gateway)
        .run(&event(json!({"senderId": "u1", "receiverId": "u2"})))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), "dispatch");
    assert_eq!(err.kind(), "transport");
}

#[tokio::test]
async fn test_self_notification_is_delivered() {
    let directory =
        MemoryDirectory::new().with_user(user("u1", Some("Alice"), Some("selfTok"), None));
    let gateway = Arc::new(FakeGateway::default());

    let outcome = pipeline(directory, gateway.clone())
        .handle(&event(json!({"senderId": "u1", "receiverId": "u1", "body": "note to self"})))
        .await
        .unwrap();

    assert_eq!(outcome.success_count, 1);
    assert_eq!(gateway.calls().len(), 1);
}

#[tokio::test]
async fn test_concurrent_invocations_share_one_pipeline() {
    let gateway = Arc::new(FakeGateway::default());
    let pipeline = Arc::new(pipeline(standard_directory(), gateway.clone()));

    let mut handles = Vec::new();
    for i in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            let raw = RawMessageEvent {
                chat_id: format!("chat-{i}"),
                message_id: format!("msg-{i}"),
                document: Some(json!({"senderId": "u1", "receiverId": "u2"})),
            };
            pipeline.run(&raw).await
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.success_count, 2);
    }
    assert_eq!(gateway.calls().len(), 8);
}
