//! Notification pipeline — reacts to one created chat message.
//!
//! 1. Parse and validate the trigger payload (`MessageEventParser`)
//! 2. Resolve recipient tokens and sender name concurrently
//! 3. Build the platform-aware payload (`PayloadBuilder`)
//! 4. Dispatch through the push gateway (`DispatchGateway`)
//! 5. Report the outcome (`OutcomeReporter`)
//!
//! A parse or recipient failure stops the pipeline before any gateway call.
//! The pipeline holds no mutable state; concurrent invocations share it freely.

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use chatping_common::config::AppConfig;
use chatping_common::error::PipelineError;
use chatping_common::types::{DispatchOutcome, RawMessageEvent};
use chatping_notifier::dispatch::{DEFAULT_DISPATCH_TIMEOUT, DispatchGateway};
use chatping_notifier::gateway::PushGateway;

use crate::directory::DirectoryStore;
use crate::parser::MessageEventParser;
use crate::payload::{DEFAULT_SOUND, PayloadBuilder};
use crate::recipient::RecipientResolver;
use crate::reporter::OutcomeReporter;
use crate::sender::SenderProfileResolver;

/// Tunables for a pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub dispatch_timeout: Duration,
    pub notification_sound: String,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            dispatch_timeout: config.dispatch_timeout(),
            notification_sound: config.notification_sound.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            notification_sound: DEFAULT_SOUND.to_string(),
        }
    }
}

/// Chat-message notification pipeline.
#[derive(Clone)]
pub struct NotificationPipeline {
    recipients: RecipientResolver,
    senders: SenderProfileResolver,
    payloads: PayloadBuilder,
    dispatcher: DispatchGateway,
    reporter: OutcomeReporter,
}

impl NotificationPipeline {
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        gateway: Arc<dyn PushGateway>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            recipients: RecipientResolver::new(Arc::clone(&directory)),
            senders: SenderProfileResolver::new(directory),
            payloads: PayloadBuilder::new(settings.notification_sound),
            dispatcher: DispatchGateway::new(gateway, settings.dispatch_timeout),
            reporter: OutcomeReporter::new(),
        }
    }

    /// Name of the push backend this pipeline delivers through.
    pub fn gateway_name(&self) -> &'static str {
        self.dispatcher.gateway_name()
    }

    /// Process one event and return its outcome or the failure that stopped it.
    ///
    /// Nothing is reported; use [`run`](Self::run) at the trigger boundary.
    pub async fn handle(&self, raw: &RawMessageEvent) -> Result<DispatchOutcome, PipelineError> {
        self.process(raw).instrument(invocation_span(raw)).await
    }

    /// Process and report one event.
    ///
    /// Every failure is logged here; the returned result is informational for
    /// the trigger adapter and is not meant to be propagated further.
    pub async fn run(&self, raw: &RawMessageEvent) -> Result<DispatchOutcome, PipelineError> {
        async {
            let result = self.process(raw).await;
            self.reporter.record(&result);
            result
        }
        .instrument(invocation_span(raw))
        .await
    }

    async fn process(&self, raw: &RawMessageEvent) -> Result<DispatchOutcome, PipelineError> {
        tracing::info!("Chat message notification triggered");

        let message = MessageEventParser::parse(raw).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected malformed message event");
        })?;

        tracing::info!(
            sender_id = %message.sender_id,
            receiver_id = %message.receiver_id,
            has_body = message.body.is_some(),
            "Parsed message event"
        );

        if message.sender_id == message.receiver_id {
            tracing::warn!(
                user_id = %message.sender_id,
                "Sender and receiver are the same user"
            );
        }

        let (tokens, sender_name) = tokio::join!(
            self.recipients.resolve(&message.receiver_id),
            self.senders.resolve(&message.sender_id),
        );
        let tokens = tokens?;

        let payload = self.payloads.build(&message, &sender_name);
        tracing::debug!(
            title = %payload.title,
            token_count = tokens.len(),
            "Built notification payload"
        );

        let outcome = self.dispatcher.send(&tokens, &payload).await?;
        Ok(outcome)
    }
}

fn invocation_span(raw: &RawMessageEvent) -> tracing::Span {
    tracing::info_span!(
        "chat_notification",
        invocation_id = %Uuid::new_v4(),
        chat_id = %raw.chat_id,
        message_id = %raw.message_id,
    )
}
