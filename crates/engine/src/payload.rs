//! Payload builder — composes the platform-aware notification.
//!
//! Both platform sound directives are always emitted: Android takes a bare
//! resource identifier, APNs takes the bundled file name with its extension.

use std::collections::BTreeMap;

use chatping_common::types::{
    AndroidConfig, ApnsConfig, CHAT_NOTIFICATION_TYPE, ChatMessageEvent, NotificationPayload,
};

/// Prefix of every notification title.
pub const TITLE_PREFIX: &str = "New Message from ";

/// Body used when the message has no text.
pub const DEFAULT_BODY: &str = "You have a new message";

/// Default logical sound identifier.
pub const DEFAULT_SOUND: &str = "notification";

/// File extension of the sound bundled in the iOS app.
const APNS_SOUND_EXTENSION: &str = "mp3";

#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    sound: String,
}

impl PayloadBuilder {
    /// `sound` is the identifier without extension (e.g. `"notification"`).
    pub fn new(sound: impl Into<String>) -> Self {
        let sound: String = sound.into();
        let sound = sound.trim();
        Self {
            sound: if sound.is_empty() {
                DEFAULT_SOUND.to_string()
            } else {
                sound.to_string()
            },
        }
    }

    pub fn build(&self, message: &ChatMessageEvent, sender_name: &str) -> NotificationPayload {
        let body = message
            .body
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(DEFAULT_BODY)
            .to_string();

        let data = BTreeMap::from([
            ("chatId".to_string(), message.chat_id.clone()),
            ("type".to_string(), CHAT_NOTIFICATION_TYPE.to_string()),
            ("senderId".to_string(), message.sender_id.clone()),
            ("receiverId".to_string(), message.receiver_id.clone()),
        ]);

        NotificationPayload {
            title: format!("{TITLE_PREFIX}{sender_name}"),
            body,
            data,
            android: AndroidConfig {
                sound: self.sound.clone(),
            },
            apns: ApnsConfig {
                sound: format!("{}.{}", self.sound, APNS_SOUND_EXTENSION),
            },
        }
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SOUND)
    }
}
