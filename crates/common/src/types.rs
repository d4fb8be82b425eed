use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value of the `type` entry in every chat notification's data map.
pub const CHAT_NOTIFICATION_TYPE: &str = "chat";

/// Raw trigger payload: the path parameters of the created record plus its fields.
///
/// `document` is `None` when the hosting platform delivered no snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessageEvent {
    pub chat_id: String,
    pub message_id: String,
    #[serde(default)]
    pub document: Option<serde_json::Value>,
}

/// A validated chat message, created once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageEvent {
    pub chat_id: String,
    pub message_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    /// Message text; `None` when the document carried no usable body.
    pub body: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A user identity record as held by the directory store.
///
/// Token fields reflect the two schema shapes seen in stored documents:
/// a legacy single `fcmToken` and the newer `fcmTokens` collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default, alias = "id")]
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Older profile documents carry only a first name.
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub fcm_token: Option<String>,
    #[serde(default)]
    pub fcm_tokens: Option<Vec<String>>,
}

impl UserRecord {
    /// Name to show for this user: `displayName`, else `firstName`. Blank
    /// values are skipped.
    pub fn preferred_name(&self) -> Option<&str> {
        [self.display_name.as_deref(), self.first_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
    }
}

/// Normalized set of a recipient's device tokens.
///
/// Blank entries are dropped and duplicates collapse. Iteration order is
/// lexicographic so repeated runs fan out identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet(BTreeSet<String>);

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// The only token in the set, if the set has exactly one.
    pub fn single(&self) -> Option<&str> {
        if self.0.len() == 1 {
            self.0.first().map(String::as_str)
        } else {
            None
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for TokenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|t| t.into().trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        )
    }
}

/// Android notification options. `sound` is a bare resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndroidConfig {
    pub sound: String,
}

/// APNs options. `sound` is a bundle file name including its extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApnsConfig {
    pub sound: String,
}

/// Platform-aware push notification ready for the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    /// String-only data map delivered to the client app.
    pub data: BTreeMap<String, String>,
    pub android: AndroidConfig,
    pub apns: ApnsConfig,
}

/// Why the gateway refused a single device token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenErrorKind {
    Unregistered,
    InvalidArgument,
    SenderIdMismatch,
    QuotaExceeded,
    Unavailable,
    Internal,
    ThirdPartyAuth,
    Transport,
    Unknown,
}

impl std::fmt::Display for TokenErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenErrorKind::Unregistered => write!(f, "unregistered"),
            TokenErrorKind::InvalidArgument => write!(f, "invalid_argument"),
            TokenErrorKind::SenderIdMismatch => write!(f, "sender_id_mismatch"),
            TokenErrorKind::QuotaExceeded => write!(f, "quota_exceeded"),
            TokenErrorKind::Unavailable => write!(f, "unavailable"),
            TokenErrorKind::Internal => write!(f, "internal"),
            TokenErrorKind::ThirdPartyAuth => write!(f, "third_party_auth"),
            TokenErrorKind::Transport => write!(f, "transport"),
            TokenErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Structured per-token failure detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenError {
    pub kind: TokenErrorKind,
    pub message: String,
}

/// Result of one attempted token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub token: String,
    pub success: bool,
    pub error: Option<TokenError>,
}

impl DispatchResult {
    pub fn delivered(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(token: impl Into<String>, kind: TokenErrorKind, message: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            success: false,
            error: Some(TokenError {
                kind,
                message: message.into(),
            }),
        }
    }
}

/// Aggregate result of one send operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<DispatchResult>,
}

impl DispatchOutcome {
    pub fn from_results(results: Vec<DispatchResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            success_count,
            failure_count: results.len() - success_count,
            results,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &DispatchResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Shortened token identity safe to write to logs.
pub fn redact_token(token: &str) -> String {
    const VISIBLE: usize = 8;
    if token.chars().count() <= VISIBLE {
        return token.to_string();
    }
    let prefix: String = token.chars().take(VISIBLE).collect();
    format!("{prefix}…")
}
