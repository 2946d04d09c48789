/// Message assembly for every send variant
///
/// Messages are flat JSON objects: one audience key merged with whatever
/// notification/data/platform fields the caller supplies. The caller's
/// options are copied, never mutated.
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::errors::{FCMError, Result};

/// JSON object used for caller-supplied message fields
pub type Options = Map<String, Value>;

/// Keys that address a message. At most one may appear in a message.
pub const AUDIENCE_KEYS: [&str; 6] = [
    "token",
    "topic",
    "condition",
    "tokens",
    "registration_ids",
    "to",
];

/// Maximum legacy `time_to_live` in seconds (four weeks)
pub const MAX_TIME_TO_LIVE: u64 = 2_419_200;

/// Legacy registration ids, always serialized as a JSON array
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct RegistrationIds(Vec<String>);

impl RegistrationIds {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<&str> for RegistrationIds {
    fn from(id: &str) -> Self {
        Self(vec![id.to_string()])
    }
}

impl From<String> for RegistrationIds {
    fn from(id: String) -> Self {
        Self(vec![id])
    }
}

impl From<Vec<String>> for RegistrationIds {
    fn from(ids: Vec<String>) -> Self {
        Self(ids)
    }
}

impl From<&[String]> for RegistrationIds {
    fn from(ids: &[String]) -> Self {
        Self(ids.to_vec())
    }
}

impl From<&[&str]> for RegistrationIds {
    fn from(ids: &[&str]) -> Self {
        Self(ids.iter().map(|id| id.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for RegistrationIds {
    fn from(ids: [&str; N]) -> Self {
        Self(ids.iter().map(|id| id.to_string()).collect())
    }
}

/// Addressing target of a message
#[derive(Debug, Clone, PartialEq)]
pub enum Audience {
    /// v1: single device registration token
    Token(String),
    /// v1: topic name
    Topic(String),
    /// v1: topic condition, sent byte-identical
    Condition(String),
    /// v1: several device tokens in one message
    Tokens(Vec<String>),
    /// Legacy multicast
    RegistrationIds(RegistrationIds),
    /// Legacy `to`: notification key, device token or `/topics/...`
    To(String),
}

impl Audience {
    pub fn key(&self) -> &'static str {
        match self {
            Audience::Token(_) => "token",
            Audience::Topic(_) => "topic",
            Audience::Condition(_) => "condition",
            Audience::Tokens(_) => "tokens",
            Audience::RegistrationIds(_) => "registration_ids",
            Audience::To(_) => "to",
        }
    }

    fn value(&self) -> Value {
        match self {
            Audience::Token(v) | Audience::Topic(v) | Audience::Condition(v) | Audience::To(v) => {
                Value::String(v.clone())
            }
            Audience::Tokens(ids) => json!(ids),
            Audience::RegistrationIds(ids) => json!(ids),
        }
    }
}

/// Build a flat message: the audience key first, then the caller's options
pub fn build(audience: &Audience, options: &Options) -> Result<Options> {
    if let Some(key) = AUDIENCE_KEYS.iter().find(|key| options.contains_key(**key)) {
        return Err(FCMError::AudienceConflict((*key).to_string()));
    }

    let mut message = Map::with_capacity(options.len() + 1);
    message.insert(audience.key().to_string(), audience.value());
    message.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(message)
}

/// Wrap a message for the v1 endpoint
pub fn v1_envelope(message: Options) -> Value {
    json!({ "message": message })
}

/// Legacy option checks applied before a request is built
pub fn validate_legacy_options(options: &Options) -> Result<()> {
    if let Some(ttl) = options.get("time_to_live") {
        match ttl.as_u64() {
            Some(secs) if secs <= MAX_TIME_TO_LIVE => {}
            _ => {
                return Err(FCMError::InvalidOption(
                    "Invalid `time_to_live` value.".to_string(),
                ))
            }
        }
    }
    Ok(())
}

/// Device group management operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKeyOperation {
    Create,
    Add,
    Remove,
}

/// Body for `POST /gcm/notification`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationKeyRequest {
    pub operation: NotificationKeyOperation,
    pub notification_key_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_key: Option<String>,
    pub registration_ids: RegistrationIds,
}

/// Body for Instance ID batch subscribe/unsubscribe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicBatchRequest {
    pub to: String,
    pub registration_tokens: RegistrationIds,
}

impl TopicBatchRequest {
    pub fn new(topic: &str, registration_tokens: RegistrationIds) -> Self {
        Self {
            to: topic_destination(topic),
            registration_tokens,
        }
    }
}

/// Legacy `to` value for a topic
pub fn topic_destination(topic: &str) -> String {
    format!("/topics/{}", topic)
}
