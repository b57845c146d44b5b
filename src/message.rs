use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier assigned by the mailbox. Used as the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message as handed over by the message source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender_display_name: String,
    #[serde(default)]
    pub sender_email: String,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub has_attachments: bool,
}

impl Message {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(id),
            subject: String::new(),
            sender_display_name: String::new(),
            sender_email: String::new(),
            received_at: None,
            body: String::new(),
            has_attachments: false,
        }
    }

    pub fn with_sender(mut self, display_name: &str, email: &str) -> Self {
        self.sender_display_name = display_name.to_string();
        self.sender_email = email.to_string();
        self
    }

    pub fn with_subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_string();
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn with_attachments(mut self, has_attachments: bool) -> Self {
        self.has_attachments = has_attachments;
        self
    }

    pub fn normalize(&self) -> NormalizedMessage {
        NormalizedMessage::from(self)
    }
}

/// Lower-cased, trimmed view of a [`Message`] that the extractors work on.
///
/// `raw_subject` keeps the original casing for the all-caps check.
#[derive(Debug, Clone, Default)]
pub struct NormalizedMessage {
    pub subject: String,
    pub raw_subject: String,
    pub sender_name: String,
    pub sender_email: String,
    pub body: String,
    pub has_attachments: bool,
}

impl From<&Message> for NormalizedMessage {
    fn from(message: &Message) -> Self {
        Self {
            subject: message.subject.trim().to_lowercase(),
            raw_subject: message.subject.trim().to_string(),
            sender_name: message.sender_display_name.trim().to_lowercase(),
            sender_email: message.sender_email.trim().to_lowercase(),
            body: message.body.to_lowercase(),
            has_attachments: message.has_attachments,
        }
    }
}
