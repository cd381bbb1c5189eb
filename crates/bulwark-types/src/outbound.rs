use serde::{Deserialize, Serialize};

/// A file attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }
}

/// One message sent to a channel, thread or DM.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub content: Option<String>,
    pub files: Vec<Attachment>,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            files: Vec::new(),
        }
    }

    pub fn file(attachment: Attachment) -> Self {
        Self {
            content: None,
            files: vec![attachment],
        }
    }

    pub fn with_file(mut self, attachment: Attachment) -> Self {
        self.files.push(attachment);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.content.as_deref().is_none_or(str::is_empty) && self.files.is_empty()
    }
}

/// Handle to a message the transport has posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHandle {
    pub channel_id: String,
    pub message_id: String,
}

/// Handle to a thread opened under a posted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadHandle {
    pub thread_id: String,
}

/// Platform mention markup for a user id.
pub fn mention(user_id: &str) -> String {
    format!("<@{}>", user_id)
}

/// Platform link markup for a channel id.
pub fn channel_link(channel_id: &str) -> String {
    format!("<#{}>", channel_id)
}
