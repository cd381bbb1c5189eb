use async_trait::async_trait;
use thiserror::Error;

use bulwark_types::outbound::{MessageHandle, OutboundMessage, ThreadHandle};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel {0} not found")]
    UnknownChannel(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("platform rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}

/// Posting into guild channels and threads. Implementations must not retry
/// on their own; callers decide what a failed send means.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn channel_exists(&self, channel_id: &str) -> Result<bool, TransportError>;

    async fn send(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> Result<MessageHandle, TransportError>;

    async fn start_thread(
        &self,
        message: &MessageHandle,
        title: &str,
    ) -> Result<ThreadHandle, TransportError>;

    async fn send_to_thread(
        &self,
        thread: &ThreadHandle,
        message: &OutboundMessage,
    ) -> Result<(), TransportError>;
}

/// Direct messages to a single user.
#[async_trait]
pub trait DirectSender: Send + Sync {
    async fn send_direct(&self, user_id: &str, content: &str) -> Result<(), TransportError>;
}
