use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use bulwark_types::outbound::{MessageHandle, OutboundMessage, ThreadHandle};

use crate::transport::{ChannelSender, DirectSender, TransportError};

/// Everything a [`MemoryTransport`] was asked to deliver, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentRecord {
    Channel {
        channel_id: String,
        message: OutboundMessage,
    },
    ThreadOpened {
        message_id: String,
        thread_id: String,
        title: String,
    },
    Thread {
        thread_id: String,
        message: OutboundMessage,
    },
    Direct {
        user_id: String,
        content: String,
    },
}

#[derive(Default)]
struct MemoryState {
    channels: Option<HashSet<String>>,
    sent: Vec<SentRecord>,
    next_id: u64,
    fail_content: Vec<String>,
    fail_direct: HashSet<String>,
    fail_sends_from: Option<usize>,
    channel_sends: usize,
}

/// Transport that records instead of delivering. Used by the server's dry-run
/// mode and as the test double for publishing. Failures can be injected per
/// content fragment, per DM recipient, or from the n-th channel send on.
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

impl MemoryTransport {
    /// Every channel id resolves.
    pub fn accepting_all() -> Self {
        Self::default()
    }

    /// Only the listed channel ids resolve.
    pub fn with_channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let transport = Self::default();
        transport.lock().channels = Some(channels.into_iter().map(Into::into).collect());
        transport
    }

    /// Fail any channel or thread send whose text contains `fragment`.
    pub fn fail_when_content_contains(&self, fragment: impl Into<String>) {
        self.lock().fail_content.push(fragment.into());
    }

    pub fn fail_direct_to(&self, user_id: impl Into<String>) {
        self.lock().fail_direct.insert(user_id.into());
    }

    /// Fail every channel send from the zero-based `index` onwards.
    pub fn fail_channel_sends_from(&self, index: usize) {
        self.lock().fail_sends_from = Some(index);
    }

    pub fn sent(&self) -> Vec<SentRecord> {
        self.lock().sent.clone()
    }

    /// Channel messages only, in order.
    pub fn channel_messages(&self) -> Vec<(String, OutboundMessage)> {
        self.lock()
            .sent
            .iter()
            .filter_map(|r| match r {
                SentRecord::Channel {
                    channel_id,
                    message,
                } => Some((channel_id.clone(), message.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn direct_messages(&self) -> Vec<(String, String)> {
        self.lock()
            .sent
            .iter()
            .filter_map(|r| match r {
                SentRecord::Direct { user_id, content } => Some((user_id.clone(), content.clone())),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A panic while holding this lock can only come from a test assertion.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MemoryState {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn check_content(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let text = message.content.as_deref().unwrap_or_default();
        match self.fail_content.iter().find(|f| text.contains(f.as_str())) {
            Some(fragment) => Err(TransportError::Other(format!(
                "injected failure for content containing '{}'",
                fragment
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChannelSender for MemoryTransport {
    async fn channel_exists(&self, channel_id: &str) -> Result<bool, TransportError> {
        Ok(self
            .lock()
            .channels
            .as_ref()
            .is_none_or(|known| known.contains(channel_id)))
    }

    async fn send(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> Result<MessageHandle, TransportError> {
        let mut state = self.lock();
        if let Some(known) = &state.channels {
            if !known.contains(channel_id) {
                return Err(TransportError::UnknownChannel(channel_id.to_string()));
            }
        }

        let index = state.channel_sends;
        state.channel_sends += 1;
        if state.fail_sends_from.is_some_and(|from| index >= from) {
            return Err(TransportError::Other(format!("injected failure on send {}", index)));
        }
        state.check_content(message)?;

        let message_id = state.next_id();
        info!(
            "[dry-run] channel {} <- {:?} ({} file(s))",
            channel_id,
            message.content.as_deref().unwrap_or(""),
            message.files.len()
        );
        state.sent.push(SentRecord::Channel {
            channel_id: channel_id.to_string(),
            message: message.clone(),
        });

        Ok(MessageHandle {
            channel_id: channel_id.to_string(),
            message_id,
        })
    }

    async fn start_thread(
        &self,
        message: &MessageHandle,
        title: &str,
    ) -> Result<ThreadHandle, TransportError> {
        let mut state = self.lock();
        let thread_id = state.next_id();
        state.sent.push(SentRecord::ThreadOpened {
            message_id: message.message_id.clone(),
            thread_id: thread_id.clone(),
            title: title.to_string(),
        });
        Ok(ThreadHandle { thread_id })
    }

    async fn send_to_thread(
        &self,
        thread: &ThreadHandle,
        message: &OutboundMessage,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.check_content(message)?;
        state.sent.push(SentRecord::Thread {
            thread_id: thread.thread_id.clone(),
            message: message.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl DirectSender for MemoryTransport {
    async fn send_direct(&self, user_id: &str, content: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.fail_direct.contains(user_id) {
            return Err(TransportError::Other(format!("cannot DM user {}", user_id)));
        }
        info!("[dry-run] DM {} <- {:?}", user_id, content);
        state.sent.push(SentRecord::Direct {
            user_id: user_id.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sends_in_order() {
        let t = MemoryTransport::accepting_all();
        let handle = t.send("c1", &OutboundMessage::text("hello")).await.unwrap();
        let thread = t.start_thread(&handle, "Code").await.unwrap();
        t.send_to_thread(&thread, &OutboundMessage::text("ABC")).await.unwrap();
        t.send_direct("u1", "thanks").await.unwrap();

        let sent = t.sent();
        assert_eq!(sent.len(), 4);
        assert!(matches!(&sent[1], SentRecord::ThreadOpened { title, .. } if title == "Code"));
        assert_eq!(t.direct_messages(), vec![("u1".to_string(), "thanks".to_string())]);
    }

    #[tokio::test]
    async fn unknown_channels_do_not_resolve() {
        let t = MemoryTransport::with_channels(["c1"]);
        assert!(t.channel_exists("c1").await.unwrap());
        assert!(!t.channel_exists("c2").await.unwrap());
        assert!(t.send("c2", &OutboundMessage::text("x")).await.is_err());
    }

    #[tokio::test]
    async fn injected_failures_are_not_recorded() {
        let t = MemoryTransport::accepting_all();
        t.fail_when_content_contains("boom");
        t.fail_direct_to("u2");

        assert!(t.send("c1", &OutboundMessage::text("a boom b")).await.is_err());
        assert!(t.send_direct("u2", "hi").await.is_err());
        assert!(t.sent().is_empty());
    }
}
