use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use bulwark_types::outbound::{MessageHandle, OutboundMessage, ThreadHandle};

use crate::transport::{ChannelSender, DirectSender, TransportError};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Threads stay open for a day without activity.
const THREAD_AUTO_ARCHIVE_MINUTES: u32 = 1440;

#[derive(Deserialize)]
struct Created {
    id: String,
}

/// Minimal Discord REST client: channel messages with attachments, message
/// threads and DMs. Authenticated as a bot.
#[derive(Clone)]
pub struct DiscordClient {
    http: Client,
    api_base: String,
    token: String,
}

impl DiscordClient {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn post_message(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> Result<Created, TransportError> {
        if message.is_empty() {
            return Err(TransportError::Other("refusing to send an empty message".into()));
        }

        let url = self.url(&format!("/channels/{}/messages", channel_id));
        let content = message.content.clone().unwrap_or_default();

        let request = if message.files.is_empty() {
            self.http.post(&url).json(&json!({ "content": content }))
        } else {
            let attachments: Vec<_> = message
                .files
                .iter()
                .enumerate()
                .map(|(i, f)| json!({ "id": i, "filename": f.filename }))
                .collect();
            let payload = json!({ "content": content, "attachments": attachments });

            let mut form = Form::new().text("payload_json", payload.to_string());
            for (i, file) in message.files.iter().enumerate() {
                let part = Part::bytes(file.data.clone()).file_name(file.filename.clone());
                form = form.part(format!("files[{}]", i), part);
            }
            self.http.post(&url).multipart(form)
        };

        let resp = request.header("Authorization", self.auth()).send().await?;
        let created = check(resp).await?.json::<Created>().await?;
        debug!("Posted message {} to channel {}", created.id, channel_id);
        Ok(created)
    }
}

#[async_trait]
impl ChannelSender for DiscordClient {
    async fn channel_exists(&self, channel_id: &str) -> Result<bool, TransportError> {
        let resp = self
            .http
            .get(self.url(&format!("/channels/{}", channel_id)))
            .header("Authorization", self.auth())
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Ok(false),
            _ => check(resp).await.map(|_| false),
        }
    }

    async fn send(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> Result<MessageHandle, TransportError> {
        let created = self.post_message(channel_id, message).await?;
        Ok(MessageHandle {
            channel_id: channel_id.to_string(),
            message_id: created.id,
        })
    }

    async fn start_thread(
        &self,
        message: &MessageHandle,
        title: &str,
    ) -> Result<ThreadHandle, TransportError> {
        let resp = self
            .http
            .post(self.url(&format!(
                "/channels/{}/messages/{}/threads",
                message.channel_id, message.message_id
            )))
            .header("Authorization", self.auth())
            .json(&json!({
                "name": title,
                "auto_archive_duration": THREAD_AUTO_ARCHIVE_MINUTES,
            }))
            .send()
            .await?;

        let created = check(resp).await?.json::<Created>().await?;
        Ok(ThreadHandle {
            thread_id: created.id,
        })
    }

    async fn send_to_thread(
        &self,
        thread: &ThreadHandle,
        message: &OutboundMessage,
    ) -> Result<(), TransportError> {
        self.post_message(&thread.thread_id, message).await?;
        Ok(())
    }
}

#[async_trait]
impl DirectSender for DiscordClient {
    async fn send_direct(&self, user_id: &str, content: &str) -> Result<(), TransportError> {
        let resp = self
            .http
            .post(self.url("/users/@me/channels"))
            .header("Authorization", self.auth())
            .json(&json!({ "recipient_id": user_id }))
            .send()
            .await?;
        let dm = check(resp).await?.json::<Created>().await?;

        self.post_message(&dm.id, &OutboundMessage::text(content))
            .await?;
        Ok(())
    }
}

async fn check(resp: Response) -> Result<Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    warn!("Discord API returned {}: {}", status, body);
    Err(TransportError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let client = DiscordClient::new("t", "https://example.test/api/");
        assert_eq!(client.url("/channels/1"), "https://example.test/api/channels/1");
        assert_eq!(client.auth(), "Bot t");
    }

    #[tokio::test]
    async fn empty_messages_are_refused_before_any_request() {
        let client = DiscordClient::new("t", "http://127.0.0.1:9");
        let err = client
            .send("123", &OutboundMessage::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Other(_)));
    }
}
