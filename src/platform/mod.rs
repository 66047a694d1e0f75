//! Video/chat platform client.
//!
//! [`CallPlatform`] covers the outbound operations the meeting lifecycle
//! needs; [`StreamClient`] implements them against the platform's HTTP API.
//! The platform owns calls, channels, recordings and transcription — this
//! service only issues requests and reacts to webhooks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info};

use crate::config::StreamConfig;

/// A chat participant as the platform knows it.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformUser {
    pub id: String,
    pub name: String,
    pub role: String,
    pub image: String,
}

/// One message from a chat channel's recent history.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub author_id: Option<String>,
    pub text: String,
}

#[async_trait]
pub trait CallPlatform: Send + Sync {
    /// Create the video call for a meeting, transcription and recording
    /// auto-enabled, so the room exists before anyone joins.
    async fn create_call(
        &self,
        meeting_id: &str,
        meeting_name: &str,
        created_by: &str,
    ) -> Result<()>;

    /// Attach the realtime AI participant to an active call, with the
    /// agent's instructions as the session prompt.
    async fn connect_agent(&self, meeting_id: &str, agent_id: &str, instructions: &str)
        -> Result<()>;

    /// End the call. Idempotent on the platform side.
    async fn end_call(&self, meeting_id: &str) -> Result<()>;

    /// Create or refresh a chat/video identity.
    async fn upsert_user(&self, user: &PlatformUser) -> Result<()>;

    /// Send a message into a channel authored by the agent.
    async fn send_agent_message(&self, channel_id: &str, agent_id: &str, text: &str) -> Result<()>;

    /// Most recent messages in a channel, oldest first.
    async fn channel_messages(&self, channel_id: &str, limit: usize) -> Result<Vec<ChatMessage>>;
}

#[derive(Debug, Deserialize)]
struct ChannelMessagesResponse {
    messages: Vec<RawChannelMessage>,
}

#[derive(Debug, Deserialize)]
struct RawChannelMessage {
    user: Option<RawMessageUser>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessageUser {
    id: String,
}

pub struct StreamClient {
    client: reqwest::Client,
    config: StreamConfig,
}

impl StreamClient {
    pub fn new(config: StreamConfig) -> Self {
        info!("Initialized platform client: {}", config.base_url);
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.url(path))
            .header("x-api-key", &self.config.api_key)
            .header("authorization", &self.config.api_secret)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send platform request to {}", path))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Platform request {} failed with {}: {}", path, status, body);
            anyhow::bail!("Platform request {} failed with status {}", path, status);
        }

        Ok(response)
    }
}

#[async_trait]
impl CallPlatform for StreamClient {
    async fn create_call(
        &self,
        meeting_id: &str,
        meeting_name: &str,
        created_by: &str,
    ) -> Result<()> {
        debug!("Creating call for meeting {}", meeting_id);
        let body = json!({
            "data": {
                "created_by_id": created_by,
                "custom": {
                    "meetingId": meeting_id,
                    "meetingName": meeting_name,
                },
                "settings_override": {
                    "transcription": {
                        "language": "en",
                        "mode": "auto-on",
                        "closed_caption_mode": "auto-on",
                    },
                    "recording": {
                        "mode": "auto-on",
                        "quality": "1080p",
                    },
                },
            },
        });

        self.post(&format!("/video/call/default/{meeting_id}"), &body)
            .await?;
        Ok(())
    }

    async fn connect_agent(
        &self,
        meeting_id: &str,
        agent_id: &str,
        instructions: &str,
    ) -> Result<()> {
        info!("Connecting agent {} to call {}", agent_id, meeting_id);
        let body = json!({
            "agent_user_id": agent_id,
            "instructions": instructions,
        });

        self.post(
            &format!("/video/call/default/{meeting_id}/connect_agent"),
            &body,
        )
        .await?;
        Ok(())
    }

    async fn end_call(&self, meeting_id: &str) -> Result<()> {
        debug!("Ending call for meeting {}", meeting_id);
        self.post(
            &format!("/video/call/default/{meeting_id}/mark_ended"),
            &json!({}),
        )
        .await?;
        Ok(())
    }

    async fn upsert_user(&self, user: &PlatformUser) -> Result<()> {
        let body = json!({
            "users": {
                &user.id: {
                    "id": user.id,
                    "name": user.name,
                    "role": user.role,
                    "image": user.image,
                },
            },
        });

        self.post("/users", &body).await?;
        Ok(())
    }

    async fn send_agent_message(&self, channel_id: &str, agent_id: &str, text: &str) -> Result<()> {
        let body = json!({
            "message": {
                "text": text,
                "user_id": agent_id,
            },
        });

        self.post(
            &format!("/channels/messaging/{channel_id}/message"),
            &body,
        )
        .await?;
        Ok(())
    }

    async fn channel_messages(&self, channel_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        let body = json!({
            "messages": { "limit": limit },
        });

        let response = self
            .post(&format!("/channels/messaging/{channel_id}/query"), &body)
            .await?;

        let parsed: ChannelMessagesResponse = response
            .json()
            .await
            .context("Failed to parse channel messages response")?;

        Ok(parsed
            .messages
            .into_iter()
            .filter_map(|m| {
                m.text.map(|text| ChatMessage {
                    author_id: m.user.map(|u| u.id),
                    text,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_messages_parsing() {
        let raw = r#"{
            "messages": [
                {"user": {"id": "user-1"}, "text": "hello"},
                {"user": null, "text": "anon"},
                {"user": {"id": "agent-1"}}
            ]
        }"#;

        let parsed: ChannelMessagesResponse = serde_json::from_str(raw).unwrap();
        let messages: Vec<ChatMessage> = parsed
            .messages
            .into_iter()
            .filter_map(|m| {
                m.text.map(|text| ChatMessage {
                    author_id: m.user.map(|u| u.id),
                    text,
                })
            })
            .collect();

        // The textless message is dropped.
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].author_id.as_deref(), Some("user-1"));
        assert!(messages[1].author_id.is_none());
    }

    #[test]
    fn test_url_join() {
        let client = StreamClient::new(StreamConfig {
            base_url: "https://example.test/".to_string(),
            api_key: String::new(),
            api_secret: String::new(),
        });
        assert_eq!(client.url("/users"), "https://example.test/users");
    }
}
