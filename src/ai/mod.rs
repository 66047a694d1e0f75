//! LLM completion client and prompt assembly.
//!
//! [`CompletionService`] is the seam the lifecycle handler and the transcript
//! post-processor talk to; [`OpenAiCompletions`] is the HTTP implementation
//! against an OpenAI-compatible `/chat/completions` endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::OpenAiConfig;
use crate::platform::ChatMessage;

/// How many recent chat messages the followup responder sees.
pub const HISTORY_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Single-turn chat completion. Returns `Ok(None)` when the provider yields
/// no usable content.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn chat(&self, messages: &[ChatTurn]) -> Result<Option<String>>;
}

/// System prompt for post-meeting chat followup, grounding the model in the
/// stored summary and the agent's original instructions.
pub fn followup_prompt(meeting_summary: &str, agent_instructions: &str) -> String {
    format!(
        "You are an AI assistant helping the user revisit a recently completed meeting.\n\
         Below is a summary of the meeting, generated from the transcript:\n\n\
         {meeting_summary}\n\n\
         The following are your original instructions from the live meeting assistant. \
         Continue to follow these behavioral guidelines as you assist the user:\n\n\
         {agent_instructions}\n\n\
         The user may ask questions about the meeting, request clarifications, or ask for \
         follow-up actions. Always base your responses on the meeting summary above.\n\
         You also have access to the recent conversation history between you and the user. \
         Use the context of previous messages to provide relevant, coherent responses and \
         maintain continuity in the conversation.\n\
         If the summary does not contain enough information to answer a question, politely \
         let the user know.\n\
         Be concise, helpful, and focus on providing accurate information from the meeting \
         and the ongoing conversation."
    )
}

const SUMMARY_PROMPT: &str = "You are an expert summarizer. You write readable, concise, simple \
     meeting summaries. Given the transcript of a meeting, produce an overview paragraph \
     followed by short sections covering the key discussion points and any decisions or \
     action items. Stay factual; do not invent content absent from the transcript.";

/// Map the most recent `n` raw chat messages into role-tagged history.
/// A message is `assistant` iff its author is the agent; missing author
/// information defaults to `user`.
pub fn history_window(messages: &[ChatMessage], agent_id: &str, n: usize) -> Vec<ChatTurn> {
    let start = messages.len().saturating_sub(n);
    messages[start..]
        .iter()
        .map(|m| {
            let role = if m.author_id.as_deref() == Some(agent_id) {
                Role::Assistant
            } else {
                Role::User
            };
            ChatTurn {
                role,
                content: m.text.clone(),
            }
        })
        .collect()
}

/// Build and submit the followup request: system prompt + history + new
/// user message.
pub async fn generate_followup(
    service: &dyn CompletionService,
    meeting_summary: &str,
    agent_instructions: &str,
    history: Vec<ChatTurn>,
    user_message: &str,
) -> Result<Option<String>> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatTurn::system(followup_prompt(
        meeting_summary,
        agent_instructions,
    )));
    messages.extend(history);
    messages.push(ChatTurn::user(user_message));

    service.chat(&messages).await
}

/// Summarize an annotated transcript for the completed-meeting record.
pub async fn summarize_transcript(
    service: &dyn CompletionService,
    transcript_text: &str,
) -> Result<Option<String>> {
    let messages = vec![
        ChatTurn::system(SUMMARY_PROMPT),
        ChatTurn::user(format!("Summarize the following transcript:\n\n{transcript_text}")),
    ];
    service.chat(&messages).await
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

pub struct OpenAiCompletions {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiCompletions {
    pub fn new(config: OpenAiConfig) -> Self {
        info!(
            "Initialized completion client: {} ({})",
            config.endpoint, config.model
        );
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletions {
    async fn chat(&self, messages: &[ChatTurn]) -> Result<Option<String>> {
        debug!("Requesting completion with {} messages", messages.len());

        let body = CompletionRequest {
            model: &self.config.model,
            messages,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send completion request")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read completion response body")?;

        if !status.is_success() {
            anyhow::bail!(
                "Completion request failed with status {}: {}",
                status,
                response_text
            );
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&response_text).context("Failed to parse completion response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty());

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(author: Option<&str>, text: &str) -> ChatMessage {
        ChatMessage {
            author_id: author.map(|s| s.to_string()),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_history_window_roles() {
        let messages = vec![
            msg(Some("user-1"), "What was decided?"),
            msg(Some("agent-1"), "Two action items."),
            msg(None, "Thanks"),
        ];

        let history = history_window(&messages, "agent-1", HISTORY_WINDOW);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
        // Missing author defaults to user.
        assert_eq!(history[2].role, Role::User);
    }

    #[test]
    fn test_history_window_bounds() {
        let messages: Vec<ChatMessage> = (0..10)
            .map(|i| msg(Some("user-1"), &format!("msg {}", i)))
            .collect();

        let history = history_window(&messages, "agent-1", 5);
        assert_eq!(history.len(), 5);
        // Most recent messages survive.
        assert_eq!(history[0].content, "msg 5");
        assert_eq!(history[4].content, "msg 9");
    }

    #[test]
    fn test_followup_prompt_embeds_both_inputs() {
        let prompt = followup_prompt("SUMMARY-TEXT", "AGENT-RULES");
        assert!(prompt.contains("SUMMARY-TEXT"));
        assert!(prompt.contains("AGENT-RULES"));
        assert!(prompt.contains("politely"));
    }

    #[test]
    fn test_completion_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Hello!"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Hello!")
        );

        let empty = r#"{"choices":[]}"#;
        let parsed: CompletionResponse = serde_json::from_str(empty).unwrap();
        assert!(parsed.choices.is_empty());
    }

    #[test]
    fn test_chat_turn_serialization() {
        let turn = ChatTurn::system("be helpful");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"be helpful"}"#);
    }
}
