//! Remote chat model for gatekeeper replies.
//!
//! Talks to an OpenAI-compatible `chat/completions` endpoint. Every call
//! is bounded by a timeout; any failure falls back to the scripted reply
//! so the control loop never waits on the network.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::script::{system_prompt, Personality, Trigger};
use crate::storage::AiConfig;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("no API key configured")]
    MissingKey,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("provider returned HTTP {0}")]
    Status(u16),

    #[error("provider reply had no content")]
    EmptyReply,
}

/// What the remote model is asked to answer.
#[derive(Debug, Clone, Copy)]
pub struct ChatPrompt<'a> {
    pub personality: Personality,
    pub trigger: Trigger,
    pub message: &'a str,
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemoteResponder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl RemoteResponder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    pub fn from_config(ai: &AiConfig, api_key: &str) -> Self {
        Self::new(
            ai.endpoint.clone(),
            ai.model.clone(),
            api_key,
            Duration::from_secs(ai.request_timeout_secs),
        )
    }

    pub async fn reply(&self, prompt: ChatPrompt<'_>) -> Result<String, RemoteError> {
        if self.api_key.trim().is_empty() {
            return Err(RemoteError::MissingKey);
        }
        let body = json!({
            "model": self.model,
            "max_tokens": 150,
            "messages": [
                { "role": "system", "content": system_prompt(prompt.personality, prompt.trigger) },
                { "role": "user", "content": prompt.message },
            ],
        });

        let request = async {
            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(RemoteError::Status(resp.status().as_u16()));
            }
            let completion: Completion = resp.json().await?;
            completion
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .ok_or(RemoteError::EmptyReply)
        };

        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| RemoteError::Timeout(self.timeout))?
    }

    /// Remote reply, or `fallback` when the provider cannot answer.
    pub async fn reply_or(&self, prompt: ChatPrompt<'_>, fallback: String) -> String {
        match self.reply(prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "remote AI unavailable, using scripted reply");
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> ChatPrompt<'static> {
        ChatPrompt {
            personality: Personality::Strict,
            trigger: Trigger::Stress,
            message: "I need one now",
        }
    }

    #[tokio::test]
    async fn returns_provider_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"  Breathe first. "}}]}"#)
            .create_async()
            .await;

        let responder = RemoteResponder::new(
            format!("{}/v1/chat/completions", server.url()),
            "gpt-4o-mini",
            "sk-test",
            Duration::from_secs(5),
        );
        let reply = responder.reply(prompt()).await.unwrap();
        assert_eq!(reply, "Breathe first.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_error_falls_back() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat")
            .with_status(500)
            .create_async()
            .await;

        let responder = RemoteResponder::new(
            format!("{}/chat", server.url()),
            "m",
            "sk-test",
            Duration::from_secs(5),
        );
        assert!(matches!(
            responder.reply(prompt()).await,
            Err(RemoteError::Status(500))
        ));
        let reply = responder.reply_or(prompt(), "scripted".into()).await;
        assert_eq!(reply, "scripted");
    }

    #[tokio::test]
    async fn empty_choices_fall_back() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let responder =
            RemoteResponder::new(format!("{}/chat", server.url()), "m", "k", Duration::from_secs(5));
        assert!(matches!(responder.reply(prompt()).await, Err(RemoteError::EmptyReply)));
    }

    #[tokio::test]
    async fn missing_key_never_calls_out() {
        let responder = RemoteResponder::new(
            "http://127.0.0.1:9/unused",
            "m",
            "",
            Duration::from_millis(50),
        );
        assert!(matches!(responder.reply(prompt()).await, Err(RemoteError::MissingKey)));
        assert_eq!(responder.reply_or(prompt(), "local".into()).await, "local");
    }
}
