//! Chat-completion client interface and an OpenAI-compatible implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while calling a language model.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response stream: {0}")]
    Stream(String),
    #[error("client misconfigured: {0}")]
    Config(String),
}

/// One chat-completion call: system and user text plus an output budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

/// A language model that turns a request into text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
}

#[async_trait]
impl<C: LlmClient + ?Sized> LlmClient for std::sync::Arc<C> {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        (**self).complete(request).await
    }
}

/// Client for any server exposing an OpenAI-style `/chat/completions` route.
///
/// Responses are always requested as a server-sent-event stream; long
/// outputs arrive incrementally instead of hitting proxy idle timeouts.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("repograph/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "stream": true,
            "max_tokens": request.max_tokens,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
        });

        let mut builder = self.http.post(self.url()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "chat completion request rejected");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let mut events = SseAccumulator::default();
        let mut stream = Box::pin(response.bytes_stream());
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            events.push(&chunk)?;
            if events.is_done() {
                break;
            }
        }
        let text = events.finish()?;
        debug!(chars = text.len(), "chat completion assembled");
        Ok(text)
    }
}

/// Assembles `choices[0].delta.content` fragments from an SSE byte stream.
///
/// Input may be split at arbitrary points, even inside a UTF-8 sequence;
/// incomplete lines are buffered until their newline arrives.
#[derive(Debug, Default)]
pub struct SseAccumulator {
    buffer: Vec<u8>,
    text: String,
    done: bool,
}

impl SseAccumulator {
    /// Feed a chunk of the stream.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), LlmError> {
        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.line(String::from_utf8_lossy(&line).trim())?;
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Flush a trailing line without newline and return the assembled text.
    pub fn finish(mut self) -> Result<String, LlmError> {
        let rest = std::mem::take(&mut self.buffer);
        if !self.done {
            self.line(String::from_utf8_lossy(&rest).trim())?;
        }
        Ok(self.text)
    }

    fn line(&mut self, line: &str) -> Result<(), LlmError> {
        // Blank separators, comments and `event:`/`id:` lines carry no text.
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();
        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }
        if data.is_empty() {
            return Ok(());
        }
        let value: Value = serde_json::from_str(data).map_err(|e| {
            LlmError::Stream(format!("{} (data: {})", e, data.chars().take(200).collect::<String>()))
        })?;
        let choice = &value["choices"][0];
        let content = choice["delta"]["content"]
            .as_str()
            .or_else(|| choice["message"]["content"].as_str());
        if let Some(content) = content {
            self.text.push_str(content);
        }
        Ok(())
    }
}
