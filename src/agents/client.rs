use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::Serialize;

use crate::agents::events::{AgentEvent, AgentMessage};

// ============================================================================
// Collaborator contract
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("agent returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Stream(String),
}

/// Lazy event source for one invocation. `None` items are explicit null frames.
pub type AgentStream = BoxStream<'static, Result<Option<AgentEvent>, AgentError>>;

#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn invoke(
        &self,
        messages: Vec<AgentMessage>,
        session_id: &str,
    ) -> Result<AgentStream, AgentError>;
}

// ============================================================================
// HTTP agent client
// ============================================================================

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub url: String,
    pub connect_timeout: Duration,
}

impl AgentConfig {
    pub fn invoke_url(&self) -> String {
        format!("{}/invoke", self.url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct InvokeRequest<'a> {
    messages: &'a [AgentMessage],
    session_id: &'a str,
}

/// Talks to an agent service that answers `POST /invoke` with newline-delimited
/// JSON events.
#[derive(Clone)]
pub struct HttpAgentClient {
    http: reqwest::Client,
    config: AgentConfig,
}

impl HttpAgentClient {
    pub fn new(config: AgentConfig) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn invoke(
        &self,
        messages: Vec<AgentMessage>,
        session_id: &str,
    ) -> Result<AgentStream, AgentError> {
        let response = self
            .http
            .post(self.config.invoke_url())
            .json(&InvokeRequest {
                messages: &messages,
                session_id,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Status { status, body });
        }

        Ok(decode_event_lines(response.bytes_stream()).boxed())
    }
}

// ============================================================================
// NDJSON decoding
// ============================================================================

/// Splits a byte stream into lines and decodes each non-blank line as an
/// optional agent event. Lines that fail to decode are logged and skipped.
pub fn decode_event_lines<S, E>(body: S) -> impl Stream<Item = Result<Option<AgentEvent>, AgentError>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<AgentError> + Send + 'static,
{
    async_stream::stream! {
        let mut body = Box::pin(body);
        let mut buffer = BytesMut::new();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(idx) = buffer.iter().position(|b| *b == b'\n') {
                let line = buffer.split_to(idx + 1);
                if let Some(event) = decode_line(&line[..idx]) {
                    yield Ok(event);
                }
            }
        }

        if let Some(event) = decode_line(&buffer) {
            yield Ok(event);
        }
    }
}

fn decode_line(line: &[u8]) -> Option<Option<AgentEvent>> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<Option<AgentEvent>>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            log::warn!("Skipping undecodable agent frame: {}", e);
            None
        }
    }
}
