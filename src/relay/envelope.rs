use axum::response::sse::Event;
use serde::{Deserialize, Serialize};

/// Protocol message written to the client, one SSE event each.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Envelope {
    Connected,

    Token {
        token: String,
    },

    ToolStart {
        tool: String,
        input: serde_json::Value,
    },

    ToolEnd {
        tool: String,
        output: serde_json::Value,
    },

    Error {
        error: String,
    },

    Done,
}

impl Envelope {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: token.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    /// `done` and `error` end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// One SSE event whose `data` field is the envelope's JSON.
    pub fn to_event(&self) -> Result<Event, axum::Error> {
        Event::default().json_data(self)
    }
}
