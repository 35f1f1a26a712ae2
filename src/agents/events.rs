use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ChatMessage, Role};

// ============================================================================
// Raw agent events
// ============================================================================

/// One frame of the agent's event stream. Only the kinds the relay forwards
/// are modelled; everything else collapses into `Unrecognized`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum AgentEvent {
    #[serde(rename = "on_chat_model_stream")]
    ModelChunk {
        #[serde(default)]
        data: ChunkData,
    },

    #[serde(rename = "on_tool_start")]
    ToolStart {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        data: ToolStartData,
    },

    #[serde(rename = "on_tool_end")]
    ToolEnd {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        data: ToolEndData,
    },

    #[serde(other)]
    Unrecognized,
}

impl AgentEvent {
    pub fn chunk(content: impl Into<ChunkContent>) -> Self {
        Self::ModelChunk {
            data: ChunkData {
                chunk: Some(ModelChunk {
                    content: content.into(),
                }),
            },
        }
    }

    pub fn tool_start(name: Option<&str>, input: Option<Value>) -> Self {
        Self::ToolStart {
            name: name.map(str::to_string),
            data: ToolStartData { input },
        }
    }

    pub fn tool_end(name: Option<&str>, output: Option<Value>) -> Self {
        Self::ToolEnd {
            name: name.map(str::to_string),
            data: ToolEndData { output },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkData {
    #[serde(default)]
    pub chunk: Option<ModelChunk>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelChunk {
    #[serde(default)]
    pub content: ChunkContent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolStartData {
    #[serde(default)]
    pub input: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolEndData {
    #[serde(default)]
    pub output: Option<Value>,
}

// ============================================================================
// Polymorphic chunk content
// ============================================================================

/// Model output arrives either as a bare string or as a list of content parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ChunkContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Other(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ContentPart {
    Structured {
        #[serde(default)]
        text: Option<String>,
    },
    Other(Value),
}

impl Default for ChunkContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for ChunkContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<ContentPart>> for ChunkContent {
    fn from(value: Vec<ContentPart>) -> Self {
        Self::Parts(value)
    }
}

impl ChunkContent {
    /// Collapses both content shapes into plain text.
    ///
    /// A part list contributes only its first part: the `text` field when the
    /// part is an object, otherwise the part itself coerced to a string.
    pub fn normalize(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => match parts.first() {
                Some(ContentPart::Structured { text }) => text.clone().unwrap_or_default(),
                Some(ContentPart::Other(value)) => coerce_to_string(value),
                None => String::new(),
            },
            Self::Other(value) => coerce_to_string(value),
        }
    }
}

fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Agent message vocabulary
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Human,
    Ai,
}

impl From<Role> for AgentRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Self::Human,
            Role::Assistant => Self::Ai,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentMessage {
    pub role: AgentRole,
    pub content: String,
}

impl From<ChatMessage> for AgentMessage {
    fn from(message: ChatMessage) -> Self {
        Self {
            role: message.role.into(),
            content: message.content,
        }
    }
}
