use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, ValidationError, ValidationErrors};

const MAX_CHAT_ID_LEN: usize = 128;

// ============================================================================
// Conversation Types
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Chat Turn Request
// ============================================================================

/// Inbound payload of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub new_message: String,
    pub chat_id: String,
}

impl ChatTurnRequest {
    /// Parses and validates a raw request body.
    pub fn parse(body: &[u8]) -> Result<Self, AppError> {
        let request: Self = serde_json::from_slice(body)?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();

        if !is_valid_chat_id(&self.chat_id) {
            errors.add(
                ValidationError::new(
                    "chatId",
                    format!(
                        "must be 1-{} characters of letters, digits, '-' or '_'",
                        MAX_CHAT_ID_LEN
                    ),
                )
                .with_code("INVALID_IDENTIFIER"),
            );
        }

        if self.new_message.trim().is_empty() {
            errors.add(ValidationError::new("newMessage", "must not be empty").with_code("EMPTY"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into_app_error())
        }
    }

    /// History in original order with the new user message appended last.
    pub fn conversation(&self) -> Vec<ChatMessage> {
        let mut conversation = self.messages.clone();
        conversation.push(ChatMessage::user(self.new_message.clone()));
        conversation
    }
}

pub fn is_valid_chat_id(chat_id: &str) -> bool {
    !chat_id.is_empty()
        && chat_id.len() <= MAX_CHAT_ID_LEN
        && chat_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ============================================================================
// Persisted Records
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRecord {
    pub id: Uuid,
    /// Owner of the chat; history is only ever listed back to this user.
    pub user_id: Uuid,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessageRecord {
    pub fn new(user_id: Uuid, chat_id: &str, role: Role, content: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            chat_id: chat_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Caller Identity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: Uuid,
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_id)
    }
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub services: ServiceHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub store: String,
    pub agent_url: String,
}

impl HealthStatus {
    pub fn healthy(services: ServiceHealth) -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_parse_turn_request() {
        let body = br#"{
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ],
            "newMessage": "what's new?",
            "chatId": "chat_01-abc"
        }"#;

        let request = ChatTurnRequest::parse(body).unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.chat_id, "chat_01-abc");

        let conversation = request.conversation();
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation[0], ChatMessage::user("hi"));
        assert_eq!(conversation[1], ChatMessage::assistant("hello"));
        assert_eq!(conversation[2], ChatMessage::user("what's new?"));
    }

    #[test]
    fn test_messages_default_to_empty() {
        let request = ChatTurnRequest::parse(br#"{"newMessage": "hi", "chatId": "c1"}"#).unwrap();
        assert!(request.messages.is_empty());
        assert_eq!(request.conversation(), vec![ChatMessage::user("hi")]);
    }

    #[test]
    fn test_unparsable_body_is_bad_request() {
        let err = ChatTurnRequest::parse(b"{not json").unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
    }

    #[test]
    fn test_unknown_role_is_bad_request() {
        let body = br#"{"messages": [{"role": "system", "content": "x"}], "newMessage": "hi", "chatId": "c1"}"#;
        let err = ChatTurnRequest::parse(body).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
    }

    #[test]
    fn test_validation_collects_all_fields() {
        let err = ChatTurnRequest::parse(br#"{"newMessage": "   ", "chatId": "../etc"}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
        let details = err.details.unwrap();
        assert_eq!(details["errors"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_chat_id_syntax() {
        assert!(is_valid_chat_id("abc-DEF_123"));
        assert!(!is_valid_chat_id(""));
        assert!(!is_valid_chat_id("has space"));
        assert!(!is_valid_chat_id(&"a".repeat(MAX_CHAT_ID_LEN + 1)));
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!(Role::User.to_string(), "user");
        assert!("bot".parse::<Role>().is_err());
    }
}
