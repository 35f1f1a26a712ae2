// Public module exports
pub mod client;
pub mod events;

// Re-export main types for convenience
pub use client::{AgentClient, AgentConfig, AgentError, AgentStream, HttpAgentClient};
pub use events::{AgentEvent, AgentMessage, AgentRole, ChunkContent, ContentPart};
