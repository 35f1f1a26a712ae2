pub mod agents;
pub mod error;
pub mod handlers;
pub mod init;
pub mod models;
pub mod relay;
pub mod storage;

pub use crate::handlers::create_app_router;
pub use crate::relay::{Envelope, RelayConfig, TurnOrchestrator};
pub use crate::storage::{AppState, MemoryMessageStore, MessageStore, PgMessageStore};
