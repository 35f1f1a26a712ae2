use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use crate::agents::{AgentClient, AgentConfig, HttpAgentClient};
use crate::handlers::HeaderIdentity;
use crate::models::ServiceHealth;
use crate::relay::{RelayConfig, TurnOrchestrator};
use crate::storage::{AppState, MemoryMessageStore, MessageStore, PgMessageStore};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: Option<DatabaseConfig>,
    pub agent: AgentConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        let database = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => Some(DatabaseConfig {
                url,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            }),
            _ => None,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database,
            agent: AgentConfig {
                url: std::env::var("AGENT_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
                connect_timeout: Duration::from_secs(
                    std::env::var("AGENT_CONNECT_TIMEOUT_SECS")
                        .unwrap_or_else(|_| "10".to_string())
                        .parse()?,
                ),
            },
            relay: RelayConfig {
                sse_buffer: std::env::var("SSE_BUFFER")
                    .unwrap_or_else(|_| "64".to_string())
                    .parse()?,
            },
        })
    }
}

pub async fn app_init() -> Result<(Config, Arc<AppState>), Box<dyn Error>> {
    let config = Config::from_env()?;
    log::info!("✅ Configuration loaded");

    let store = setup_store(&config).await?;

    let agent: Arc<dyn AgentClient> = Arc::new(HttpAgentClient::new(config.agent.clone())?);
    log::info!("✅ Agent client ready ({})", config.agent.invoke_url());

    let state = build_state(store, agent, &config);
    Ok((config, state))
}

/// Wires the shared handles into the application state.
pub fn build_state(
    store: Arc<dyn MessageStore>,
    agent: Arc<dyn AgentClient>,
    config: &Config,
) -> Arc<AppState> {
    let services = ServiceHealth {
        store: store.kind().to_string(),
        agent_url: config.agent.url.clone(),
    };
    let orchestrator = TurnOrchestrator::new(store.clone(), agent, config.relay.clone());

    Arc::new(AppState {
        store,
        identity: Arc::new(HeaderIdentity),
        orchestrator,
        services,
    })
}

// ============================================================================
// Setup Functions
// ============================================================================

async fn setup_store(config: &Config) -> Result<Arc<dyn MessageStore>, Box<dyn Error>> {
    let Some(database) = &config.database else {
        log::warn!("⚠️  DATABASE_URL not set, chat history is kept in memory only");
        return Ok(Arc::new(MemoryMessageStore::new()));
    };

    log::info!("📊 Connecting to PostgreSQL...");
    let db = setup_database(database).await?;
    log::info!("✅ PostgreSQL connected");

    log::info!("🔄 Running migrations...");
    sqlx::migrate!("./migrations").run(&db).await?;
    log::info!("✅ Migrations completed");

    Ok(Arc::new(PgMessageStore::new(db)))
}

async fn setup_database(config: &DatabaseConfig) -> Result<sqlx::PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}
