use chat_relay::create_app_router;
use chat_relay::init::app_init;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("🚀 Starting chat relay...");

    let (config, state) = app_init().await?;
    log::info!("✅ Application state initialized");
    let app = create_app_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("");
    log::info!("🎉 Server started!");
    log::info!("📍 http://{}", addr);
    log::info!("📡 Chat:    POST http://{}/api/chat", addr);
    log::info!("📜 History: GET  http://{}/api/chats/{{chat_id}}/messages", addr);
    log::info!("❤️  Health:  GET  http://{}/health", addr);
    log::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
