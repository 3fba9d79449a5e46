use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

use access_gateway::config::Config;
use access_gateway::dispatch::HttpChatRouter;
use access_gateway::http;
use access_gateway::redis::RedisManager;
use access_gateway::repository::RedisStore;
use access_gateway::service::AccessService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Arc::new(Config::load());

    // Initialize RedisManager
    let redis_manager = Arc::new(RedisManager::new_with_config(&config).await?);

    let store = Arc::new(RedisStore::new(redis_manager.clone(), &config));
    let (invalidations, _feed_guard) =
        redis_manager.change_feed(&config.maintenance.feed_channel)?;
    let router = Arc::new(HttpChatRouter::new(config.chat_router.url.clone()));

    let service = Arc::new(AccessService::new(
        config.clone(),
        store,
        router,
        invalidations,
    ));

    let bind: SocketAddr = config.server.bind.parse()?;
    let app = http::router(service);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "Starting access gateway");
    axum::serve(listener, app).await?;
    Ok(())
}
