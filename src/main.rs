use coin_pulse::{
    create_router, AppConfig, AppState, ChatTransport, CoinGeckoClient, LogTransport,
    NotificationDispatcher, NotificationService, RecurringScheduler, SnapshotFetcher,
    SubscriptionStore, TelegramTransport,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (reads .env when present)
    let config = AppConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coin_pulse=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!("Configuration: {:?}", config);

    // Market data: CoinGecko behind the TTL cache
    let coingecko = CoinGeckoClient::new(
        config.coingecko_api_url.clone(),
        config.coingecko_api_key.clone(),
        config.request_timeout,
    )?;
    let fetcher = Arc::new(SnapshotFetcher::new(
        Arc::new(coingecko),
        config.fetcher_config(),
    ));
    tracing::info!("📡 Market data provider: {}", config.coingecko_api_url);

    // Chat transport: Telegram when a token is configured, log otherwise
    let transport: Arc<dyn ChatTransport> = match &config.bot_token {
        Some(token) => {
            tracing::info!("💬 Telegram transport enabled");
            Arc::new(TelegramTransport::new(
                config.telegram_api_url.clone(),
                token.clone(),
                config.request_timeout,
            )?)
        }
        None => {
            tracing::warn!("⚠️  BOT_TOKEN not set, notifications will only be logged");
            Arc::new(LogTransport)
        }
    };

    let store = Arc::new(SubscriptionStore::open(config.state_file.clone()));
    let scheduler = Arc::new(RecurringScheduler::new());
    let dispatcher = Arc::new(NotificationDispatcher::new(
        fetcher.clone(),
        transport,
        store.clone(),
        config.default_locale,
        config.request_timeout,
    ));
    let service = Arc::new(NotificationService::new(store, scheduler, dispatcher));

    // Re-arm every persisted subscription
    let restored = service.start();
    tracing::info!("✅ Notification service started ({} timers restored)", restored);

    let app = create_router(Arc::new(AppState {
        service: service.clone(),
        fetcher,
    }));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    tracing::info!("🚀 Coin Pulse running on http://{}", config.bind_addr);
    tracing::info!("📊 Health check: http://{}/health", config.bind_addr);
    tracing::info!("📚 Swagger UI: http://{}/swagger-ui", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.stop();
    tracing::info!("👋 Shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutdown signal received");
}
