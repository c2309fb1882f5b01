use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil::broker::BrokerClient;
use vigil::config::Config;
use vigil::services::{self, DisabledChatBackend, InMemoryMessageStore};
use vigil::session::ws_handler;
use vigil::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env());
    info!("Starting vigil server on {}:{}", config.host, config.port);

    if config.broker_api_key.is_none() {
        tracing::warn!("BROKER_API_KEY not set; broker calls will fail");
    }

    let gateway = Arc::new(BrokerClient::new(
        config.broker_url.clone(),
        config.broker_api_key.clone(),
        config.strategy_tag.clone(),
    ));
    let notifier = services::notifier::from_config(&config);

    let state = AppState {
        config: config.clone(),
        gateway,
        notifier,
        chat: Arc::new(DisabledChatBackend),
        message_store: Arc::new(InMemoryMessageStore::new()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
