use axum::{Router, routing};
use chrono::Utc;
use git_push_webhook::api::{handle_webhook, root, status};
use git_push_webhook::db::{SqlOrganizationRegistry, init_db};
use git_push_webhook::error::GatewayError;
use git_push_webhook::queue::{ChannelBroker, QueueProducer};
use git_push_webhook::{AppState, GatewayConfig};
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8888";
const DEFAULT_CONFIG_PATH: &str = "gateway_config.toml";
const DEFAULT_DATABASE_PATH: &str = "data/gateway.db";
const BROKER_CHANNEL_CAPACITY: usize = 64;

/// Load and parse the configuration file
fn load_config(path: &str) -> Result<GatewayConfig, GatewayError> {
    let config_str = fs::read_to_string(path).map_err(|e| {
        GatewayError::ConfigError(format!("Failed to read config file '{}': {}", path, e))
    })?;

    let config: GatewayConfig = toml::from_str(&config_str).map_err(|e| {
        GatewayError::ConfigError(format!("Failed to parse config file '{}': {}", path, e))
    })?;

    Ok(config)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config_path =
        std::env::var("GATEWAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config: GatewayConfig = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let bind_address = std::env::var("BIND_ADDRESS")
        .ok()
        .or_else(|| config.bind_address.clone())
        .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
    let database_path = std::env::var("DATABASE_PATH")
        .ok()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());
    let topic = std::env::var("GENERATE_PULL_REQUEST_TOPIC")
        .unwrap_or_else(|_| config.queue.generate_pull_request_topic.clone());

    // The secret stays a plain value handed to the verifier per call.
    let Some(webhook_secret) = std::env::var("WEBHOOKS_SECRET_KEY")
        .ok()
        .or_else(|| config.webhook_secret.clone())
    else {
        eprintln!(
            "Missing webhook secret: set WEBHOOKS_SECRET_KEY or webhook_secret in '{}'",
            config_path
        );
        std::process::exit(1);
    };

    let pool = match init_db(&database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Database error: {}", e);
            std::process::exit(1);
        }
    };
    let registry = Arc::new(SqlOrganizationRegistry::new(pool));

    let (broker, deliveries) = ChannelBroker::new(BROKER_CHANNEL_CAPACITY);
    ChannelBroker::spawn_echo_consumer(deliveries);
    let producer = QueueProducer::new(Arc::new(broker), topic);
    if let Err(e) = producer.init().await {
        eprintln!("Queue error: {}", e);
        std::process::exit(1);
    }

    let state = Arc::new(AppState {
        webhook_secret,
        registry,
        producer,
        start_time: Instant::now(),
        started_at: Utc::now(),
    });

    let app = Router::new()
        .route("/", routing::get(root))
        .route("/status", routing::get(status))
        .route("/webhook/{provider}", routing::post(handle_webhook))
        .with_state(state);

    info!("Listening on {}", bind_address);
    info!("Using config at {:?}", config_path);
    let listener = tokio::net::TcpListener::bind(bind_address).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
