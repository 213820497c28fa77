pub mod api;
pub mod db;
pub mod error;
pub mod event;
pub mod message;
pub mod pipeline;
pub mod queue;
pub mod signature;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use db::registry::OrganizationRegistry;
use queue::QueueProducer;

/// Gateway configuration, loaded from TOML. Environment variables override
/// individual fields at startup; the webhook secret may come from either.
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub bind_address: Option<String>,
    pub database_path: Option<String>,
    pub webhook_secret: Option<String>,
    pub queue: QueueConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    pub generate_pull_request_topic: String,
}

/// Process-wide state shared across deliveries. The registry and producer
/// are the only long-lived collaborators; everything else is per-delivery.
pub struct AppState {
    pub webhook_secret: String,
    pub registry: Arc<dyn OrganizationRegistry>,
    pub producer: QueueProducer,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

pub type SharedState = Arc<AppState>;
