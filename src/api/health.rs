//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::notification::DispatcherStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub transport: String,
    pub directory: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisHealthResponse>,
}

#[derive(Debug, Serialize)]
pub struct RedisHealthResponse {
    pub status: String,
    pub connected: bool,
    pub reconnections: u32,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub dispatcher: DispatcherStatsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let redis = match state.redis_pool {
        Some(ref pool) => {
            let connected = pool.ping().await.is_ok();
            Some(RedisHealthResponse {
                status: if connected { "connected" } else { "disconnected" }.to_string(),
                connected,
                reconnections: pool.reconnections(),
            })
        }
        None => None,
    };

    let degraded = redis.as_ref().is_some_and(|r| !r.connected);
    let status = if degraded { "degraded" } else { "healthy" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        transport: state.dispatcher.transport_name().to_string(),
        directory: state.settings.directory.backend.clone(),
        redis,
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        uptime_seconds: state.start_time.elapsed().as_secs(),
        dispatcher: state.dispatcher.stats(),
    })
}
