use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use axum::{extract::State, routing::get, Json, Router};
use lazy_static::lazy_static;
use serde::Serialize;

use crate::error::BotResult;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(14 * 60);

lazy_static! {
    static ref STARTED_AT: Instant = Instant::now();
}

/// Gateway readiness shared between the event handler and the health routes.
#[derive(Debug, Clone, Default)]
pub struct BotStatus(Arc<AtomicBool>);

impl BotStatus {
    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::Relaxed);
    }

    pub fn is_online(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    /// Seconds since the process started.
    pub uptime: f64,
    pub timestamp: String,
    pub bot_status: &'static str,
}

async fn health(State(status): State<BotStatus>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "healthy",
        uptime: STARTED_AT.elapsed().as_secs_f64(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        bot_status: if status.is_online() { "online" } else { "offline" },
    })
}

pub fn router(status: BotStatus) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .with_state(status)
}

pub async fn serve(port: u16, status: BotStatus) -> BotResult<()> {
    lazy_static::initialize(&STARTED_AT);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Health server running on port {}", port);
    tracing::info!("Health endpoint: http://localhost:{}/health", port);

    axum::serve(listener, router(status)).await?;
    Ok(())
}

/// Pings `{base_url}/health` periodically so free hosting tiers keep the process awake.
pub async fn keep_alive(base_url: String) {
    let client = reqwest::Client::new();
    let url = format!("{}/health", base_url);
    let mut interval = tokio::time::interval(KEEP_ALIVE_INTERVAL);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        match client.get(&url).send().await {
            Ok(response) => tracing::info!("Self-ping successful: {}", response.status()),
            Err(why) => tracing::error!("Self-ping failed: {}", why),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn report_reflects_gateway_status() {
        let status = BotStatus::default();

        let Json(report) = health(State(status.clone())).await;
        assert_eq!(report.status, "healthy");
        assert_eq!(report.bot_status, "offline");

        status.set_online(true);
        let Json(report) = health(State(status)).await;
        assert_eq!(report.bot_status, "online");
        assert!(report.uptime >= 0.0);
    }

    #[tokio::test]
    async fn report_serializes_expected_fields() {
        let Json(report) = health(State(BotStatus::default())).await;
        let value = serde_json::to_value(&report).unwrap();

        for field in ["status", "uptime", "timestamp", "bot_status"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert!(chrono::DateTime::parse_from_rfc3339(value["timestamp"].as_str().unwrap()).is_ok());
    }
}
