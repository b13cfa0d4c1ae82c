//! Progressive slow-down for the mutating routes.
//!
//! Each client gets `delay_after` free requests per window. Every request past
//! that is held back by `delay_ms` times the number of excess requests so far.
//! Requests are never rejected, only delayed.

use crate::config::RateLimit;
use crate::handler::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

pub struct SlowDown {
    /// Request counts per client
    windows: RwLock<HashMap<String, HitWindow>>,
    window: Duration,
    delay_after: u32,
    delay_step: Duration,
}

struct HitWindow {
    count: u32,
    started: Instant,
}

impl SlowDown {
    pub fn new(cfg: &RateLimit) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            window: Duration::from_secs(cfg.window_seconds),
            delay_after: cfg.delay_after,
            delay_step: Duration::from_millis(cfg.delay_ms),
        }
    }

    /// Records a request from `client` and returns how long it has to wait.
    pub async fn hit(&self, client: &str) -> Duration {
        let mut windows = self.windows.write().await;
        let now = Instant::now();

        let entry = windows.entry(client.to_string()).or_insert(HitWindow {
            count: 0,
            started: now,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.count = 0;
            entry.started = now;
        }

        entry.count = entry.count.saturating_add(1);
        self.delay_step * entry.count.saturating_sub(self.delay_after)
    }

    /// Drops windows that have expired.
    pub async fn cleanup(&self) {
        let mut windows = self.windows.write().await;
        let now = Instant::now();
        windows.retain(|_, entry| now.duration_since(entry.started) < self.window);
    }

    pub async fn tracked_clients(&self) -> usize {
        self.windows.read().await.len()
    }
}

/// The first `X-Forwarded-For` hop when behind a proxy, else the peer address.
pub fn client_key(req: &Request) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(client) = forwarded {
        return client.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn slow_down(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let client = client_key(&req);
    let delay = state.limiter.hit(&client).await;

    if !delay.is_zero() {
        tracing::warn!(client = %client, delay_ms = delay.as_millis() as u64, "slowing down client");
        tokio::time::sleep(delay).await;
    }

    next.run(req).await
}
