//! Health, readiness, and liveness endpoints.
//!
//! `/ready` is wired to the live [`Topology`](crate::models::topology::Topology)
//! rather than answering unconditionally: a gateway with zero listeners
//! compiled (e.g. config still loading, or a bad reload that somehow slipped
//! past validation) should fail its readiness probe even though the process
//! itself is alive and would pass `/live`.

use std::sync::Arc;
use std::time::Instant;

use actix_web::{web, HttpResponse, Result};
use once_cell::sync::Lazy;
use serde_json::json;

use crate::config::hot_reload::TopologyWatcher;

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

/// General health check: service status, version, and process uptime.
pub async fn health_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": STARTED_AT.elapsed().as_secs()
    })))
}

/// Kubernetes readiness probe: ready only once at least one listener has a
/// compiled topology behind it.
pub async fn readiness_check(watcher: web::Data<Arc<TopologyWatcher>>) -> Result<HttpResponse> {
    let topology = watcher.current_topology().await;
    if topology.listeners.is_empty() {
        return Ok(HttpResponse::ServiceUnavailable().json(json!({
            "status": "not_ready",
            "reason": "no listeners compiled into the current topology",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })));
    }

    Ok(HttpResponse::Ok().json(json!({
        "status": "ready",
        "listeners": topology.listeners.len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Kubernetes liveness probe. Only fails if the process itself cannot
/// respond at all, so this never does more than confirm that.
pub async fn liveness_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "alive",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub fn configure_health(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check))
        .route("/live", web::get().to(liveness_check));
}
