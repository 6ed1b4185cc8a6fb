//! Prometheus-compatible metrics endpoint.
//!
//! Renders the atomic counters already living on the topology arena
//! (per-listener client connects, per-node connects/currently-connected/
//! RX/TX) rather than maintaining a second, parallel metrics store --
//! the topology is the source of truth these numbers come from.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use actix_web::{web, HttpResponse, Result};

use crate::config::hot_reload::TopologyWatcher;

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Renders every listener's and every node's counters as Prometheus text.
pub async fn metrics_endpoint(watcher: web::Data<Arc<TopologyWatcher>>) -> Result<HttpResponse> {
    let topology = watcher.current_topology().await;
    let mut out = String::new();

    out.push_str("# HELP kairos_listener_client_connects_total Clients accepted by a listener\n");
    out.push_str("# TYPE kairos_listener_client_connects_total counter\n");
    for listener in &topology.listeners {
        out.push_str(&format!(
            "kairos_listener_client_connects_total{{listener=\"{}\"}} {}\n",
            escape_label(&listener.name),
            listener.statistics.client_connects.load(Ordering::Relaxed)
        ));
    }

    out.push_str("\n# HELP kairos_node_connects_total Connections handed to a backend node\n");
    out.push_str("# TYPE kairos_node_connects_total counter\n");
    out.push_str("\n# HELP kairos_node_currently_connected In-flight connections on a backend node\n");
    out.push_str("# TYPE kairos_node_currently_connected gauge\n");
    out.push_str("\n# HELP kairos_node_rx_bytes_total Bytes received from clients and sent to a node\n");
    out.push_str("# TYPE kairos_node_rx_bytes_total counter\n");
    out.push_str("\n# HELP kairos_node_tx_bytes_total Bytes sent to clients from a node's responses\n");
    out.push_str("# TYPE kairos_node_tx_bytes_total counter\n");
    out.push_str("\n# HELP kairos_node_health Node health as reported by the health-check collaborator (0=up, 1=down, 2=maintenance)\n");
    out.push_str("# TYPE kairos_node_health gauge\n");

    for listener in &topology.listeners {
        for backend in listener.backends.values() {
            for node in &backend.nodes {
                let snap = node.statistics.snapshot();
                let labels = format!(
                    "listener=\"{}\",backend=\"{}\",node=\"{}\"",
                    escape_label(&listener.name),
                    escape_label(&backend.name),
                    node.id
                );
                out.push_str(&format!(
                    "kairos_node_connects_total{{{labels}}} {}\n",
                    snap.connects
                ));
                out.push_str(&format!(
                    "kairos_node_currently_connected{{{labels}}} {}\n",
                    snap.currently_connected
                ));
                out.push_str(&format!(
                    "kairos_node_rx_bytes_total{{{labels}}} {}\n",
                    snap.rx_bytes
                ));
                out.push_str(&format!(
                    "kairos_node_tx_bytes_total{{{labels}}} {}\n",
                    snap.tx_bytes
                ));
                out.push_str(&format!(
                    "kairos_node_health{{{labels}}} {}\n",
                    node.health() as u8
                ));
            }
        }
    }

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(out))
}

pub fn configure_metrics(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_endpoint));
}
