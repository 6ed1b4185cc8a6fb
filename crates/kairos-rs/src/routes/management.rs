//! Runtime management endpoints: on-demand configuration reload and a
//! snapshot of the current topology.
//!
//! JSON request/response structs behind an actix attribute-macro handler
//! per operation: trigger a reload, inspect what is currently loaded, and
//! report a node's health back to the live topology.

use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::hot_reload::TopologyWatcher;
use crate::models::error::GatewayError;
use crate::models::topology::NodeHealth;

#[derive(Serialize)]
pub struct ReloadResponse {
    pub success: bool,
    pub message: String,
    pub version: Option<u64>,
}

#[derive(Serialize)]
pub struct BackendSummary {
    pub name: String,
    pub node_count: usize,
}

#[derive(Serialize)]
pub struct ListenerSummary {
    pub name: String,
    pub bind: String,
    pub backends: Vec<BackendSummary>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub listeners: Vec<ListenerSummary>,
}

#[post("/manage/reload")]
pub async fn reload(watcher: web::Data<Arc<TopologyWatcher>>) -> Result<HttpResponse, GatewayError> {
    match watcher.manual_reload().await {
        Ok(update) => Ok(HttpResponse::Ok().json(ReloadResponse {
            success: true,
            message: "configuration reloaded".to_string(),
            version: Some(update.version),
        })),
        Err(e) => Err(GatewayError::Config { message: e }),
    }
}

#[get("/manage/status")]
pub async fn status(watcher: web::Data<Arc<TopologyWatcher>>) -> impl Responder {
    let topology = watcher.current_topology().await;
    let listeners = topology
        .listeners
        .iter()
        .map(|listener| ListenerSummary {
            name: listener.name.clone(),
            bind: format!("{}:{}", listener.bind_ip, listener.port),
            backends: listener
                .backends
                .values()
                .map(|backend| BackendSummary {
                    name: backend.name.clone(),
                    node_count: backend.nodes.len(),
                })
                .collect(),
        })
        .collect();

    HttpResponse::Ok().json(StatusResponse { listeners })
}

#[derive(Deserialize)]
pub struct SetNodeHealthRequest {
    pub health: String,
}

#[derive(Serialize)]
pub struct SetNodeHealthResponse {
    pub success: bool,
    pub node_id: Uuid,
    pub health: String,
}

fn parse_health(raw: &str) -> Option<NodeHealth> {
    match raw {
        "up" => Some(NodeHealth::Up),
        "down" => Some(NodeHealth::Down),
        "maintenance" => Some(NodeHealth::Maintenance),
        _ => None,
    }
}

/// Entry point a real health-check collaborator would call to report a
/// node transitioning up/down/maintenance. Mutates the live topology's
/// atomics directly;
/// no reload is involved, since node health is not part of the on-disk
/// configuration document.
#[post("/manage/backends/{backend}/nodes/{node_id}/health")]
pub async fn set_node_health(
    watcher: web::Data<Arc<TopologyWatcher>>,
    path: web::Path<(String, Uuid)>,
    body: web::Json<SetNodeHealthRequest>,
) -> Result<HttpResponse, GatewayError> {
    let (backend_name, node_id) = path.into_inner();
    let health = parse_health(&body.health).ok_or_else(|| GatewayError::Config {
        message: format!("unknown health value '{}', expected up/down/maintenance", body.health),
    })?;

    let topology = watcher.current_topology().await;
    let node = topology
        .listeners
        .iter()
        .find_map(|l| l.backends.get(&backend_name))
        .and_then(|b| b.node_by_id(node_id));

    match node {
        Some(node) => {
            node.set_health(health);
            Ok(HttpResponse::Ok().json(SetNodeHealthResponse {
                success: true,
                node_id,
                health: body.health.clone(),
            }))
        }
        None => Err(GatewayError::Config {
            message: format!("no node '{node_id}' on backend '{backend_name}'"),
        }),
    }
}

pub fn configure_management(cfg: &mut web::ServiceConfig) {
    cfg.service(reload).service(status).service(set_node_health);
}
