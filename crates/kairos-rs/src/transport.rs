//! Transport (C6): executes a [`Verdict`], either rendering a synthesized
//! status page directly or performing the actual upstream round trip.
//!
//! Synthesized pages carry a fixed HTML shape and a no-cache header triplet,
//! and every round trip logs a structured line on completion or failure.
//! Synthesized pages are handed to [`crate::response_modifier`] as a
//! candidate, not a final answer -- a backend or listener error/maintenance
//! page may still replace the body before it reaches the client.

use std::time::{Duration, Instant};

use actix_web::http::StatusCode;
use actix_web::{web::Bytes, HttpRequest, HttpResponse};
use reqwest::header::HeaderMap;

use crate::models::topology::Listener;
use crate::models::verdict::Verdict;

/// Which branch of the verdict produced a synthesized page, used by the
/// response modifier to pick the right page-substitution rule (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesizedKind {
    Error,
    Maintenance,
    Internal,
}

/// What the transport produced. `Synthesized` carries the default page the
/// transport itself would render, plus enough context for the response
/// modifier to look up and substitute a configured page instead.
/// `Upstream` carries a live response onward unmodified.
pub enum TransportOutcome {
    Synthesized {
        default_response: HttpResponse,
        backend: String,
        kind: SynthesizedKind,
        status: u16,
        message: String,
    },
    Upstream {
        response: reqwest::Response,
        backend: String,
        node_id: uuid::Uuid,
    },
}

/// Renders the proxy's own synthesized error/maintenance/internal page, a
/// fixed canned-page template with a trailing "generated by" footer.
pub fn render_status_page(code: u16, message: &str) -> HttpResponse {
    let (code, status) = match StatusCode::from_u16(code) {
        Ok(status) => (code, status),
        Err(_) => (502, StatusCode::BAD_GATEWAY),
    };
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let message = html_escape(message);
    let body = format!(
        "<html><head><title>{code} {message}</title></head><body><h1>{code} {message}</h1><br>\
         - Generated by Kairos at {timestamp}</body></html>"
    );
    HttpResponse::build(status)
        .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
        .insert_header(("Pragma", "no-cache"))
        .insert_header(("Expires", "0"))
        .content_type("text/html; charset=utf-8")
        .body(body)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn build_target_url(scheme: &str, authority: &str, req: &HttpRequest) -> String {
    match req.uri().path_and_query() {
        Some(pq) => format!("{scheme}://{authority}{pq}"),
        None => format!("{scheme}://{authority}/"),
    }
}

/// Runs `verdict` to completion. `out_headers` is the (already ACL-mutated)
/// header set to forward upstream on a [`Verdict::Forward`].
pub async fn execute(
    verdict: &Verdict,
    listener: &Listener,
    client: &reqwest::Client,
    req: &HttpRequest,
    out_headers: HeaderMap,
    body: Bytes,
    timeout: Duration,
) -> TransportOutcome {
    match verdict {
        Verdict::Error {
            backend,
            code,
            message,
        } => {
            log::error!("transport: error verdict backend={backend} code={code} message={message}");
            TransportOutcome::Synthesized {
                default_response: render_status_page(*code, message),
                backend: backend.clone(),
                kind: SynthesizedKind::Error,
                status: *code,
                message: message.clone(),
            }
        }
        Verdict::Maintenance { backend, message } => {
            log::warn!("transport: maintenance verdict backend={backend} message={message}");
            TransportOutcome::Synthesized {
                default_response: render_status_page(503, message),
                backend: backend.clone(),
                kind: SynthesizedKind::Maintenance,
                status: 503,
                message: message.clone(),
            }
        }
        Verdict::Internal { backend, host } => {
            log::info!("transport: internal verdict backend={backend} host={host}");
            let message = "OK".to_string();
            TransportOutcome::Synthesized {
                default_response: render_status_page(200, &message),
                backend: backend.clone(),
                kind: SynthesizedKind::Internal,
                status: 200,
                message,
            }
        }
        Verdict::Forward {
            backend,
            node_id,
            scheme,
        } => {
            let node = match listener
                .find_backend_by_host(backend)
                .and_then(|b| b.node_by_id(*node_id))
            {
                Some(n) => n,
                None => {
                    log::error!("transport: node {node_id} vanished for backend {backend}");
                    return TransportOutcome::Synthesized {
                        default_response: render_status_page(
                            500,
                            "backend node no longer present",
                        ),
                        backend: backend.clone(),
                        kind: SynthesizedKind::Error,
                        status: 500,
                        message: "backend node no longer present".to_string(),
                    };
                }
            };

            let url = build_target_url(scheme, &node.authority(), req);
            let method =
                reqwest::Method::from_bytes(req.method().as_str().as_bytes()).unwrap_or(reqwest::Method::GET);

            let started = Instant::now();
            let result = client
                .request(method, &url)
                .headers(out_headers)
                .body(body.to_vec())
                .timeout(timeout)
                .send()
                .await;

            match result {
                Ok(response) => {
                    log::info!(
                        "transport: roundtrip backend={backend} node={node_id} url={url} status={} elapsed_ms={}",
                        response.status(),
                        started.elapsed().as_millis()
                    );
                    TransportOutcome::Upstream {
                        response,
                        backend: backend.clone(),
                        node_id: *node_id,
                    }
                }
                Err(err) => {
                    log::error!("transport: roundtrip failed backend={backend} node={node_id} url={url} error={err}");
                    node.statistics.connected_add(-1);
                    let message = err.to_string();
                    TransportOutcome::Synthesized {
                        default_response: render_status_page(500, &message),
                        backend: backend.clone(),
                        kind: SynthesizedKind::Error,
                        status: 500,
                        message,
                    }
                }
            }
        }
    }
}
