//! Glue layer wiring Director (C5) -> Transport (C6) -> Response Modifier
//! (C7) into the single async call an actix-web handler invokes per
//! request.
//!
//! One linear function, sequential phases, early returns -- split across
//! three named components per the proxy's own module boundaries, rather
//! than inlined into one method.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web::Bytes, HttpRequest, HttpResponse};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

use crate::config::hot_reload::TopologyWatcher;
use crate::director;
use crate::models::topology::{Listener, ListenMode};
use crate::models::verdict::Verdict;
use crate::response_modifier;
use crate::transport::{self, TransportOutcome};

/// Session ID cookie name, added by the session-ID hook whenever a request
/// arrives without one.
const SESSION_COOKIE_NAME: &str = "mercid";

/// Headers stripped before forwarding upstream: the usual hop-by-hop
/// exclusion list.
const STRIPPED_REQUEST_HEADERS: &[&str] = &["host", "connection", "upgrade", "proxy-connection"];

pub struct ProxyHandler {
    /// The live topology is fetched fresh per request from the watcher
    /// rather than snapshotted at construction time, so a reload takes
    /// effect for the very next request.
    pub watcher: Arc<TopologyWatcher>,
    /// One outbound client per listener, keyed by listener name, built by
    /// the Listener Factory (C8) from each listener's own transport
    /// settings. `default_client` backstops a listener added after startup
    /// with no matching entry yet.
    pub clients: ahash::HashMap<String, reqwest::Client>,
    pub default_client: reqwest::Client,
    pub timeout: Duration,
}

impl ProxyHandler {
    pub fn new(
        watcher: Arc<TopologyWatcher>,
        clients: ahash::HashMap<String, reqwest::Client>,
        default_client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            watcher,
            clients,
            default_client,
            timeout,
        }
    }

    fn client_for(&self, listener_name: &str) -> &reqwest::Client {
        self.clients.get(listener_name).unwrap_or(&self.default_client)
    }

    pub async fn handle(&self, req: HttpRequest, body: Bytes) -> HttpResponse {
        let topology = self.watcher.current_topology().await;
        let local_port = req.app_config().local_addr().port();
        let listener = match topology.listeners.iter().find(|l| l.port == local_port) {
            Some(l) => l,
            None => {
                log::error!("proxy: no listener bound to the port this request arrived on");
                return transport::render_status_page(500, "Internal Server Error - no listener configured");
            }
        };

        let mut out_headers = actix_headers_to_reqwest(&req);
        let verdict = director::direct(listener, &req, &mut out_headers);

        let outcome = transport::execute(
            &verdict,
            listener,
            self.client_for(&listener.name),
            &req,
            out_headers,
            body,
            self.timeout,
        )
        .await;

        let mut response = match outcome {
            TransportOutcome::Synthesized {
                default_response,
                backend,
                kind,
                status,
                message,
            } => {
                let backend_ref = listener.find_backend_by_host(&backend);
                response_modifier::modify_synthesized(
                    default_response,
                    backend_ref,
                    listener,
                    kind,
                    status,
                    &message,
                    &req,
                )
            }
            TransportOutcome::Upstream {
                response,
                backend,
                node_id,
            } => match listener.find_backend_by_host(&backend) {
                Some(backend) => response_modifier::modify(response, backend, node_id, listener, &req).await,
                None => {
                    log::error!("proxy: backend '{backend}' vanished between transport and response modifier");
                    transport::render_status_page(502, "Bad Gateway - backend configuration changed mid-flight")
                }
            },
        };

        apply_session_id_hook(&mut response, &req, listener);
        response
    }
}

/// Stamps a fresh `mercid` session cookie on the way out whenever the
/// request arrived without one. HttpOnly, Path=/, 24h expiry, and Secure
/// when the owning listener terminates TLS.
fn apply_session_id_hook(response: &mut HttpResponse, req: &HttpRequest, listener: &Listener) {
    if req.cookie(SESSION_COOKIE_NAME).is_some() {
        return;
    }

    let opaque = Uuid::new_v4();
    let expires = (chrono::Utc::now() + chrono::Duration::hours(24)).format("%a, %d %b %Y %H:%M:%S GMT");
    let secure = if listener.mode == ListenMode::Https { "; Secure" } else { "" };
    let value = format!("{SESSION_COOKIE_NAME}={opaque}; Path=/; Expires={expires}; HttpOnly{secure}");

    if let Ok(header_value) = actix_web::http::header::HeaderValue::from_str(&value) {
        response
            .headers_mut()
            .append(actix_web::http::header::SET_COOKIE, header_value);
    }
}

fn actix_headers_to_reqwest(req: &HttpRequest) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in req.headers().iter() {
        let lower = name.as_str().to_ascii_lowercase();
        if STRIPPED_REQUEST_HEADERS.contains(&lower.as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            headers.append(name, value);
        }
    }
    if !headers.contains_key(reqwest::header::USER_AGENT) {
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static("kairos-rs/0.1.0"),
        );
    }
    headers
}

/// Quick, dependency-light check of whether a [`Verdict`] represents a
/// terminal failure (used by callers that only care about success/failure,
/// e.g. metrics).
pub fn is_failure(verdict: &Verdict) -> bool {
    matches!(verdict, Verdict::Error { .. } | Verdict::Maintenance { .. })
}
