//! Director (C5): decides what a request should happen to, without itself
//! performing any I/O.
//!
//! Runs, step for step: host validation, backend lookup, the
//! internal-connect-mode short circuit, node selection (with sticky-cookie
//! bias), inbound ACL evaluation, and finally the statistics bump that only
//! happens once a node has actually been committed to.

use actix_web::HttpRequest;
use reqwest::header::HeaderMap;
use uuid::Uuid;

use crate::acl_engine;
use crate::models::topology::{ConnectMode, Listener};
use crate::models::verdict::Verdict;
use crate::resolver::VariableContext;
use crate::services::balancer::{self, BalancerFactory, BalancerStatus, SelectOutcome};

/// Strips a `:port` suffix from a `Host` header value for bare hostname
/// comparison.
pub fn strip_host_port(host: &str) -> &str {
    host.split(':').next().unwrap_or(host)
}

fn sticky_cookie_value(req: &HttpRequest) -> Option<Uuid> {
    req.cookie("stky")
        .and_then(|c| Uuid::parse_str(c.value()).ok())
}

fn header_or_dash<'a>(req: &'a HttpRequest, name: &str) -> &'a str {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

/// Runs the director over a single request. `headers` is the mutable,
/// already-cloned copy of the inbound headers that will be forwarded
/// upstream on success; ACL actions mutate it directly.
pub fn direct(listener: &Listener, req: &HttpRequest, headers: &mut HeaderMap) -> Verdict {
    listener.statistics.clients_connects_add(1);

    let host_header = req.connection_info().host().to_string();
    let session_cookie = req
        .cookie("mercid")
        .map(|c| c.value().to_string())
        .unwrap_or_else(|| "-".to_string());
    log::info!(
        "director: clientip={} host={} method={} url={} proto={} content_length={} referer={} user_agent={} session={}",
        req.connection_info().realip_remote_addr().unwrap_or(""),
        host_header,
        req.method(),
        req.uri(),
        req.connection_info().scheme(),
        header_or_dash(req, "content-length"),
        header_or_dash(req, "referer"),
        header_or_dash(req, "user-agent"),
        session_cookie
    );

    if host_header.is_empty() {
        return Verdict::Error {
            backend: "unknown".to_string(),
            code: 400,
            message: "Invalid request - no host was supplied".to_string(),
        };
    }

    let stripped_host = strip_host_port(&host_header).to_string();

    let backend = match listener.find_backend_by_host(&stripped_host) {
        Some(b) => b,
        None => {
            log::warn!(
                "director: no backend for host={}, known hosts={:?}",
                stripped_host,
                listener.find_all_hostnames()
            );
            return Verdict::Error {
                backend: stripped_host,
                code: 503,
                message: "Service Unavailable - no backend found".to_string(),
            };
        }
    };

    if backend.connect_mode == ConnectMode::Internal {
        return Verdict::Internal {
            backend: backend.name.clone(),
            host: stripped_host,
        };
    }

    let sticky = if backend.balance_mode.is_sticky() {
        sticky_cookie_value(req)
    } else {
        None
    };

    let lb = BalancerFactory::create(backend.balance_mode.base_strategy());
    let client_ip = req.connection_info().realip_remote_addr().map(String::from);
    let node = match balancer::select_node(lb.as_ref(), &backend.nodes, client_ip.as_deref(), sticky) {
        SelectOutcome::Selected(node) => node,
        SelectOutcome::Unavailable(BalancerStatus::Maintenance) => {
            return Verdict::Maintenance {
                backend: backend.name.clone(),
                message: "Service Unavailable - backend under maintenance".to_string(),
            };
        }
        SelectOutcome::Unavailable(BalancerStatus::NoNodes) => {
            return Verdict::Error {
                backend: backend.name.clone(),
                code: 503,
                message: "Service Unavailable - no backend available".to_string(),
            };
        }
    };

    let ctx = VariableContext {
        listener,
        node: Some(node),
        request: req,
    };

    let (allow_count, deny_count) = acl_engine::count_actions(&backend.inbound_acls);
    let hits = acl_engine::process(&backend.inbound_acls, headers, &ctx);
    if allow_count > 0 && deny_count > 0 {
        log::warn!(
            "director: backend '{}' configures both ALLOW and DENY inbound ACLs; proceeding as allow-only",
            backend.name
        );
    }

    match acl_engine::decide(allow_count, deny_count, hits) {
        acl_engine::Decision::DenyNoAllowMatch => {
            return Verdict::Error {
                backend: backend.name.clone(),
                code: 403,
                message: "Access denied - does not match ALLOW ACL".to_string(),
            };
        }
        acl_engine::Decision::DenyMatchedDeny => {
            return Verdict::Error {
                backend: backend.name.clone(),
                code: 403,
                message: "Access denied - matched DENY ACL".to_string(),
            };
        }
        acl_engine::Decision::Allow => {}
    }

    node.statistics.connects_add(1);
    node.statistics.connected_add(1);
    node.statistics.rx_add(estimate_request_size(req, headers));

    Verdict::Forward {
        backend: backend.name.clone(),
        node_id: node.id,
        scheme: match backend.connect_mode {
            ConnectMode::Http => "http".to_string(),
            ConnectMode::Https => "https".to_string(),
            ConnectMode::Internal => unreachable!("internal mode short-circuits above"),
        },
    }
}

/// Rough serialized-request size used for the node's RX counter, added
/// unconditionally on a successful pass through the director.
fn estimate_request_size(req: &HttpRequest, headers: &HeaderMap) -> u64 {
    let request_line = format!("{} {} HTTP/1.1\r\n", req.method(), req.uri());
    let header_bytes: usize = headers
        .iter()
        .map(|(k, v)| k.as_str().len() + v.len() + 4)
        .sum();
    (request_line.len() + header_bytes + 2) as u64
}
