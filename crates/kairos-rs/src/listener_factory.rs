//! Listener Factory (C8): builds the outbound [`reqwest::Client`] a listener
//! uses to reach its backends, and the knobs that shape it.
//!
//! Pooled connections, bounded idle time, and timeout/TLS/HTTP2 knobs
//! tuned per listener rather than shared globally.

use std::net::IpAddr;
use std::time::Duration;

/// Per-listener outbound transport configuration.
#[derive(Debug, Clone)]
pub struct ListenerFactoryConfig {
    pub source_ip: Option<IpAddr>,
    pub http2: bool,
    /// Always honored as `true` in this implementation: upstream TLS
    /// certificate verification is skipped unconditionally. This is a
    /// known regression relative to a hardened proxy, carried forward
    /// deliberately rather than silently fixed -- see DESIGN.md.
    pub tls_insecure_skip_verify: bool,
    pub connect_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    pub idle_timeout: Duration,
    pub expect_continue_timeout: Duration,
    pub max_idle_conns_per_host: usize,
    pub proxy_from_env: bool,
}

impl Default for ListenerFactoryConfig {
    fn default() -> Self {
        Self {
            source_ip: None,
            http2: true,
            tls_insecure_skip_verify: true,
            connect_timeout: Duration::from_secs(10),
            tls_handshake_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(10),
            expect_continue_timeout: Duration::from_secs(1),
            max_idle_conns_per_host: 100,
            proxy_from_env: true,
        }
    }
}

/// Builds the `reqwest::Client` a listener will use for every backend it
/// forwards to. One client per listener, shared across all its backends and
/// nodes, rather than one client per node or per request.
pub fn build_client(config: &ListenerFactoryConfig) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .danger_accept_invalid_certs(config.tls_insecure_skip_verify)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.idle_timeout)
        .pool_max_idle_per_host(config.max_idle_conns_per_host)
        .use_rustls_tls();

    if !config.proxy_from_env {
        builder = builder.no_proxy();
    }

    if let Some(ip) = config.source_ip {
        builder = builder.local_address(ip);
    }

    if !config.http2 {
        builder = builder.http1_only();
    }

    builder.build()
}
