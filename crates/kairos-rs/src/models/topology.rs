//! The listener/backend/node arena that a loaded configuration compiles into.
//!
//! A [`Topology`] is the unit of hot reload: the whole arena is built once
//! from a [`crate::models::settings::Settings`] document and then swapped in
//! behind an `Arc` (see [`crate::config::hot_reload`]). Nothing in the proxy
//! pipeline ever mutates a `Topology` in place.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use uuid::Uuid;

use crate::models::acl::AclRule;

/// HTTP major version a listener speaks to clients.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HttpProto {
    One,
    Two,
}

impl Default for HttpProto {
    fn default() -> Self {
        Self::Two
    }
}

/// Whether a listener terminates TLS.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListenMode {
    Http,
    Https,
}

/// How the director should forward to a selected backend.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectMode {
    Http,
    Https,
    /// Short-circuits the director before any node is selected; see
    /// [`crate::director`].
    Internal,
}

/// Strategy used by the balancer to pick a node within a backend.
///
/// Mirrors the historical `BalanceMode` string field: a mode containing the
/// substring `sticky` enables sticky-cookie biasing regardless of which
/// underlying strategy it names (e.g. `"sticky-round-robin"`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BalanceMode {
    RoundRobin,
    LeastConnections,
    Random,
    Weighted,
    IpHash,
    StickyRoundRobin,
    StickyLeastConnections,
    StickyRandom,
    StickyWeighted,
    StickyIpHash,
}

impl Default for BalanceMode {
    fn default() -> Self {
        Self::RoundRobin
    }
}

impl BalanceMode {
    /// True when this mode carries sticky-cookie affinity.
    pub fn is_sticky(&self) -> bool {
        matches!(
            self,
            BalanceMode::StickyRoundRobin
                | BalanceMode::StickyLeastConnections
                | BalanceMode::StickyRandom
                | BalanceMode::StickyWeighted
                | BalanceMode::StickyIpHash
        )
    }

    /// The non-sticky strategy this mode delegates node selection to.
    pub fn base_strategy(&self) -> BaseStrategy {
        match self {
            BalanceMode::RoundRobin | BalanceMode::StickyRoundRobin => BaseStrategy::RoundRobin,
            BalanceMode::LeastConnections | BalanceMode::StickyLeastConnections => {
                BaseStrategy::LeastConnections
            }
            BalanceMode::Random | BalanceMode::StickyRandom => BaseStrategy::Random,
            BalanceMode::Weighted | BalanceMode::StickyWeighted => BaseStrategy::Weighted,
            BalanceMode::IpHash | BalanceMode::StickyIpHash => BaseStrategy::IpHash,
        }
    }
}

/// The underlying selection algorithm, stripped of sticky-cookie concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseStrategy {
    RoundRobin,
    LeastConnections,
    Random,
    Weighted,
    IpHash,
}

/// Static error/maintenance page content served by [`crate::response_modifier`].
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Page {
    /// Raw HTML body, may contain `###VAR###` tokens.
    pub content: String,
    /// Serve this page whenever the upstream status is >= this threshold.
    /// `0` disables threshold-triggered substitution (the page only covers
    /// explicit error/maintenance verdicts).
    #[serde(default = "default_error_threshold")]
    pub status_threshold: u16,
}

fn default_error_threshold() -> u16 {
    500
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Per-node atomic counters, updated without any lock from the hot path.
#[derive(Debug, Default)]
pub struct NodeStatistics {
    pub connects: AtomicU64,
    pub currently_connected: AtomicI64,
    pub rx_bytes: AtomicU64,
    pub tx_bytes: AtomicU64,
}

impl NodeStatistics {
    pub fn connects_add(&self, n: u64) {
        self.connects.fetch_add(n, Ordering::Relaxed);
    }

    pub fn connected_add(&self, delta: i64) {
        self.currently_connected.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn rx_add(&self, n: u64) {
        self.rx_bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn tx_add(&self, n: u64) {
        self.tx_bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> NodeStatsSnapshot {
        NodeStatsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            currently_connected: self.currently_connected.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy)]
pub struct NodeStatsSnapshot {
    pub connects: u64,
    pub currently_connected: i64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Health status of a [`BackendNode`], mutated only by the health-check
/// collaborator (out of scope for this crate; see `listeners.*.health_probe`
/// in the on-disk config for the one manual knob this crate exposes itself,
/// and `routes::management::set_node_health` for the runtime hook a real
/// prober would call).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeHealth {
    Up = 0,
    Down = 1,
    Maintenance = 2,
}

impl NodeHealth {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => NodeHealth::Down,
            2 => NodeHealth::Maintenance,
            _ => NodeHealth::Up,
        }
    }
}

/// A single upstream instance behind a [`Backend`].
#[derive(Debug)]
pub struct BackendNode {
    pub id: Uuid,
    pub ip: IpAddr,
    pub port: u16,
    pub statistics: NodeStatistics,
    health: std::sync::atomic::AtomicU8,
}

impl BackendNode {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            id: Uuid::new_v4(),
            ip,
            port,
            statistics: NodeStatistics::default(),
            health: std::sync::atomic::AtomicU8::new(NodeHealth::Up as u8),
        }
    }

    pub fn authority(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn health(&self) -> NodeHealth {
        NodeHealth::from_u8(self.health.load(Ordering::Relaxed))
    }

    pub fn set_health(&self, health: NodeHealth) {
        self.health.store(health as u8, Ordering::Relaxed);
    }
}

/// A logical service reachable under a given `Host` header.
#[derive(Debug)]
pub struct Backend {
    pub name: String,
    pub connect_mode: ConnectMode,
    pub balance_mode: BalanceMode,
    pub inbound_acls: Vec<AclRule>,
    pub outbound_acls: Vec<AclRule>,
    pub error_page: Option<Page>,
    pub maintenance_page: Option<Page>,
    pub nodes: Vec<BackendNode>,
}

impl Backend {
    pub fn node_by_id(&self, id: Uuid) -> Option<&BackendNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Global per-listener statistics (distinct from per-node statistics).
#[derive(Debug, Default)]
pub struct ListenerStatistics {
    pub client_connects: AtomicU64,
}

impl ListenerStatistics {
    pub fn clients_connects_add(&self, n: u64) {
        self.client_connects.fetch_add(n, Ordering::Relaxed);
    }
}

/// A bound address accepting inbound connections and routing them by `Host`.
#[derive(Debug)]
pub struct Listener {
    pub name: String,
    pub bind_ip: IpAddr,
    pub port: u16,
    pub mode: ListenMode,
    pub http_proto: HttpProto,
    /// Local address the outbound dialer should bind from; falls back to
    /// `bind_ip` when unset.
    pub source_ip: Option<IpAddr>,
    pub default_error_page: Option<Page>,
    pub default_maintenance_page: Option<Page>,
    pub statistics: ListenerStatistics,
    pub backends: ahash::HashMap<String, Backend>,
}

impl Listener {
    pub fn find_backend_by_host(&self, host: &str) -> Option<&Backend> {
        self.backends.get(host)
    }

    pub fn find_all_hostnames(&self) -> Vec<&str> {
        self.backends.keys().map(|s| s.as_str()).collect()
    }

    pub fn effective_source_ip(&self) -> IpAddr {
        self.source_ip.unwrap_or(self.bind_ip)
    }
}

/// The whole compiled arena; swapped atomically on reload.
#[derive(Debug, Default)]
pub struct Topology {
    pub listeners: Vec<Listener>,
}

impl Topology {
    pub fn listener_by_name(&self, name: &str) -> Option<&Listener> {
        self.listeners.iter().find(|l| l.name == name)
    }
}
