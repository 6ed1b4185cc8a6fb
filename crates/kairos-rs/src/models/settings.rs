//! On-disk configuration shape and its compilation into a [`Topology`].
//!
//! `Settings` is what gets deserialized from JSON; it favors
//! JSON-friendly primitives (plain `String`s for addresses) over the
//! richer in-memory [`crate::models::topology`] types, which carry atomics
//! and resolved `IpAddr`s that have no sensible `Deserialize` impl.
//! [`Settings::compile`] performs the one-time conversion.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::models::acl::AclRule;
use crate::models::topology::{
    BackendNode, BalanceMode, ConnectMode, HttpProto, ListenMode, Listener, ListenerStatistics,
    Page, Topology,
};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PageSettings {
    pub content: String,
    #[serde(default = "default_threshold")]
    pub status_threshold: u16,
}

fn default_threshold() -> u16 {
    500
}

impl From<PageSettings> for Page {
    fn from(p: PageSettings) -> Self {
        Page {
            content: p.content,
            status_threshold: p.status_threshold,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BackendNodeSettings {
    pub ip: IpAddr,
    pub port: u16,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BackendSettings {
    /// The `Host` header value this backend answers for.
    pub host: String,
    #[serde(default)]
    pub connect_mode: ConnectMode,
    #[serde(default)]
    pub balance_mode: BalanceMode,
    #[serde(default)]
    pub inbound_acls: Vec<AclRule>,
    #[serde(default)]
    pub outbound_acls: Vec<AclRule>,
    #[serde(default)]
    pub error_page: Option<PageSettings>,
    #[serde(default)]
    pub maintenance_page: Option<PageSettings>,
    pub nodes: Vec<BackendNodeSettings>,
}

impl Default for ConnectMode {
    fn default() -> Self {
        ConnectMode::Http
    }
}

impl BackendSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("backend host must not be empty".to_string());
        }
        if self.nodes.is_empty() && self.connect_mode != ConnectMode::Internal {
            return Err(format!(
                "backend '{}' must declare at least one node unless connect_mode is internal",
                self.host
            ));
        }
        for acl in self.inbound_acls.iter().chain(self.outbound_acls.iter()) {
            if acl.header_name.is_none() && acl.cookie_name.is_none() {
                return Err(format!(
                    "backend '{}' has an ACL rule with neither header_name nor cookie_name set",
                    self.host
                ));
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ListenerSettings {
    pub name: String,
    pub bind_ip: IpAddr,
    pub port: u16,
    #[serde(default = "default_listen_mode")]
    pub mode: ListenMode,
    #[serde(default)]
    pub http_proto: HttpProto,
    #[serde(default)]
    pub source_ip: Option<IpAddr>,
    #[serde(default)]
    pub default_error_page: Option<PageSettings>,
    #[serde(default)]
    pub default_maintenance_page: Option<PageSettings>,
    pub backends: Vec<BackendSettings>,
}

fn default_listen_mode() -> ListenMode {
    ListenMode::Http
}

impl ListenerSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("listener name must not be empty".to_string());
        }
        if self.port == 0 {
            return Err(format!("listener '{}' has an invalid port", self.name));
        }
        let mut seen = std::collections::HashSet::new();
        for backend in &self.backends {
            backend.validate()?;
            if !seen.insert(backend.host.clone()) {
                return Err(format!(
                    "listener '{}' declares backend host '{}' more than once",
                    self.name, backend.host
                ));
            }
        }
        Ok(())
    }
}

/// The complete gateway configuration document.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Settings {
    /// Configuration schema version for compatibility checking.
    pub version: u8,
    pub listeners: Vec<ListenerSettings>,
}

impl Settings {
    pub fn validate(&self) -> Result<(), String> {
        if self.listeners.is_empty() {
            return Err("at least one listener must be configured".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for listener in &self.listeners {
            listener.validate()?;
            let key = (listener.bind_ip, listener.port);
            if !seen.insert(key) {
                return Err(format!(
                    "bind address {}:{} is used by more than one listener",
                    listener.bind_ip, listener.port
                ));
            }
        }
        Ok(())
    }

    /// Compiles this document into a [`Topology`] arena. Assumes
    /// [`Settings::validate`] has already been called.
    pub fn compile(self) -> Topology {
        let listeners = self
            .listeners
            .into_iter()
            .map(|l| {
                let backends = l
                    .backends
                    .into_iter()
                    .map(|b| {
                        let nodes = b
                            .nodes
                            .into_iter()
                            .map(|n| BackendNode::new(n.ip, n.port))
                            .collect();
                        (
                            b.host.clone(),
                            crate::models::topology::Backend {
                                name: b.host,
                                connect_mode: b.connect_mode,
                                balance_mode: b.balance_mode,
                                inbound_acls: b.inbound_acls,
                                outbound_acls: b.outbound_acls,
                                error_page: b.error_page.map(Page::from),
                                maintenance_page: b.maintenance_page.map(Page::from),
                                nodes,
                            },
                        )
                    })
                    .collect::<ahash::HashMap<_, _>>();

                Listener {
                    name: l.name,
                    bind_ip: l.bind_ip,
                    port: l.port,
                    mode: l.mode,
                    http_proto: l.http_proto,
                    source_ip: l.source_ip,
                    default_error_page: l.default_error_page.map(Page::from),
                    default_maintenance_page: l.default_maintenance_page.map(Page::from),
                    statistics: ListenerStatistics::default(),
                    backends,
                }
            })
            .collect();

        Topology { listeners }
    }
}
