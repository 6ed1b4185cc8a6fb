//! Balancer interface: picks a node within a backend.
//!
//! Strategy catalogue (round-robin, least-connections, random, weighted,
//! IP-hash) adapted from the generic load-balancer service this crate's
//! dependency stack originally shipped; sticky-cookie biasing and the
//! maintenance sentinel are new, layered on top to match the proxy's
//! node-selection contract.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::topology::{BackendNode, BaseStrategy, NodeHealth};

/// Why no node could be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalancerStatus {
    /// No nodes are registered at all, or none of the registered nodes are up.
    NoNodes,
    /// The backend is deliberately taken out of rotation.
    Maintenance,
}

pub enum SelectOutcome<'a> {
    Selected(&'a BackendNode),
    Unavailable(BalancerStatus),
}

/// Node-selection strategy. Implementations must be safe to share across
/// concurrent requests; any mutable state they keep (counters, connection
/// tables) must use interior mutability. Only ever called with a
/// non-empty, already-health-filtered candidate list -- see
/// [`select_node`].
pub trait Balancer: Send + Sync {
    fn select_among<'a>(&self, candidates: &[&'a BackendNode], client_ip: Option<&str>) -> Option<&'a BackendNode>;
    fn record_success(&self, _node: &BackendNode) {}
    fn record_failure(&self, _node: &BackendNode) {}
}

#[derive(Debug, Default)]
pub struct RoundRobinBalancer {
    counter: AtomicUsize,
}

impl Balancer for RoundRobinBalancer {
    fn select_among<'a>(&self, candidates: &[&'a BackendNode], _client_ip: Option<&str>) -> Option<&'a BackendNode> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(candidates[index])
    }
}

#[derive(Debug, Default)]
pub struct LeastConnectionsBalancer;

impl Balancer for LeastConnectionsBalancer {
    fn select_among<'a>(&self, candidates: &[&'a BackendNode], _client_ip: Option<&str>) -> Option<&'a BackendNode> {
        candidates
            .iter()
            .min_by_key(|n| n.statistics.currently_connected.load(Ordering::Relaxed))
            .copied()
    }

    fn record_success(&self, node: &BackendNode) {
        node.statistics.connected_add(-1);
    }

    fn record_failure(&self, node: &BackendNode) {
        node.statistics.connected_add(-1);
    }
}

#[derive(Debug, Default)]
pub struct RandomBalancer;

impl Balancer for RandomBalancer {
    fn select_among<'a>(&self, candidates: &[&'a BackendNode], _client_ip: Option<&str>) -> Option<&'a BackendNode> {
        if candidates.is_empty() {
            return None;
        }
        use rand::Rng;
        let index = rand::thread_rng().gen_range(0..candidates.len());
        Some(candidates[index])
    }
}

/// Distributes across nodes proportional to a weight. This crate's topology
/// does not carry a per-node weight field, so weighting degrades to uniform
/// distribution over the node list; kept as a distinct strategy so
/// configuration round-trips and so a future weight field has somewhere to
/// plug in.
#[derive(Debug, Default)]
pub struct WeightedBalancer {
    counter: AtomicUsize,
}

impl Balancer for WeightedBalancer {
    fn select_among<'a>(&self, candidates: &[&'a BackendNode], _client_ip: Option<&str>) -> Option<&'a BackendNode> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(candidates[index])
    }
}

#[derive(Debug, Default)]
pub struct IpHashBalancer;

impl IpHashBalancer {
    fn hash_ip(ip: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        ip.hash(&mut hasher);
        hasher.finish()
    }
}

impl Balancer for IpHashBalancer {
    fn select_among<'a>(&self, candidates: &[&'a BackendNode], client_ip: Option<&str>) -> Option<&'a BackendNode> {
        if candidates.is_empty() {
            return None;
        }
        match client_ip {
            Some(ip) => {
                let index = (Self::hash_ip(ip) as usize) % candidates.len();
                Some(candidates[index])
            }
            None => Some(candidates[0]),
        }
    }
}

pub struct BalancerFactory;

impl BalancerFactory {
    pub fn create(strategy: BaseStrategy) -> Arc<dyn Balancer> {
        match strategy {
            BaseStrategy::RoundRobin => Arc::new(RoundRobinBalancer::default()),
            BaseStrategy::LeastConnections => Arc::new(LeastConnectionsBalancer),
            BaseStrategy::Random => Arc::new(RandomBalancer),
            BaseStrategy::Weighted => Arc::new(WeightedBalancer::default()),
            BaseStrategy::IpHash => Arc::new(IpHashBalancer),
        }
    }
}

/// Selects a node for `backend`, honoring sticky-cookie affinity when
/// `balance_mode` calls for it: if `sticky_node` names a node still present
/// in the backend AND that node is currently up, it is returned directly
/// without consulting the underlying strategy. Nodes the health-check
/// collaborator has marked `Down` or `Maintenance` are excluded from
/// selection; if every node is unavailable and at least one is in
/// `Maintenance`, [`BalancerStatus::Maintenance`] is reported so the
/// director can synthesize a maintenance page rather than a plain error;
/// otherwise [`BalancerStatus::NoNodes`] is reported.
pub fn select_node<'a>(
    balancer: &dyn Balancer,
    nodes: &'a [crate::models::topology::BackendNode],
    client_ip: Option<&str>,
    sticky_node: Option<Uuid>,
) -> SelectOutcome<'a> {
    if nodes.is_empty() {
        return SelectOutcome::Unavailable(BalancerStatus::NoNodes);
    }

    if let Some(id) = sticky_node {
        if let Some(node) = nodes
            .iter()
            .find(|n| n.id == id && n.health() == NodeHealth::Up)
        {
            return SelectOutcome::Selected(node);
        }
    }

    let available: Vec<&BackendNode> = nodes.iter().filter(|n| n.health() == NodeHealth::Up).collect();
    if available.is_empty() {
        return if nodes.iter().any(|n| n.health() == NodeHealth::Maintenance) {
            SelectOutcome::Unavailable(BalancerStatus::Maintenance)
        } else {
            SelectOutcome::Unavailable(BalancerStatus::NoNodes)
        };
    }

    match balancer.select_among(&available, client_ip) {
        Some(node) => SelectOutcome::Selected(node),
        None => SelectOutcome::Unavailable(BalancerStatus::NoNodes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::topology::NodeHealth;
    use std::net::{IpAddr, Ipv4Addr};

    fn nodes(n: usize) -> Vec<BackendNode> {
        (0..n)
            .map(|i| BackendNode::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, i as u8)), 9000))
            .collect()
    }

    #[test]
    fn round_robin_cycles() {
        let lb = RoundRobinBalancer::default();
        let ns = nodes(3);
        let refs: Vec<&BackendNode> = ns.iter().collect();
        let first = lb.select_among(&refs, None).unwrap().ip;
        let second = lb.select_among(&refs, None).unwrap().ip;
        let third = lb.select_among(&refs, None).unwrap().ip;
        let fourth = lb.select_among(&refs, None).unwrap().ip;
        assert_eq!(first, fourth);
        assert_ne!(first, second);
        assert_ne!(second, third);
    }

    #[test]
    fn sticky_cookie_overrides_strategy() {
        let lb = RoundRobinBalancer::default();
        let ns = nodes(3);
        let sticky_id = ns[2].id;
        match select_node(&lb, &ns, None, Some(sticky_id)) {
            SelectOutcome::Selected(node) => assert_eq!(node.id, sticky_id),
            SelectOutcome::Unavailable(_) => panic!("expected a node"),
        }
    }

    #[test]
    fn empty_nodes_report_no_nodes() {
        let lb = RoundRobinBalancer::default();
        match select_node(&lb, &[], None, None) {
            SelectOutcome::Unavailable(BalancerStatus::NoNodes) => {}
            _ => panic!("expected NoNodes"),
        }
    }

    #[test]
    fn all_nodes_in_maintenance_reports_maintenance_status() {
        let lb = RoundRobinBalancer::default();
        let ns = nodes(2);
        for n in &ns {
            n.set_health(NodeHealth::Maintenance);
        }
        match select_node(&lb, &ns, None, None) {
            SelectOutcome::Unavailable(BalancerStatus::Maintenance) => {}
            _ => panic!("expected Maintenance"),
        }
    }

    #[test]
    fn down_nodes_are_excluded_from_selection() {
        let lb = RoundRobinBalancer::default();
        let ns = nodes(2);
        ns[0].set_health(NodeHealth::Down);
        match select_node(&lb, &ns, None, None) {
            SelectOutcome::Selected(node) => assert_eq!(node.id, ns[1].id),
            SelectOutcome::Unavailable(_) => panic!("expected the remaining up node"),
        }
    }

    #[test]
    fn mixed_down_and_up_does_not_report_maintenance() {
        let lb = RoundRobinBalancer::default();
        let ns = nodes(2);
        ns[0].set_health(NodeHealth::Down);
        ns[1].set_health(NodeHealth::Down);
        match select_node(&lb, &ns, None, None) {
            SelectOutcome::Unavailable(BalancerStatus::NoNodes) => {}
            _ => panic!("expected NoNodes when no node is in maintenance"),
        }
    }
}
