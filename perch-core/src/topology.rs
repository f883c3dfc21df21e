use crate::error::PlacementError;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

pub const DEFAULT_TOPOLOGY_PATH: &str = "/etc/perch/topology.toml";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Manager,
    Worker,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Manager => "manager",
            Role::Worker => "worker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    LoadBalancer,
    FailoverVip,
    WebServer,
    AppRuntime,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::LoadBalancer => "load-balancer",
            Capability::FailoverVip => "failover-vip",
            Capability::WebServer => "web-server",
            Capability::AppRuntime => "app-runtime",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a node in the VIP failover pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailoverRank {
    Primary,
    Secondary,
}

/// One row of the static topology table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub name: String,
    pub address: IpAddr,
    pub role: Role,
    pub capabilities: BTreeSet<Capability>,
    // only meaningful with failover-vip, higher wins the VIP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vip_priority: Option<u8>,
}

impl NodeSpec {
    pub fn new(name: &str, address: IpAddr, role: Role, capabilities: &[Capability]) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            address,
            role,
            capabilities: capabilities.iter().cloned().collect(),
            vip_priority: None,
        }
    }

    pub fn with_vip_priority(mut self, priority: u8) -> NodeSpec {
        self.vip_priority = Some(priority);
        self
    }

    pub fn has(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TopologyFile {
    #[serde(default)]
    node: Vec<NodeSpec>,
}

/// The validated, immutable node table of the cluster.
#[derive(Clone, Debug)]
pub struct Topology {
    nodes: Vec<NodeSpec>,
}

/// The topology entry the current machine turned out to be.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub node: NodeSpec,
    pub rank: Option<FailoverRank>,
}

impl ResolvedIdentity {
    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn role(&self) -> Role {
        self.node.role
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.node.capabilities
    }
}

impl Topology {
    pub fn new(nodes: Vec<NodeSpec>) -> Result<Topology, PlacementError> {
        let topology = Topology { nodes };
        topology.validate()?;
        Ok(topology)
    }

    pub fn from_toml(content: &str) -> Result<Topology, PlacementError> {
        parse_topology(content, "<inline>")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Topology, PlacementError> {
        let path = path.as_ref();
        info!("load topology from {:?}", path);
        let content = fs::read_to_string(path).map_err(|err| PlacementError::TopologyLoad {
            path: path.display().to_string(),
            cause: err.to_string(),
        })?;
        parse_topology(&content, &path.display().to_string())
    }

    /// The four Raspberry Pi nodes the cluster was laid out with.
    pub fn builtin() -> Topology {
        use Capability::*;

        let full = [LoadBalancer, FailoverVip, WebServer, AppRuntime];
        let serving = [WebServer, AppRuntime];
        let addr = |last| IpAddr::V4(Ipv4Addr::new(192, 168, 1, last));

        Topology {
            nodes: vec![
                NodeSpec::new("rpi1", addr(101), Role::Manager, &full).with_vip_priority(110),
                NodeSpec::new("rpi2", addr(102), Role::Manager, &full).with_vip_priority(100),
                NodeSpec::new("rpi3", addr(103), Role::Worker, &serving),
                NodeSpec::new("rpi4", addr(104), Role::Worker, &serving),
            ],
        }
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn get(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|x| x.name == name)
    }

    pub fn resolve(&self, observed: IpAddr) -> Result<ResolvedIdentity, PlacementError> {
        let node = resolve_identity(&self.nodes, observed)?;
        Ok(ResolvedIdentity {
            node: node.clone(),
            rank: self.failover_rank(&node.name),
        })
    }

    pub fn failover_rank(&self, name: &str) -> Option<FailoverRank> {
        let ranked = self.ranked_failover();
        match ranked.iter().position(|x| x.name == name) {
            Some(0) => Some(FailoverRank::Primary),
            Some(1) => Some(FailoverRank::Secondary),
            _ => None,
        }
    }

    fn ranked_failover(&self) -> Vec<&NodeSpec> {
        let mut ranked: Vec<_> = self
            .nodes
            .iter()
            .filter(|x| x.vip_priority.is_some())
            .collect();
        ranked.sort_by(|x, y| y.vip_priority.cmp(&x.vip_priority));
        ranked
    }

    fn validate(&self) -> Result<(), PlacementError> {
        if self.nodes.is_empty() {
            return Err(PlacementError::invalid("topology has no nodes"));
        }

        check_unique(self.nodes.iter().map(|x| (x.name.clone(), &x.name)))?;
        check_unique(self.nodes.iter().map(|x| (x.address.to_string(), &x.name)))?;

        for node in &self.nodes {
            for cap in &[Capability::WebServer, Capability::AppRuntime] {
                if !node.has(*cap) {
                    return Err(PlacementError::invalid(format!(
                        "node {} lacks required capability {}",
                        node.name, cap
                    )));
                }
            }
            if node.has(Capability::FailoverVip) && node.vip_priority.is_none() {
                return Err(PlacementError::invalid(format!(
                    "node {} has {} but no vip_priority",
                    node.name,
                    Capability::FailoverVip
                )));
            }
        }

        let ranked = self.ranked_failover();
        if ranked.len() < 2 {
            return Err(PlacementError::invalid(format!(
                "need a primary and a secondary vip node but found {}",
                ranked.len()
            )));
        }
        // strict ordering of the top two; lower ranks may tie
        for i in 0..2 {
            if let Some(next) = ranked.get(i + 1) {
                if next.vip_priority == ranked[i].vip_priority {
                    return Err(PlacementError::invalid(format!(
                        "nodes {} and {} share vip_priority {:?}",
                        ranked[i].name, next.name, next.vip_priority
                    )));
                }
            }
        }
        for node in &ranked[..2] {
            if !node.has(Capability::LoadBalancer) || !node.has(Capability::FailoverVip) {
                return Err(PlacementError::invalid(format!(
                    "failover node {} must carry {} and {}",
                    node.name,
                    Capability::LoadBalancer,
                    Capability::FailoverVip
                )));
            }
        }

        debug!("topology of {} nodes is valid", self.nodes.len());
        Ok(())
    }
}

fn parse_topology(content: &str, path: &str) -> Result<Topology, PlacementError> {
    let file: TopologyFile = toml::from_str(content).map_err(|err| PlacementError::TopologyLoad {
        path: path.to_string(),
        cause: err.to_string(),
    })?;
    Topology::new(file.node)
}

fn check_unique<'a, I>(keys: I) -> Result<(), PlacementError>
where
    I: Iterator<Item = (String, &'a String)>,
{
    let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, name) in keys {
        seen.entry(key).or_insert_with(Vec::new).push(name.clone());
    }
    match seen.into_iter().find(|(_, names)| names.len() > 1) {
        Some((key, nodes)) => Err(PlacementError::AmbiguousTopology { key, nodes }),
        None => Ok(()),
    }
}

/// Find the single entry whose address equals `observed`.
pub fn resolve_identity(nodes: &[NodeSpec], observed: IpAddr) -> Result<&NodeSpec, PlacementError> {
    let matched: Vec<&NodeSpec> = nodes.iter().filter(|x| x.address == observed).collect();
    match matched.len() {
        0 => Err(PlacementError::NodeNotFound { address: observed }),
        1 => Ok(matched[0]),
        _ => Err(PlacementError::AmbiguousTopology {
            key: observed.to_string(),
            nodes: matched.into_iter().map(|x| x.name.clone()).collect(),
        }),
    }
}
