use perch_core::{
    Label, Member, NodeLabels, Orchestrator, OrchestratorError, PlacementError, PlacementResolver,
    RunState, Topology,
};

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use std::net::IpAddr;

/// A swarm kept in memory: members, their labels and every assertion made.
#[derive(Default)]
struct MemorySwarm {
    members: Vec<Member>,
    labels: RefCell<BTreeMap<String, NodeLabels>>,
    asserted: RefCell<Vec<String>>,
    // label keys whose assertion fails once
    flaky: RefCell<Vec<&'static str>>,
}

impl MemorySwarm {
    fn with_builtin_members() -> MemorySwarm {
        let members = Topology::builtin()
            .nodes()
            .iter()
            .map(|x| Member {
                name: x.name.clone(),
                address: Some(x.address),
            })
            .collect();
        MemorySwarm {
            members,
            ..MemorySwarm::default()
        }
    }

    fn labels_of(&self, node: &str) -> NodeLabels {
        self.labels.borrow().get(node).cloned().unwrap_or_default()
    }
}

impl Orchestrator for MemorySwarm {
    fn members(&self) -> Result<Vec<Member>, OrchestratorError> {
        Ok(self.members.clone())
    }

    fn labels(&self, node: &str) -> Result<NodeLabels, OrchestratorError> {
        Ok(self.labels_of(node))
    }

    fn assert_label(&self, node: &str, label: &Label) -> Result<(), OrchestratorError> {
        if !self.members.iter().any(|x| x.name == node) {
            return Err(OrchestratorError::NodeAbsent {
                node: node.to_string(),
            });
        }
        let mut flaky = self.flaky.borrow_mut();
        if let Some(pos) = flaky.iter().position(|key| *key == label.key) {
            flaky.remove(pos);
            return Err(OrchestratorError::Command {
                command: format!("docker node update --label-add {} {}", label, node),
                status: "exit status: 1".to_string(),
                stderr: "rpc error: code = Unknown desc = update out of sequence".to_string(),
            });
        }
        self.asserted.borrow_mut().push(format!("{}@{}", label, node));
        self.labels
            .borrow_mut()
            .entry(node.to_string())
            .or_insert_with(NodeLabels::new)
            .insert(label.key.clone(), label.value.clone());
        Ok(())
    }
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn worker_labels_itself_only() {
    init_log();
    let swarm = MemorySwarm::with_builtin_members();
    let resolver = PlacementResolver::new(Topology::builtin(), &swarm);

    let report = resolver.run(ip("192.168.1.103")).unwrap();
    assert!(report.is_complete());
    assert_eq!(
        *swarm.asserted.borrow(),
        vec![
            "app-runtime=true@rpi3",
            "role=worker@rpi3",
            "web-server=true@rpi3",
        ]
    );
    for other in &["rpi1", "rpi2", "rpi4"] {
        assert!(swarm.labels_of(other).is_empty());
    }
    assert_eq!(
        report.states,
        vec![
            RunState::Start,
            RunState::TopologyLoaded,
            RunState::IdentityResolved,
            RunState::LabelsPlanned,
            RunState::LabelsApplied { complete: true },
            RunState::Done,
        ]
    );
}

#[test]
fn rerun_converges() {
    init_log();
    let swarm = MemorySwarm::with_builtin_members();
    let resolver = PlacementResolver::new(Topology::builtin(), &swarm);

    let first = resolver.run(ip("192.168.1.101")).unwrap();
    assert_eq!(first.commands.len(), 5);

    let second = resolver.run(ip("192.168.1.101")).unwrap();
    assert!(second.commands.is_empty());
    assert!(second.is_complete());
    assert_eq!(swarm.asserted.borrow().len(), 5);
}

#[test]
fn unknown_address_asserts_nothing() {
    init_log();
    let swarm = MemorySwarm::with_builtin_members();
    let resolver = PlacementResolver::new(Topology::builtin(), &swarm);

    match resolver.run(ip("192.168.1.200")) {
        Err(PlacementError::NodeNotFound { address }) => assert_eq!(address, ip("192.168.1.200")),
        other => panic!("unexpected {:?}", other),
    }
    assert!(swarm.asserted.borrow().is_empty());
}

#[test]
fn shared_address_rejects_topology() {
    let mut nodes = Topology::builtin().nodes().to_vec();
    nodes[3].address = nodes[2].address;
    assert!(matches!(
        Topology::new(nodes),
        Err(PlacementError::AmbiguousTopology { .. })
    ));
}

#[test]
fn unregistered_node_aborts_before_labeling() {
    init_log();
    let mut swarm = MemorySwarm::with_builtin_members();
    swarm.members.retain(|x| x.name != "rpi4");
    let resolver = PlacementResolver::new(Topology::builtin(), &swarm);

    match resolver.run(ip("192.168.1.104")) {
        Err(PlacementError::NodeUnregistered { node }) => assert_eq!(node, "rpi4"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(swarm.asserted.borrow().is_empty());
}

#[test]
fn member_known_by_address_only() {
    init_log();
    let mut swarm = MemorySwarm::with_builtin_members();
    swarm.members[1].name = "pi-two".to_string();
    let resolver = PlacementResolver::new(Topology::builtin(), &swarm);

    let report = resolver.run(ip("192.168.1.102")).unwrap();
    assert!(report.commands.iter().all(|x| x.node == "pi-two"));
    assert_eq!(swarm.labels_of("pi-two").len(), 5);
}

#[test]
fn partial_failure_then_retry() {
    init_log();
    let swarm = MemorySwarm::with_builtin_members();
    swarm.flaky.borrow_mut().push("role");
    let resolver = PlacementResolver::new(Topology::builtin(), &swarm);

    let first = resolver.run(ip("192.168.1.103")).unwrap();
    assert!(!first.is_complete());
    assert_eq!(
        first.states[4],
        RunState::LabelsApplied { complete: false }
    );
    let result = first.result.unwrap();
    assert_eq!(result.applied(), 2);
    let failed: Vec<_> = result.failures().map(|x| x.command.label.to_string()).collect();
    assert_eq!(failed, vec!["role=worker"]);

    let second = resolver.run(ip("192.168.1.103")).unwrap();
    assert!(second.is_complete());
    let retried: Vec<_> = second.commands.iter().map(|x| x.label.to_string()).collect();
    assert_eq!(retried, vec!["role=worker"]);
}

#[test]
fn shrunk_capabilities_are_kept() {
    init_log();
    let swarm = MemorySwarm::with_builtin_members();
    let mut old = NodeLabels::new();
    old.insert("load-balancer".to_string(), "true".to_string());
    old.insert("zone".to_string(), "rack-a".to_string());
    swarm.labels.borrow_mut().insert("rpi3".to_string(), old);
    let resolver = PlacementResolver::new(Topology::builtin(), &swarm);

    resolver.run(ip("192.168.1.103")).unwrap();
    let labels = swarm.labels_of("rpi3");
    assert_eq!(labels.get("load-balancer").map(|x| x.as_str()), Some("true"));
    assert_eq!(labels.get("zone").map(|x| x.as_str()), Some("rack-a"));
    assert_eq!(labels.get("role").map(|x| x.as_str()), Some("worker"));
}

#[test]
fn dry_run_plans_without_asserting() {
    init_log();
    let swarm = MemorySwarm::with_builtin_members();
    let resolver = PlacementResolver::new(Topology::builtin(), &swarm).dry_run(true);

    let report = resolver.run(ip("192.168.1.102")).unwrap();
    assert_eq!(report.commands.len(), 5);
    assert!(report.result.is_none());
    assert_eq!(report.states.last(), Some(&RunState::LabelsPlanned));
    assert!(swarm.asserted.borrow().is_empty());
}

#[test]
fn topology_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[[node]]
name = "edge1"
address = "10.1.0.1"
role = "manager"
capabilities = ["load-balancer", "failover-vip", "web-server", "app-runtime"]
vip_priority = 200

[[node]]
name = "edge2"
address = "10.1.0.2"
role = "manager"
capabilities = ["load-balancer", "failover-vip", "web-server", "app-runtime"]
vip_priority = 190

[[node]]
name = "edge3"
address = "10.1.0.3"
role = "worker"
capabilities = ["web-server", "app-runtime"]
"#
    )
    .unwrap();

    let topology = Topology::load(file.path()).unwrap();
    let identity = topology.resolve(ip("10.1.0.3")).unwrap();
    assert_eq!(identity.name(), "edge3");
    assert_eq!(identity.rank, None);
}

#[test]
fn missing_file_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    match Topology::load(dir.path().join("topology.toml")) {
        Err(PlacementError::TopologyLoad { path, .. }) => assert!(path.ends_with("topology.toml")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn malformed_file_names_its_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[[node]]\nname = \"rpi1\"\naddress = \"not-an-ip\"\n").unwrap();

    match Topology::load(file.path()) {
        Err(PlacementError::TopologyLoad { path, .. }) => {
            assert_eq!(path, file.path().display().to_string())
        }
        other => panic!("unexpected {:?}", other),
    }
}
