use failure::Fail;

use std::net::IpAddr;
use std::time::Duration;

/// Everything that can go wrong while placing a node.
///
/// Every variant but `PlacementFailed` aborts the run, before any label is
/// asserted where the orchestrator allows it.
/// `PlacementFailed` only ever shows up inside a per-command outcome.
#[derive(Debug, Fail)]
pub enum PlacementError {
    #[fail(display = "no topology entry matches address {}", address)]
    NodeNotFound { address: IpAddr },

    #[fail(display = "topology is ambiguous: {} is shared by {:?}", key, nodes)]
    AmbiguousTopology { key: String, nodes: Vec<String> },

    #[fail(display = "topology is invalid: {}", reason)]
    InvalidTopology { reason: String },

    #[fail(display = "fail to load topology from {}: {}", path, cause)]
    TopologyLoad { path: String, cause: String },

    #[fail(display = "orchestrator is unavailable: {}", cause)]
    OrchestratorUnavailable { cause: String },

    #[fail(display = "node {} is not a member of the orchestrator yet", node)]
    NodeUnregistered { node: String },

    #[fail(display = "fail to assert label {} on {}: {}", label, node, cause)]
    PlacementFailed {
        node: String,
        label: String,
        cause: String,
    },
}

impl PlacementError {
    pub fn invalid<T: Into<String>>(reason: T) -> PlacementError {
        PlacementError::InvalidTopology {
            reason: reason.into(),
        }
    }
}

/// Failures reported by an orchestrator backend.
#[derive(Debug, Fail)]
pub enum OrchestratorError {
    #[fail(display = "node {} is not known to the orchestrator", node)]
    NodeAbsent { node: String },

    #[fail(display = "{} did not finish within {:?}", command, after)]
    Timeout { command: String, after: Duration },

    #[fail(display = "{} exit with {}: {}", command, status, stderr)]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[fail(display = "io error: {}", _0)]
    Io(#[cause] std::io::Error),
}

impl From<std::io::Error> for OrchestratorError {
    fn from(err: std::io::Error) -> OrchestratorError {
        OrchestratorError::Io(err)
    }
}
