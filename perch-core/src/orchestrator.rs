use crate::error::OrchestratorError;
use crate::label::{Label, NodeLabels};

use std::net::IpAddr;

/// A node registered with the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub address: Option<IpAddr>,
}

/// The orchestrator's membership view and node label store.
///
/// Asserting a label must be idempotent: setting a key to the value it
/// already has is a no-op, and two callers asserting the same label converge.
pub trait Orchestrator {
    fn members(&self) -> Result<Vec<Member>, OrchestratorError>;

    fn labels(&self, node: &str) -> Result<NodeLabels, OrchestratorError>;

    fn assert_label(&self, node: &str, label: &Label) -> Result<(), OrchestratorError>;
}

impl<'a, T: Orchestrator + ?Sized> Orchestrator for &'a T {
    fn members(&self) -> Result<Vec<Member>, OrchestratorError> {
        (**self).members()
    }

    fn labels(&self, node: &str) -> Result<NodeLabels, OrchestratorError> {
        (**self).labels(node)
    }

    fn assert_label(&self, node: &str, label: &Label) -> Result<(), OrchestratorError> {
        (**self).assert_label(node, label)
    }
}
