use crate::label::{desired_labels, Label, NodeLabels};
use crate::topology::ResolvedIdentity;

use log::debug;

use std::fmt;

/// Assert one label on one orchestrator node.
///
/// There is no removal counterpart; revoking a label is an operator action.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlacementCommand {
    pub node: String,
    pub label: Label,
}

impl fmt::Display for PlacementCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "assert {} on {}", self.label, self.node)
    }
}

/// Commands for every desired label the node does not carry yet, sorted by label.
pub fn plan_label_assertions(
    identity: &ResolvedIdentity,
    current: &NodeLabels,
) -> Vec<PlacementCommand> {
    let commands: Vec<_> = desired_labels(identity)
        .into_iter()
        .filter(|label| {
            let present = label.is_present(current);
            if present {
                debug!("{} already carries {}", identity.name(), label);
            }
            !present
        })
        .map(|label| PlacementCommand {
            node: identity.name().to_string(),
            label,
        })
        .collect();
    debug!(
        "planned {} assertions for {}",
        commands.len(),
        identity.name()
    );
    commands
}
