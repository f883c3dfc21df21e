use crate::error::{OrchestratorError, PlacementError};
use crate::orchestrator::Orchestrator;
use crate::plan::PlacementCommand;

use log::{info, warn};

use std::error;
use std::fmt;

/// What happened to a single command.
#[derive(Debug)]
pub struct CommandOutcome {
    pub command: PlacementCommand,
    pub result: Result<(), PlacementError>,
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-command outcomes of one apply pass, in command order.
#[derive(Debug, Default)]
pub struct PlacementResult {
    pub outcomes: Vec<CommandOutcome>,
}

impl PlacementResult {
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|x| x.is_applied())
    }

    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|x| x.is_applied()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CommandOutcome> {
        self.outcomes.iter().filter(|x| !x.is_applied())
    }
}

/// A pass stopped early, with the outcomes collected before the stop.
#[derive(Debug)]
pub struct PlacementAborted {
    pub cause: PlacementError,
    pub partial: PlacementResult,
}

impl fmt::Display for PlacementAborted {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} after {} applied assertions",
            self.cause,
            self.partial.applied()
        )
    }
}

impl error::Error for PlacementAborted {}

/// Send every command to the orchestrator.
///
/// A node the orchestrator does not know stops the pass with
/// `NodeUnregistered`; any other failure is recorded and the pass goes on.
pub fn apply_placement<O: Orchestrator>(
    orchestrator: &O,
    commands: Vec<PlacementCommand>,
) -> Result<PlacementResult, PlacementAborted> {
    let mut result = PlacementResult::default();

    for command in commands {
        info!("{}", command);
        let outcome = match orchestrator.assert_label(&command.node, &command.label) {
            Ok(()) => Ok(()),
            Err(OrchestratorError::NodeAbsent { node }) => {
                warn!(
                    "stop labeling, {} left the orchestrator after {} assertions",
                    node,
                    result.applied()
                );
                return Err(PlacementAborted {
                    cause: PlacementError::NodeUnregistered { node },
                    partial: result,
                });
            }
            Err(err) => {
                warn!("fail to {} due {}", command, err);
                Err(PlacementError::PlacementFailed {
                    node: command.node.clone(),
                    label: command.label.to_string(),
                    cause: err.to_string(),
                })
            }
        };
        result.outcomes.push(CommandOutcome {
            command,
            result: outcome,
        });
    }

    Ok(result)
}
