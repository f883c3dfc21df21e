use crate::apply::{apply_placement, PlacementResult};
use crate::error::{OrchestratorError, PlacementError};
use crate::orchestrator::{Member, Orchestrator};
use crate::plan::{plan_label_assertions, PlacementCommand};
use crate::topology::{ResolvedIdentity, Topology};

use log::{info, warn};

use std::net::IpAddr;

/// Where a run got to. Each run walks these in order and keeps nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Start,
    TopologyLoaded,
    IdentityResolved,
    LabelsPlanned,
    LabelsApplied { complete: bool },
    Done,
}

#[derive(Debug)]
pub struct RunReport {
    pub identity: ResolvedIdentity,
    pub commands: Vec<PlacementCommand>,
    // None on a dry run
    pub result: Option<PlacementResult>,
    pub states: Vec<RunState>,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.result.as_ref().map(|x| x.is_complete()).unwrap_or(true)
    }
}

pub struct PlacementResolver<O> {
    topology: Topology,
    orchestrator: O,
    dry_run: bool,
}

impl<O: Orchestrator> PlacementResolver<O> {
    pub fn new(topology: Topology, orchestrator: O) -> PlacementResolver<O> {
        PlacementResolver {
            topology,
            orchestrator,
            dry_run: false,
        }
    }

    /// Plan only, never assert.
    pub fn dry_run(mut self, dry_run: bool) -> PlacementResolver<O> {
        self.dry_run = dry_run;
        self
    }

    /// place the current node
    ///
    ///   1. resolve identity from the observed address
    ///   2. make sure the orchestrator already knows the node
    ///   3. read its labels and plan what is missing
    ///   4. assert the missing labels, collecting per-command outcomes
    ///
    pub fn run(&self, observed: IpAddr) -> Result<RunReport, PlacementError> {
        let mut states = vec![RunState::Start, RunState::TopologyLoaded];

        info!("resolve identity for {}", observed);
        let identity = self.topology.resolve(observed)?;
        info!(
            "{} is {} with {:?} failover rank {:?}",
            identity.name(),
            identity.role(),
            identity.capabilities(),
            identity.rank
        );
        states.push(RunState::IdentityResolved);

        let target = self.find_member(&identity)?;
        let current = self
            .orchestrator
            .labels(&target)
            .map_err(unavailable)?;
        info!("{} currently carries {:?}", target, current);

        let mut commands = plan_label_assertions(&identity, &current);
        if target != identity.name() {
            for command in commands.iter_mut() {
                command.node = target.clone();
            }
        }
        states.push(RunState::LabelsPlanned);

        if self.dry_run {
            for command in &commands {
                info!("dry run, would {}", command);
            }
            return Ok(RunReport {
                identity,
                commands,
                result: None,
                states,
            });
        }

        if commands.is_empty() {
            info!("{} already carries every label, nothing to do", target);
        }
        let result = match apply_placement(&self.orchestrator, commands.clone()) {
            Ok(result) => result,
            Err(aborted) => {
                for outcome in aborted.partial.outcomes.iter().filter(|x| x.is_applied()) {
                    warn!("{} went through before the stop", outcome.command);
                }
                return Err(aborted.cause);
            }
        };
        let complete = result.is_complete();
        states.push(RunState::LabelsApplied { complete });
        if complete {
            info!("all {} assertions applied, good luck.", result.applied());
        } else {
            warn!(
                "only {} of {} assertions applied",
                result.applied(),
                result.outcomes.len()
            );
        }
        states.push(RunState::Done);

        Ok(RunReport {
            identity,
            commands,
            result: Some(result),
            states,
        })
    }

    // by hostname first, the swarm may also know it only by address
    fn find_member(&self, identity: &ResolvedIdentity) -> Result<String, PlacementError> {
        let members = self.orchestrator.members().map_err(unavailable)?;
        let by_name = members.iter().find(|x| x.name == identity.name());
        let by_addr = || {
            members
                .iter()
                .find(|x| x.address == Some(identity.node.address))
        };
        match by_name.or_else(by_addr) {
            Some(Member { name, .. }) => Ok(name.clone()),
            None => Err(PlacementError::NodeUnregistered {
                node: identity.name().to_string(),
            }),
        }
    }
}

fn unavailable(err: OrchestratorError) -> PlacementError {
    match err {
        OrchestratorError::NodeAbsent { node } => PlacementError::NodeUnregistered { node },
        err => PlacementError::OrchestratorUnavailable {
            cause: err.to_string(),
        },
    }
}
