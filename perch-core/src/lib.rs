//! ## placement process
//!  * load the static topology table and validate it
//!  * observe the address of this machine
//!  * resolve the topology entry owning that address
//!  * export role facts for the load balancer and vip failover scripts
//!  * check the swarm already counts the node as a member
//!  * read the labels the swarm holds for the node
//!  * plan one assertion per missing capability or role label
//!  * assert labels one by one, record every outcome
//!  * report complete or partial
//!
//! # rerun
//!  * nothing is kept between runs
//!  * a rerun after a partial failure plans only what is still missing
//!  * labels are never removed, revoking one is up to the operator
//!
//! # error due:
//!  * unknown address, ambiguous or invalid topology: abort before labeling
//!  * node not in the swarm yet: abort, membership must converge first
//!  * a single assertion failing: record it and go on with the rest
//!

pub mod apply;
pub mod docker;
pub mod error;
pub mod facts;
pub mod label;
pub mod orchestrator;
pub mod plan;
pub mod resolver;
pub mod topology;

pub use self::apply::{apply_placement, CommandOutcome, PlacementAborted, PlacementResult};
pub use self::error::{OrchestratorError, PlacementError};
pub use self::label::{Label, NodeLabels};
pub use self::orchestrator::{Member, Orchestrator};
pub use self::plan::{plan_label_assertions, PlacementCommand};
pub use self::resolver::{PlacementResolver, RunReport, RunState};
pub use self::topology::{
    resolve_identity, Capability, FailoverRank, NodeSpec, ResolvedIdentity, Role, Topology,
};
