use perch_core::docker::{DockerSwarm, DOCKER_BIN};
use perch_core::facts::RoleFacts;
use perch_core::topology::DEFAULT_TOPOLOGY_PATH;
use perch_core::{Orchestrator, PlacementResolver, Topology};

use clap::Parser;
use failure::{format_err, Error};
use log::{error, info, warn};

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::{self, Command};
use std::time::Duration;

const EXIT_FATAL: i32 = 1;
const EXIT_PARTIAL: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "perch-agent")]
#[command(about = "Resolve this node's role and label it in the swarm", long_about = None)]
struct Args {
    /// Topology file to load
    #[arg(short, long, default_value = DEFAULT_TOPOLOGY_PATH)]
    topology: PathBuf,

    /// Use the built-in four node table instead of a topology file
    #[arg(long, default_value_t = false)]
    builtin: bool,

    /// Address this node is known by, defaults to the first of `hostname -I`
    #[arg(short, long)]
    address: Option<IpAddr>,

    /// Plan the label assertions but do not send them
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Write role facts for the load balancer and vip scripts to this file
    #[arg(long)]
    facts: Option<PathBuf>,

    /// docker binary to drive the swarm with
    #[arg(long, default_value = DOCKER_BIN)]
    docker: String,

    /// Seconds each docker call may take
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(err) => {
            error!("placement aborted: {}", err);
            process::exit(EXIT_FATAL);
        }
    }
}

fn run(args: Args) -> Result<i32, Error> {
    let topology = if args.builtin {
        info!("use built-in topology");
        Topology::builtin()
    } else {
        Topology::load(&args.topology)?
    };

    let observed = match args.address {
        Some(addr) => addr,
        None => observed_address()?,
    };

    let swarm = DockerSwarm::new(args.docker, Duration::from_secs(args.timeout));
    let resolver = PlacementResolver::new(topology, swarm).dry_run(args.dry_run);
    place(&resolver, observed, args.facts.as_deref())
}

// facts are written only once the run got past every fatal check
fn place<O: Orchestrator>(
    resolver: &PlacementResolver<O>,
    observed: IpAddr,
    facts: Option<&Path>,
) -> Result<i32, Error> {
    let report = resolver.run(observed)?;

    if let Some(path) = facts {
        RoleFacts::from_identity(&report.identity).write_to(path)?;
    }

    if let Some(result) = &report.result {
        for outcome in result.failures() {
            if let Err(err) = &outcome.result {
                warn!("{}", err);
            }
        }
    }
    if report.is_complete() {
        info!(
            "{} placed as {} with {} new labels",
            report.identity.name(),
            report.identity.role(),
            report.commands.len()
        );
        Ok(0)
    } else {
        Ok(EXIT_PARTIAL)
    }
}

// same choice as `hostname -I | awk '{print $1}'`
fn observed_address() -> Result<IpAddr, Error> {
    let output = Command::new("hostname").arg("-I").output()?;
    if !output.status.success() {
        return Err(format_err!(
            "hostname -I exit with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .split_whitespace()
        .filter_map(|x| x.parse::<IpAddr>().ok())
        .find(|x| !x.is_loopback())
        .ok_or_else(|| {
            format_err!(
                "hostname -I reports no usable address: {}",
                stdout.trim()
            )
        })
}
