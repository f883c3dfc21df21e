use crate::error::OrchestratorError;
use crate::label::{Label, NodeLabels};
use crate::orchestrator::{Member, Orchestrator};

use log::{debug, info, warn};

use std::io::{self, Read};
use std::net::IpAddr;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const DOCKER_BIN: &str = "docker";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const NO_SUCH_NODE: &str = "No such node";
const MEMBER_FORMAT: &str = "{{.Description.Hostname}} {{.Status.Addr}}";
const LABELS_FORMAT: &str = "{{range $k, $v := .Spec.Labels}}{{$k}}={{$v}}\n{{end}}";

/// Docker Swarm driven through the `docker` CLI of a manager node.
pub struct DockerSwarm {
    bin: String,
    timeout: Duration,
}

impl Default for DockerSwarm {
    fn default() -> DockerSwarm {
        DockerSwarm::new(DOCKER_BIN, DEFAULT_TIMEOUT)
    }
}

impl DockerSwarm {
    pub fn new<T: Into<String>>(bin: T, timeout: Duration) -> DockerSwarm {
        DockerSwarm {
            bin: bin.into(),
            timeout,
        }
    }

    fn call_docker(&self, args: &[&str]) -> Result<String, OrchestratorError> {
        let cmdline = format!("{} {}", self.bin, args.join(" "));
        let child = Command::new(&self.bin)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let (status, stdout, stderr) = wait_deadline(child, self.timeout, &cmdline)?;
        info!(
            "execute {} exit with {} and stdout: {} stderr: {}",
            cmdline,
            status,
            stdout.trim(),
            stderr.trim()
        );
        if status.success() {
            return Ok(stdout);
        }
        Err(classify_failure(&cmdline, &status.to_string(), &stderr, args))
    }
}

impl Orchestrator for DockerSwarm {
    fn members(&self) -> Result<Vec<Member>, OrchestratorError> {
        let ids = self.call_docker(&["node", "ls", "-q"])?;
        let ids: Vec<&str> = ids.split_whitespace().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec!["node", "inspect", "--format", MEMBER_FORMAT];
        args.extend(ids);
        let out = self.call_docker(&args)?;
        Ok(parse_members(&out))
    }

    fn labels(&self, node: &str) -> Result<NodeLabels, OrchestratorError> {
        let out = self.call_docker(&["node", "inspect", "--format", LABELS_FORMAT, node])?;
        Ok(parse_labels(&out))
    }

    fn assert_label(&self, node: &str, label: &Label) -> Result<(), OrchestratorError> {
        let pair = label.to_string();
        self.call_docker(&["node", "update", "--label-add", &pair, node])?;
        Ok(())
    }
}

fn wait_deadline(
    mut child: Child,
    timeout: Duration,
    cmdline: &str,
) -> Result<(std::process::ExitStatus, String, String), OrchestratorError> {
    // drain both pipes while waiting, a full pipe would block the child
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let instant = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if instant.elapsed() > timeout {
            if let Err(err) = child.kill() {
                warn!("fail to kill {} due {}", cmdline, err);
            }
            // reap it
            let _ = child.wait();
            let _ = collect(stdout);
            let _ = collect(stderr);
            return Err(OrchestratorError::Timeout {
                command: cmdline.to_string(),
                after: timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok((status, collect(stdout)?, collect(stderr)?))
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(reader: Option<JoinHandle<io::Result<Vec<u8>>>>) -> Result<String, OrchestratorError> {
    let reader = match reader {
        Some(reader) => reader,
        None => return Ok(String::new()),
    };
    let buf = reader
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "pipe reader panicked"))??;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn classify_failure(cmdline: &str, status: &str, stderr: &str, args: &[&str]) -> OrchestratorError {
    if stderr.contains(NO_SUCH_NODE) {
        let node = missing_node(stderr).or_else(|| args.last().map(|x| x.to_string()));
        if let Some(node) = node {
            return OrchestratorError::NodeAbsent { node };
        }
    }
    OrchestratorError::Command {
        command: cmdline.to_string(),
        status: status.to_string(),
        stderr: stderr.trim().to_string(),
    }
}

// "... No such node: <id>"
fn missing_node(stderr: &str) -> Option<String> {
    let (_, rest) = stderr.split_at(stderr.find(NO_SUCH_NODE)? + NO_SUCH_NODE.len());
    let node = rest
        .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
        .split(|c: char| c.is_whitespace() || c == ',')
        .next()?;
    if node.is_empty() {
        None
    } else {
        Some(node.to_string())
    }
}

// one "hostname addr" per line
fn parse_members(out: &str) -> Vec<Member> {
    out.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            let address = parts.next().and_then(|x| x.parse::<IpAddr>().ok());
            if address.is_none() {
                debug!("member {} reports no usable address", name);
            }
            Some(Member {
                name: name.to_string(),
                address,
            })
        })
        .collect()
}

fn parse_labels(out: &str) -> NodeLabels {
    out.lines()
        .filter_map(Label::parse)
        .map(|x| (x.key, x.value))
        .collect()
}
