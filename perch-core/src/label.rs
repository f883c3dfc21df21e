use crate::topology::{Capability, ResolvedIdentity, Role};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const ROLE_KEY: &str = "role";
const CAPABILITY_VALUE: &str = "true";

/// Labels currently carried by one orchestrator node, keyed by label key.
pub type NodeLabels = BTreeMap<String, String>;

/// An orchestrator node label. Orders by key, then value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    pub key: String,
    pub value: String,
}

impl Label {
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Label {
        Label {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn capability(cap: Capability) -> Label {
        Label::new(cap.as_str(), CAPABILITY_VALUE)
    }

    pub fn role(role: Role) -> Label {
        Label::new(ROLE_KEY, role.as_str())
    }

    /// Parse a `key=value` pair; a bare key gets an empty value.
    pub fn parse(raw: &str) -> Option<Label> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let mut parts = raw.splitn(2, '=');
        let key = parts.next()?.trim();
        if key.is_empty() {
            return None;
        }
        let value = parts.next().unwrap_or("").trim();
        Some(Label::new(key, value))
    }

    pub fn is_present(&self, labels: &NodeLabels) -> bool {
        labels.get(&self.key) == Some(&self.value)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// The labels a node should carry: one per capability plus its role.
pub fn desired_labels(identity: &ResolvedIdentity) -> BTreeSet<Label> {
    identity
        .capabilities()
        .iter()
        .map(|cap| Label::capability(*cap))
        .chain(Some(Label::role(identity.role())))
        .collect()
}
