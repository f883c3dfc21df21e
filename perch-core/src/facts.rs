//! Role facts handed to the load balancer and VIP failover setup scripts.

use crate::topology::{Capability, FailoverRank, ResolvedIdentity};

use failure::Error;
use log::info;
use serde::Serialize;
use tera::{Context, Tera};

use std::fs;
use std::path::Path;

const FACTS_TEMPLATE: &str = r#"# written by perch-agent, do not edit
PERCH_NODE={{ node }}
PERCH_ADDRESS={{ address }}
PERCH_ROLE={{ role }}
PERCH_LB_ENABLED={% if load_balancer %}1{% else %}0{% endif %}
{%- if vrrp_state %}
PERCH_VRRP_STATE={{ vrrp_state }}
PERCH_VRRP_PRIORITY={{ vrrp_priority }}
{%- endif %}
"#;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoleFacts {
    pub node: String,
    pub address: String,
    pub role: String,
    pub load_balancer: bool,
    pub vrrp_state: Option<String>,
    pub vrrp_priority: Option<u8>,
}

impl RoleFacts {
    pub fn from_identity(identity: &ResolvedIdentity) -> RoleFacts {
        let vrrp_state = identity.rank.map(|rank| match rank {
            FailoverRank::Primary => "MASTER".to_string(),
            FailoverRank::Secondary => "BACKUP".to_string(),
        });
        RoleFacts {
            node: identity.name().to_string(),
            address: identity.node.address.to_string(),
            role: identity.role().to_string(),
            load_balancer: identity.node.has(Capability::LoadBalancer),
            vrrp_priority: vrrp_state.as_ref().and(identity.node.vip_priority),
            vrrp_state,
        }
    }

    pub fn render(&self) -> Result<String, Error> {
        let context = Context::from_serialize(self)?;
        let mut out = Tera::one_off(FACTS_TEMPLATE, &context, false)?;
        if !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, self.render()?)?;
        info!("write role facts of {} into {:?}", self.node, path);
        Ok(())
    }
}
