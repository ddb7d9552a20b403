//! Turning a host label into a [`ProvisionedHost`]
//!
//! Resolution happens in two steps. [`plan`] reads the configuration and
//! decides what to build without touching anything external; then
//! [`HostResolver::build`] constructs the host from the plan.
//!
//! Base variant (first match wins):
//! 1. `<label>.hostname` → existing host, even when an AMI is configured too
//! 2. `<label>.ami` → cloud instance, if the caller allows cloud provisioning
//!
//! The base host is wrapped in SSH tunnels when `<label>.tunnel.username` is set.

use std::sync::Arc;
use std::time::Duration;

use overcast_config::{parse_port_map, Configuration, PortForwardMap};

use crate::cloud::{CloudBackend, CloudHost, InstanceRequest, DEFAULT_INSTANCE_TYPE};
use crate::error::HostError;
use crate::existing::ExistingHost;
use crate::host::ProvisionedHost;
use crate::tunnel::{TunnelBackend, TunnelCredentials, TunneledHost};

pub const HOSTNAME_PROPERTY_SUFFIX: &str = ".hostname";
pub const AMI_ID_PROPERTY_SUFFIX: &str = ".ami";
pub const AMI_INSTANCE_TYPE_PROPERTY_SUFFIX: &str = ".amiInstanceType";
pub const AMI_SECURITY_GROUP_PROPERTY_SUFFIX: &str = ".amiSecurityGroup";
pub const AMI_KEY_NAME_PROPERTY_SUFFIX: &str = ".amiKeyName";
pub const AMI_BOOT_SECONDS_PROPERTY_SUFFIX: &str = ".amiBootSeconds";
pub const TUNNEL_USERNAME_PROPERTY_SUFFIX: &str = ".tunnel.username";
pub const TUNNEL_PASSWORD_PROPERTY_SUFFIX: &str = ".tunnel.password";
pub const TUNNEL_PORTS_PROPERTY_SUFFIX: &str = ".tunnel.ports";

/// Whether resolution may launch billable cloud instances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudPolicy {
    Allow,
    Deny,
}

/// The host to build before any tunnel wrapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasePlan {
    Existing {
        hostname: String,
    },
    CloudProvisioned {
        request: InstanceRequest,
        boot_wait: Duration,
    },
}

/// SSH tunnel settings for a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelPlan {
    pub credentials: TunnelCredentials,
    pub ports: PortForwardMap,
}

/// Everything needed to build the host for one label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlan {
    pub label: String,
    pub base: BasePlan,
    pub tunnel: Option<TunnelPlan>,
}

/// Decide which host to build for `label`.
///
/// Reads configuration only, so every error here happens before any
/// instance is launched or tunnel opened.
pub fn plan(config: &Configuration, label: &str, policy: CloudPolicy) -> Result<HostPlan, HostError> {
    let base = plan_base(config, label, policy)?;
    let tunnel = plan_tunnel(config, label)?;

    Ok(HostPlan {
        label: label.to_string(),
        base,
        tunnel,
    })
}

fn key(label: &str, suffix: &str) -> String {
    format!("{}{}", label, suffix)
}

fn plan_base(config: &Configuration, label: &str, policy: CloudPolicy) -> Result<BasePlan, HostError> {
    if let Some(hostname) = config.get(&key(label, HOSTNAME_PROPERTY_SUFFIX)) {
        tracing::info!("Using existing host for {}", label);
        return Ok(BasePlan::Existing {
            hostname: hostname.to_string(),
        });
    }

    let Some(ami_id) = config.get(&key(label, AMI_ID_PROPERTY_SUFFIX)) else {
        return Err(HostError::state(format!(
            "Neither a hostname nor an AMI id has been specified for host label {}",
            label
        )));
    };

    if policy == CloudPolicy::Deny {
        return Err(HostError::state(format!(
            "Only an AMI ID ({}) has been specified for host label {}, but cloud hosts are not available",
            ami_id, label
        )));
    }

    tracing::info!("Using cloud image {} for {}", ami_id, label);

    let request = InstanceRequest {
        image_id: ami_id.to_string(),
        instance_type: config
            .get_or(&key(label, AMI_INSTANCE_TYPE_PROPERTY_SUFFIX), DEFAULT_INSTANCE_TYPE)
            .to_string(),
        security_group: config
            .get(&key(label, AMI_SECURITY_GROUP_PROPERTY_SUFFIX))
            .map(str::to_string),
        key_name: config
            .get(&key(label, AMI_KEY_NAME_PROPERTY_SUFFIX))
            .map(str::to_string),
    };

    let boot_seconds: u64 = config
        .get_parsed(&key(label, AMI_BOOT_SECONDS_PROPERTY_SUFFIX))?
        .unwrap_or(0);

    Ok(BasePlan::CloudProvisioned {
        request,
        boot_wait: Duration::from_secs(boot_seconds),
    })
}

fn plan_tunnel(config: &Configuration, label: &str) -> Result<Option<TunnelPlan>, HostError> {
    let Some(username) = config.get(&key(label, TUNNEL_USERNAME_PROPERTY_SUFFIX)) else {
        return Ok(None);
    };

    tracing::info!("Using SSH tunnels for {}", label);

    let password = config.require(&key(label, TUNNEL_PASSWORD_PROPERTY_SUFFIX))?;
    let ports = parse_port_map(config.require(&key(label, TUNNEL_PORTS_PROPERTY_SUFFIX))?)?;

    Ok(Some(TunnelPlan {
        credentials: TunnelCredentials {
            username: username.to_string(),
            password: password.to_string(),
        },
        ports,
    }))
}

/// Builds hosts from configuration using the given backends
#[derive(Clone)]
pub struct HostResolver {
    config: Arc<Configuration>,
    cloud: Arc<dyn CloudBackend>,
    tunnels: Arc<dyn TunnelBackend>,
}

impl HostResolver {
    pub fn new(
        config: Arc<Configuration>,
        cloud: Arc<dyn CloudBackend>,
        tunnels: Arc<dyn TunnelBackend>,
    ) -> Self {
        Self {
            config,
            cloud,
            tunnels,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// See [`plan`]
    pub fn plan(&self, label: &str, policy: CloudPolicy) -> Result<HostPlan, HostError> {
        plan(&self.config, label, policy)
    }

    /// Construct the host described by `plan`; nothing is started yet
    pub fn build(&self, plan: HostPlan) -> Box<dyn ProvisionedHost> {
        let base: Box<dyn ProvisionedHost> = match plan.base {
            BasePlan::Existing { hostname } => Box::new(ExistingHost::new(hostname)),
            BasePlan::CloudProvisioned { request, boot_wait } => Box::new(CloudHost::new(
                plan.label.clone(),
                request,
                boot_wait,
                self.cloud.clone(),
            )),
        };

        match plan.tunnel {
            Some(tunnel) => Box::new(TunneledHost::new(
                base,
                tunnel.credentials,
                tunnel.ports,
                self.tunnels.clone(),
            )),
            None => base,
        }
    }

    /// Plan and build the host for `label`
    pub fn resolve(
        &self,
        label: &str,
        policy: CloudPolicy,
    ) -> Result<Box<dyn ProvisionedHost>, HostError> {
        let plan = self.plan(label, policy)?;
        Ok(self.build(plan))
    }

    /// Host for `label`, launching a cloud instance if that is how it is configured
    pub fn host(&self, label: &str) -> Result<Box<dyn ProvisionedHost>, HostError> {
        self.resolve(label, CloudPolicy::Allow)
    }

    /// Host for `label` in contexts where cloud instances must not be launched
    pub fn host_without_cloud(&self, label: &str) -> Result<Box<dyn ProvisionedHost>, HostError> {
        self.resolve(label, CloudPolicy::Deny)
    }
}
