//! Ephemeral test hosts behind one interface
//!
//! A host label (e.g. `web`) names a block of `overcast.toml` settings. The
//! [`HostResolver`] turns it into a [`ProvisionedHost`]:
//!
//! - **Existing** host when `<label>.hostname` is set
//! - **Cloud** instance when `<label>.ami` is set (and cloud hosts are allowed)
//! - either of the above wrapped in **SSH tunnels** when
//!   `<label>.tunnel.username` is set
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use overcast::{AwsCliBackend, HostResolver, SshTunnelBackend};
//!
//! let config = Arc::new(overcast_config::ConfigLoader::new().load()?);
//! let resolver = HostResolver::new(
//!     config.clone(),
//!     Arc::new(AwsCliBackend::from_config(&config)),
//!     Arc::new(SshTunnelBackend::new()),
//! );
//!
//! let mut host = resolver.host("web")?;
//! host.setup().await?;
//! let ssh_port = host.port(22);
//! // ... run tests against host.host_name()? ...
//! host.teardown().await?;
//! ```

pub mod backends;
mod cloud;
mod error;
mod existing;
mod host;
pub mod resolver;
mod tunnel;

pub use backends::{AwsCliBackend, SshTunnelBackend};
pub use cloud::{CloudBackend, CloudHost, InstanceHandle, InstanceRequest, DEFAULT_INSTANCE_TYPE};
pub use error::{BackendError, HostError};
pub use existing::ExistingHost;
pub use host::ProvisionedHost;
pub use resolver::{plan, BasePlan, CloudPolicy, HostPlan, HostResolver, TunnelPlan};
pub use tunnel::{TunnelBackend, TunnelCredentials, TunnelHandle, TunneledHost, TUNNEL_HOST_NAME};

pub use overcast_config::{Configuration, ConfigError, PortForwardMap};
