//! SSH tunnel decorator
//!
//! Wraps any [`ProvisionedHost`] and exposes selected ports of it on the
//! loopback interface. Acquisition order is inner host first, then tunnels;
//! release order is the reverse.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use overcast_config::{PortForwardMap, MASK};

use crate::error::{BackendError, HostError};
use crate::host::ProvisionedHost;

/// Host name consumers use once tunnels are up
pub const TUNNEL_HOST_NAME: &str = "localhost";

/// An open port forward
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelHandle {
    /// Backend-assigned identifier
    pub id: u64,
    /// Host the forward points at
    pub host: String,
    pub local_port: u16,
    pub remote_port: u16,
}

/// Trait for transports able to forward a local port to a remote one
#[async_trait]
pub trait TunnelBackend: Send + Sync {
    /// Forward `localhost:local_port` to `remote_port` on `host`
    async fn open_forward(
        &self,
        host: &str,
        username: &str,
        password: &str,
        local_port: u16,
        remote_port: u16,
    ) -> Result<TunnelHandle, BackendError>;

    /// Close a forward previously returned by `open_forward`
    async fn close_forward(&self, tunnel: &TunnelHandle) -> Result<(), BackendError>;
}

/// Tunnel credentials, with the password kept out of `Debug` output
#[derive(Clone, PartialEq, Eq)]
pub struct TunnelCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for TunnelCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelCredentials")
            .field("username", &self.username)
            .field("password", &MASK)
            .finish()
    }
}

/// A host reached through SSH port forwards
pub struct TunneledHost {
    inner: Box<dyn ProvisionedHost>,
    credentials: TunnelCredentials,
    ports: PortForwardMap,
    backend: Arc<dyn TunnelBackend>,
    tunnels: Vec<TunnelHandle>,
}

impl TunneledHost {
    pub fn new(
        inner: Box<dyn ProvisionedHost>,
        credentials: TunnelCredentials,
        ports: PortForwardMap,
        backend: Arc<dyn TunnelBackend>,
    ) -> Self {
        Self {
            inner,
            credentials,
            ports,
            backend,
            tunnels: Vec::new(),
        }
    }

    /// The wrapped host
    pub fn inner(&self) -> &dyn ProvisionedHost {
        self.inner.as_ref()
    }

    pub fn ports(&self) -> &PortForwardMap {
        &self.ports
    }

    /// Forwards currently open, in opening order
    pub fn open_tunnels(&self) -> &[TunnelHandle] {
        &self.tunnels
    }

    /// Close `tunnels` newest first.
    ///
    /// Returns the forwards that are still open, in opening order, along with
    /// one error per failed close.
    async fn close_tunnels(
        &self,
        tunnels: Vec<TunnelHandle>,
    ) -> (Vec<TunnelHandle>, Vec<HostError>) {
        let mut still_open = Vec::new();
        let mut failures = Vec::new();

        for tunnel in tunnels.into_iter().rev() {
            tracing::debug!(
                "Closing tunnel {} -> {}:{}",
                tunnel.local_port,
                tunnel.host,
                tunnel.remote_port
            );
            if let Err(e) = self.backend.close_forward(&tunnel).await {
                tracing::warn!(
                    "Failed to close tunnel on local port {}: {}",
                    tunnel.local_port,
                    e
                );
                failures.push(HostError::TunnelClose {
                    local_port: tunnel.local_port,
                    remote_port: tunnel.remote_port,
                    source: e,
                });
                still_open.push(tunnel);
            }
        }

        still_open.reverse();
        (still_open, failures)
    }
}

#[async_trait]
impl ProvisionedHost for TunneledHost {
    async fn setup(&mut self) -> Result<(), HostError> {
        if !self.tunnels.is_empty() {
            return Err(HostError::state("Tunnels are already open"));
        }

        self.inner.setup().await?;
        let address = self.inner.host_name()?.to_string();

        let mut opened = Vec::with_capacity(self.ports.len());
        for forward in &self.ports {
            let result = self
                .backend
                .open_forward(
                    &address,
                    &self.credentials.username,
                    &self.credentials.password,
                    forward.local,
                    forward.remote,
                )
                .await;

            match result {
                Ok(tunnel) => {
                    tracing::info!(
                        "Tunnel open: localhost:{} -> {}:{}",
                        forward.local,
                        address,
                        forward.remote
                    );
                    opened.push(tunnel);
                }
                Err(e) => {
                    // Forwards that refuse to close stay tracked for teardown
                    let (still_open, close_failures) = self.close_tunnels(opened).await;
                    self.tunnels = still_open;
                    let open_error = HostError::TunnelOpen {
                        host: address,
                        local_port: forward.local,
                        remote_port: forward.remote,
                        source: e,
                    };
                    return Err(HostError::with_suppressed(open_error, close_failures));
                }
            }
        }

        self.tunnels = opened;
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), HostError> {
        let tunnels = std::mem::take(&mut self.tunnels);
        let (still_open, mut close_failures) = self.close_tunnels(tunnels).await;
        self.tunnels = still_open;

        match self.inner.teardown().await {
            Ok(()) if close_failures.is_empty() => Ok(()),
            Ok(()) => {
                let primary = close_failures.remove(0);
                Err(HostError::with_suppressed(primary, close_failures))
            }
            Err(e) => Err(HostError::with_suppressed(e, close_failures)),
        }
    }

    fn host_name(&self) -> Result<&str, HostError> {
        Ok(TUNNEL_HOST_NAME)
    }

    fn port(&self, remote: u16) -> Option<u16> {
        self.ports.local_port(remote)
    }
}
