//! Capability set shared by every host variant

use async_trait::async_trait;

use crate::error::HostError;

/// A test host that can be brought up and torn down.
///
/// The caller owns the host and must call [`teardown`](Self::teardown)
/// exactly once after a [`setup`](Self::setup), even when setup failed
/// half-way. Both take `&mut self`, so calls on one host are serialized.
#[async_trait]
pub trait ProvisionedHost: Send + Sync {
    /// Acquire (or confirm) a reachable endpoint
    async fn setup(&mut self) -> Result<(), HostError>;

    /// Release everything acquired by `setup`
    async fn teardown(&mut self) -> Result<(), HostError>;

    /// Host name consumers should connect to
    fn host_name(&self) -> Result<&str, HostError>;

    /// Port consumers should use to reach `remote` on this host
    fn port(&self, remote: u16) -> Option<u16>;
}
