use async_trait::async_trait;

use crate::error::HostError;
use crate::host::ProvisionedHost;

/// A machine that already runs somewhere; nothing is acquired or released
#[derive(Debug, Clone)]
pub struct ExistingHost {
    hostname: String,
}

impl ExistingHost {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }
}

#[async_trait]
impl ProvisionedHost for ExistingHost {
    async fn setup(&mut self) -> Result<(), HostError> {
        tracing::debug!("Using existing host {}", self.hostname);
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), HostError> {
        Ok(())
    }

    fn host_name(&self) -> Result<&str, HostError> {
        Ok(&self.hostname)
    }

    fn port(&self, remote: u16) -> Option<u16> {
        Some(remote)
    }
}
