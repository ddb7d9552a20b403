//! Hosts backed by a freshly provisioned cloud instance

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{BackendError, HostError};
use crate::host::ProvisionedHost;

/// Instance type used when `<label>.amiInstanceType` is not set
pub const DEFAULT_INSTANCE_TYPE: &str = "t3.micro";

/// What to launch for a cloud host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRequest {
    /// Machine image (AMI) id
    pub image_id: String,
    pub instance_type: String,
    pub security_group: Option<String>,
    /// Name of the key pair installed on the instance
    pub key_name: Option<String>,
}

impl InstanceRequest {
    pub fn new(image_id: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            security_group: None,
            key_name: None,
        }
    }
}

/// Backend-issued reference to a running instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    pub instance_id: String,
}

/// Trait for compute providers able to launch and terminate instances
///
/// Implementations own their timeout policy; the host never times out a call.
#[async_trait]
pub trait CloudBackend: Send + Sync {
    /// Launch one instance of the requested image
    async fn create_instance(&self, request: &InstanceRequest)
        -> Result<InstanceHandle, BackendError>;

    /// Address of a launched instance, waiting for it to be running if needed
    async fn instance_address(&self, instance: &InstanceHandle) -> Result<String, BackendError>;

    /// Terminate a launched instance
    async fn terminate_instance(&self, instance: &InstanceHandle) -> Result<(), BackendError>;
}

/// A host that exists only between `setup` and `teardown`
pub struct CloudHost {
    label: String,
    request: InstanceRequest,
    boot_wait: Duration,
    backend: Arc<dyn CloudBackend>,
    instance: Option<InstanceHandle>,
    address: Option<String>,
}

impl CloudHost {
    pub fn new(
        label: impl Into<String>,
        request: InstanceRequest,
        boot_wait: Duration,
        backend: Arc<dyn CloudBackend>,
    ) -> Self {
        Self {
            label: label.into(),
            request,
            boot_wait,
            backend,
            instance: None,
            address: None,
        }
    }

    pub fn request(&self) -> &InstanceRequest {
        &self.request
    }

    /// Instance owned by this host, if set up
    pub fn instance(&self) -> Option<&InstanceHandle> {
        self.instance.as_ref()
    }
}

#[async_trait]
impl ProvisionedHost for CloudHost {
    async fn setup(&mut self) -> Result<(), HostError> {
        if let Some(instance) = &self.instance {
            return Err(HostError::state(format!(
                "Cloud host {} is already running as instance {}",
                self.label, instance.instance_id
            )));
        }

        tracing::info!(
            "Launching {} instance of {} for {}",
            self.request.instance_type,
            self.request.image_id,
            self.label
        );

        let instance = self
            .backend
            .create_instance(&self.request)
            .await
            .map_err(|e| HostError::cloud("creation", e))?;

        let address = match self.backend.instance_address(&instance).await {
            Ok(address) => address,
            Err(e) => {
                tracing::error!(
                    "Could not get address of instance {}: {}",
                    instance.instance_id,
                    e
                );
                if let Err(term) = self.backend.terminate_instance(&instance).await {
                    tracing::warn!(
                        "Failed to terminate instance {} after setup failure: {}",
                        instance.instance_id,
                        term
                    );
                }
                return Err(HostError::cloud("address lookup", e));
            }
        };

        tracing::info!(
            "Instance {} for {} is running at {}",
            instance.instance_id,
            self.label,
            address
        );
        self.instance = Some(instance);
        self.address = Some(address);

        if !self.boot_wait.is_zero() {
            tracing::info!("Waiting {:?} for {} to boot", self.boot_wait, self.label);
            tokio::time::sleep(self.boot_wait).await;
        }

        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), HostError> {
        self.address = None;

        let Some(instance) = self.instance.take() else {
            tracing::debug!("Cloud host {} has no instance to terminate", self.label);
            return Ok(());
        };

        tracing::info!(
            "Terminating instance {} for {}",
            instance.instance_id,
            self.label
        );
        self.backend
            .terminate_instance(&instance)
            .await
            .map_err(|e| HostError::cloud("termination", e))
    }

    fn host_name(&self) -> Result<&str, HostError> {
        self.address.as_deref().ok_or_else(|| {
            HostError::state(format!("Cloud host {} has not been set up", self.label))
        })
    }

    fn port(&self, remote: u16) -> Option<u16> {
        Some(remote)
    }
}
