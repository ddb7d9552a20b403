//! Mock cloud backend for E2E tests
//!
//! Tracks launched instances in memory instead of calling a cloud API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use overcast::{BackendError, CloudBackend, InstanceHandle, InstanceRequest};

use crate::events::{Event, EventLog};

/// Mock cloud backend that tracks instances without launching anything
pub struct MockCloudBackend {
    events: EventLog,
    /// Running instances: instance id -> image id
    instances: DashMap<String, String>,
    instance_counter: AtomicU64,
    fail_create: AtomicBool,
    fail_address: AtomicBool,
    fail_terminate: AtomicBool,
}

impl MockCloudBackend {
    pub fn new(events: EventLog) -> Arc<Self> {
        Arc::new(Self {
            events,
            instances: DashMap::new(),
            instance_counter: AtomicU64::new(1),
            fail_create: AtomicBool::new(false),
            fail_address: AtomicBool::new(false),
            fail_terminate: AtomicBool::new(false),
        })
    }

    /// Number of instances launched and not yet terminated
    pub fn running_count(&self) -> usize {
        self.instances.len()
    }

    pub fn is_running(&self, instance_id: &str) -> bool {
        self.instances.contains_key(instance_id)
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_address(&self, fail: bool) {
        self.fail_address.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_terminate(&self, fail: bool) {
        self.fail_terminate.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CloudBackend for MockCloudBackend {
    async fn create_instance(
        &self,
        request: &InstanceRequest,
    ) -> Result<InstanceHandle, BackendError> {
        self.events.record(Event::CreateInstance {
            image_id: request.image_id.clone(),
        });

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(BackendError::Api("Simulated create failure".into()));
        }

        let instance_id = format!(
            "i-mock{:04}",
            self.instance_counter.fetch_add(1, Ordering::Relaxed)
        );
        self.instances
            .insert(instance_id.clone(), request.image_id.clone());
        Ok(InstanceHandle { instance_id })
    }

    async fn instance_address(&self, instance: &InstanceHandle) -> Result<String, BackendError> {
        self.events.record(Event::InstanceAddress {
            instance_id: instance.instance_id.clone(),
        });

        if self.fail_address.load(Ordering::SeqCst) {
            return Err(BackendError::Api("Simulated address failure".into()));
        }
        if !self.instances.contains_key(&instance.instance_id) {
            return Err(BackendError::NotFound(instance.instance_id.clone()));
        }

        Ok(format!("{}.compute.internal", instance.instance_id))
    }

    async fn terminate_instance(&self, instance: &InstanceHandle) -> Result<(), BackendError> {
        self.events.record(Event::TerminateInstance {
            instance_id: instance.instance_id.clone(),
        });

        if self.fail_terminate.load(Ordering::SeqCst) {
            return Err(BackendError::Api("Simulated terminate failure".into()));
        }

        self.instances
            .remove(&instance.instance_id)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(instance.instance_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_terminate() {
        let backend = MockCloudBackend::new(EventLog::new());

        let instance = backend
            .create_instance(&InstanceRequest::new("ami-123"))
            .await
            .unwrap();
        assert!(backend.is_running(&instance.instance_id));

        let address = backend.instance_address(&instance).await.unwrap();
        assert!(address.starts_with(&instance.instance_id));

        backend.terminate_instance(&instance).await.unwrap();
        assert_eq!(backend.running_count(), 0);

        let again = backend.terminate_instance(&instance).await;
        assert!(matches!(again, Err(BackendError::NotFound(_))));
    }
}
