//! Host double that records lifecycle calls

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use overcast::{HostError, ProvisionedHost};

use crate::events::{Event, EventLog};

/// Switches that make a [`RecordingHost`] fail, shared with the test
#[derive(Debug, Default)]
pub struct HostFailures {
    pub setup: AtomicBool,
    pub teardown: AtomicBool,
}

/// A fixed-address host that logs `setup`/`teardown` to an [`EventLog`]
pub struct RecordingHost {
    name: String,
    events: EventLog,
    failures: Arc<HostFailures>,
    up: bool,
}

impl RecordingHost {
    pub fn new(name: impl Into<String>, events: EventLog) -> Self {
        Self {
            name: name.into(),
            events,
            failures: Arc::new(HostFailures::default()),
            up: false,
        }
    }

    /// Handle for flipping failure switches after the host is boxed
    pub fn failures(&self) -> Arc<HostFailures> {
        self.failures.clone()
    }
}

#[async_trait]
impl ProvisionedHost for RecordingHost {
    async fn setup(&mut self) -> Result<(), HostError> {
        self.events.record(Event::HostSetup {
            name: self.name.clone(),
        });
        if self.failures.setup.load(Ordering::SeqCst) {
            return Err(HostError::state(format!("Simulated setup failure of {}", self.name)));
        }
        self.up = true;
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), HostError> {
        self.events.record(Event::HostTeardown {
            name: self.name.clone(),
        });
        self.up = false;
        if self.failures.teardown.load(Ordering::SeqCst) {
            return Err(HostError::state(format!(
                "Simulated teardown failure of {}",
                self.name
            )));
        }
        Ok(())
    }

    fn host_name(&self) -> Result<&str, HostError> {
        if self.up {
            Ok(&self.name)
        } else {
            Err(HostError::state(format!("{} is not set up", self.name)))
        }
    }

    fn port(&self, remote: u16) -> Option<u16> {
        Some(remote)
    }
}
