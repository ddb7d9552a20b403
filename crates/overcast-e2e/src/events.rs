//! Ordered record of every collaborator call made during a test

use std::sync::Arc;

use parking_lot::Mutex;

/// One observed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    HostSetup { name: String },
    HostTeardown { name: String },
    CreateInstance { image_id: String },
    InstanceAddress { instance_id: String },
    TerminateInstance { instance_id: String },
    OpenForward { host: String, local_port: u16, remote_port: u16 },
    CloseForward { local_port: u16, remote_port: u16 },
}

/// Shared, cloneable event log
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: Event) {
        tracing::debug!("EventLog: {:?}", event);
        self.events.lock().push(event);
    }

    /// Snapshot of all events so far
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Number of events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    /// Index of the first event matching `predicate`
    pub fn position(&self, predicate: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events.lock().iter().position(predicate)
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
