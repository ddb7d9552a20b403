//! Resolver wired to mock backends

use std::sync::Arc;

use overcast::{Configuration, HostResolver};

use crate::events::EventLog;
use crate::mock_cloud::MockCloudBackend;
use crate::mock_tunnel::MockTunnelBackend;

/// A [`HostResolver`] whose backends are in-memory mocks sharing one [`EventLog`]
pub struct TestHosts {
    pub events: EventLog,
    pub cloud: Arc<MockCloudBackend>,
    pub tunnels: Arc<MockTunnelBackend>,
    pub resolver: HostResolver,
}

impl TestHosts {
    /// Build from an already loaded configuration
    pub fn with_config(config: Configuration) -> Self {
        let events = EventLog::new();
        let cloud = MockCloudBackend::new(events.clone());
        let tunnels = MockTunnelBackend::new(events.clone());
        let resolver = HostResolver::new(Arc::new(config), cloud.clone(), tunnels.clone());

        tracing::debug!("Test hosts ready");

        Self {
            events,
            cloud,
            tunnels,
            resolver,
        }
    }

    /// Build from literal key/value properties
    pub fn with_properties(properties: &[(&str, &str)]) -> Self {
        Self::with_config(Configuration::from_properties(properties.iter().copied()))
    }
}
