//! End-to-end test utilities for Overcast
//!
//! Mock cloud and tunnel backends that record every call into a shared
//! [`EventLog`], so host lifecycles can be checked without AWS or sshpass.

pub mod events;
pub mod harness;
pub mod mock_cloud;
pub mod mock_tunnel;
pub mod recording_host;

pub use events::{Event, EventLog};
pub use harness::TestHosts;
pub use mock_cloud::MockCloudBackend;
pub use mock_tunnel::MockTunnelBackend;
pub use recording_host::{HostFailures, RecordingHost};
