//! Mock tunnel backend for E2E tests

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use overcast::{BackendError, TunnelBackend, TunnelHandle};

use crate::events::{Event, EventLog};

/// Mock tunnel backend that records forwards without opening sockets
pub struct MockTunnelBackend {
    events: EventLog,
    open: DashMap<u64, TunnelHandle>,
    tunnel_counter: AtomicU64,
    open_attempts: AtomicUsize,
    /// 1-based open attempt that fails; 0 means never
    fail_open_at: AtomicUsize,
    fail_close: AtomicBool,
}

impl MockTunnelBackend {
    pub fn new(events: EventLog) -> Arc<Self> {
        Arc::new(Self {
            events,
            open: DashMap::new(),
            tunnel_counter: AtomicU64::new(1),
            open_attempts: AtomicUsize::new(0),
            fail_open_at: AtomicUsize::new(0),
            fail_close: AtomicBool::new(false),
        })
    }

    /// Make the `attempt`-th call to `open_forward` fail (1-based)
    pub fn set_fail_open_at(&self, attempt: usize) {
        self.fail_open_at.store(attempt, Ordering::SeqCst);
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Number of forwards currently open
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Local ports of currently open forwards, sorted
    pub fn open_local_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.open.iter().map(|t| t.local_port).collect();
        ports.sort_unstable();
        ports
    }
}

#[async_trait]
impl TunnelBackend for MockTunnelBackend {
    async fn open_forward(
        &self,
        host: &str,
        _username: &str,
        _password: &str,
        local_port: u16,
        remote_port: u16,
    ) -> Result<TunnelHandle, BackendError> {
        self.events.record(Event::OpenForward {
            host: host.to_string(),
            local_port,
            remote_port,
        });

        let attempt = self.open_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == self.fail_open_at.load(Ordering::SeqCst) {
            return Err(BackendError::Api(format!(
                "Simulated open failure on local port {}",
                local_port
            )));
        }

        let tunnel = TunnelHandle {
            id: self.tunnel_counter.fetch_add(1, Ordering::Relaxed),
            host: host.to_string(),
            local_port,
            remote_port,
        };
        self.open.insert(tunnel.id, tunnel.clone());
        Ok(tunnel)
    }

    async fn close_forward(&self, tunnel: &TunnelHandle) -> Result<(), BackendError> {
        self.events.record(Event::CloseForward {
            local_port: tunnel.local_port,
            remote_port: tunnel.remote_port,
        });

        if self.fail_close.load(Ordering::SeqCst) {
            return Err(BackendError::Api("Simulated close failure".into()));
        }

        self.open
            .remove(&tunnel.id)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(format!("tunnel {}", tunnel.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failure_simulation() {
        let backend = MockTunnelBackend::new(EventLog::new());
        backend.set_fail_open_at(2);

        let first = backend.open_forward("h", "u", "p", 2222, 22).await.unwrap();
        assert!(backend.open_forward("h", "u", "p", 1445, 445).await.is_err());
        assert!(backend.open_forward("h", "u", "p", 8080, 80).await.is_ok());
        assert_eq!(backend.open_local_ports(), vec![2222, 8080]);

        backend.set_fail_close(true);
        assert!(backend.close_forward(&first).await.is_err());
        backend.set_fail_close(false);
        backend.close_forward(&first).await.unwrap();
        assert_eq!(backend.open_count(), 1);
    }
}
