//! Password-authenticated SSH port forwards using `sshpass` + `ssh`
//!
//! Each forward is one `ssh -N -L local:localhost:remote` child process. The
//! password reaches `sshpass` through the `SSHPASS` environment variable so it
//! never shows up in the process list.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::error::BackendError;
use crate::tunnel::{TunnelBackend, TunnelHandle};

const PROGRAM: &str = "sshpass";

/// How long a new forward may take to start accepting connections
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(15);

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Opens port forwards as `sshpass -e ssh` child processes
pub struct SshTunnelBackend {
    ready_timeout: Duration,
    sessions: DashMap<u64, Child>,
    next_id: AtomicU64,
}

impl Default for SshTunnelBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SshTunnelBackend {
    pub fn new() -> Self {
        Self::with_ready_timeout(DEFAULT_READY_TIMEOUT)
    }

    pub fn with_ready_timeout(ready_timeout: Duration) -> Self {
        Self {
            ready_timeout,
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of forwards currently open
    pub fn open_count(&self) -> usize {
        self.sessions.len()
    }

    /// Wait until the forward accepts connections on `local_port`
    async fn wait_until_ready(&self, child: &mut Child, local_port: u16) -> Result<(), BackendError> {
        let deadline = Instant::now() + self.ready_timeout;

        loop {
            if let Some(status) = child.try_wait()? {
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                return Err(BackendError::command(
                    "ssh",
                    format!("exited with {}: {}", status, stderr.trim()),
                ));
            }

            if TcpStream::connect(("127.0.0.1", local_port)).await.is_ok() {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(BackendError::command(
                    "ssh",
                    format!(
                        "local port {} not ready after {:?}",
                        local_port, self.ready_timeout
                    ),
                ));
            }

            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }
}

/// Log stderr of forward `id` line by line until the process closes it
async fn drain_stderr<R: AsyncRead + Unpin>(id: u64, stderr: R) -> usize {
    let mut lines = BufReader::new(stderr).lines();
    let mut count = 0;
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!("ssh forward {}: {}", id, line);
        count += 1;
    }
    count
}

/// Arguments passed to `sshpass` for one forward
fn forward_args(host: &str, username: &str, local_port: u16, remote_port: u16) -> Vec<String> {
    vec![
        "-e".to_string(),
        "ssh".to_string(),
        "-N".to_string(),
        "-o".to_string(),
        "ExitOnForwardFailure=yes".to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        "-L".to_string(),
        format!("{}:localhost:{}", local_port, remote_port),
        format!("{}@{}", username, host),
    ]
}

#[async_trait]
impl TunnelBackend for SshTunnelBackend {
    async fn open_forward(
        &self,
        host: &str,
        username: &str,
        password: &str,
        local_port: u16,
        remote_port: u16,
    ) -> Result<TunnelHandle, BackendError> {
        // A listener already on the port would make the readiness probe lie
        drop(TcpListener::bind(("127.0.0.1", local_port)).await.map_err(|e| {
            BackendError::command("ssh", format!("local port {} unavailable: {}", local_port, e))
        })?);

        let mut child = Command::new(PROGRAM)
            .args(forward_args(host, username, local_port, remote_port))
            .env("SSHPASS", password)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BackendError::command(PROGRAM, "sshpass not found. Install it with your package manager")
                } else {
                    BackendError::command(PROGRAM, format!("failed to execute: {}", e))
                }
            })?;

        if let Err(e) = self.wait_until_ready(&mut child, local_port).await {
            let _ = child.kill().await;
            return Err(e);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // ssh keeps warning on stderr; a full pipe would stall the forward
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(id, stderr));
        }

        self.sessions.insert(id, child);
        tracing::debug!(
            "SSH forward {} open: localhost:{} -> {}:{}",
            id,
            local_port,
            host,
            remote_port
        );

        Ok(TunnelHandle {
            id,
            host: host.to_string(),
            local_port,
            remote_port,
        })
    }

    async fn close_forward(&self, tunnel: &TunnelHandle) -> Result<(), BackendError> {
        let (_, mut child) = self
            .sessions
            .remove(&tunnel.id)
            .ok_or_else(|| BackendError::NotFound(format!("tunnel {}", tunnel.id)))?;

        child.kill().await?;
        tracing::debug!("SSH forward {} closed", tunnel.id);
        Ok(())
    }
}
