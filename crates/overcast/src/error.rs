use overcast_config::ConfigError;
use thiserror::Error;

/// Errors returned by cloud and tunnel backends
#[derive(Debug, Error)]
pub enum BackendError {
    /// External command could not be run or exited unsuccessfully
    #[error("'{program}' failed: {message}")]
    Command { program: String, message: String },

    /// Backend answered with something unusable
    #[error("API error: {0}")]
    Api(String),

    /// Handle does not belong to this backend (or was already released)
    #[error("Unknown handle: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn command(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            program: program.into(),
            message: message.into(),
        }
    }
}

/// Errors from resolving, setting up or tearing down a host
#[derive(Debug, Error)]
pub enum HostError {
    /// Missing or malformed configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Host definition cannot be satisfied in this context
    #[error("{0}")]
    State(String),

    #[error("Cloud instance {operation} failed: {source}")]
    Cloud {
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("Failed to open tunnel from local port {local_port} to {host}:{remote_port}: {source}")]
    TunnelOpen {
        host: String,
        local_port: u16,
        remote_port: u16,
        #[source]
        source: BackendError,
    },

    #[error("Failed to close tunnel on local port {local_port} (remote port {remote_port}): {source}")]
    TunnelClose {
        local_port: u16,
        remote_port: u16,
        #[source]
        source: BackendError,
    },

    /// Failure carrying secondary failures that happened while cleaning up
    #[error("{source} ({} suppressed)", .suppressed.len())]
    WithSuppressed {
        #[source]
        source: Box<HostError>,
        suppressed: Vec<HostError>,
    },
}

impl HostError {
    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }

    pub(crate) fn cloud(operation: &'static str, source: BackendError) -> Self {
        Self::Cloud { operation, source }
    }

    /// The error that caused the failure, unwrapping [`HostError::WithSuppressed`]
    pub fn primary(&self) -> &HostError {
        match self {
            Self::WithSuppressed { source, .. } => source.primary(),
            other => other,
        }
    }

    /// Secondary failures demoted during teardown
    pub fn suppressed(&self) -> &[HostError] {
        match self {
            Self::WithSuppressed { suppressed, .. } => suppressed,
            _ => &[],
        }
    }

    /// Combine a primary failure with secondary ones
    pub(crate) fn with_suppressed(primary: HostError, suppressed: Vec<HostError>) -> Self {
        if suppressed.is_empty() {
            primary
        } else {
            Self::WithSuppressed {
                source: Box::new(primary),
                suppressed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_error(local_port: u16) -> HostError {
        HostError::TunnelClose {
            local_port,
            remote_port: 22,
            source: BackendError::Api("connection reset".into()),
        }
    }

    #[test]
    fn test_with_suppressed() {
        let err = HostError::with_suppressed(HostError::state("boom"), vec![]);
        assert!(matches!(err, HostError::State(_)));
        assert!(err.suppressed().is_empty());

        let err = HostError::with_suppressed(
            HostError::state("boom"),
            vec![close_error(2222), close_error(2223)],
        );
        assert!(matches!(err.primary(), HostError::State(msg) if msg == "boom"));
        assert_eq!(err.suppressed().len(), 2);
        assert_eq!(err.to_string(), "boom (2 suppressed)");
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err: HostError = ConfigError::missing("web.tunnel.ports").into();
        assert!(err.to_string().starts_with("Required property web.tunnel.ports"));
    }
}
