use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or querying configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Required property absent from every source
    #[error(
        "Required property {key} is not specified as a runtime override or in overcast.toml \
         which can be placed in the current working directory, in ~/.overcast or bundled with the application"
    )]
    MissingProperty { key: String },

    /// Port forwarding specification does not have the `local:remote,...` shape
    #[error("Property value \"{spec}\" does not have the right format, e.g. 2222:22,1445:445")]
    InvalidPortMap { spec: String },

    /// Property value cannot be converted to the requested type
    #[error("Property {key} has invalid value \"{value}\": {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// Configuration file exists but could not be read
    #[error("Failed to read configuration file '{path}': {message}")]
    Io { path: PathBuf, message: String },

    /// Configuration file is not valid TOML
    #[error("Failed to parse {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },
}

impl ConfigError {
    /// Create a missing property error
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingProperty { key: key.into() }
    }

    /// Create an invalid port map error
    pub fn invalid_port_map(spec: impl Into<String>) -> Self {
        Self::InvalidPortMap { spec: spec.into() }
    }

    /// Create a parse error
    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
