//! Layered configuration for Overcast test hosts
//!
//! Properties are read from `overcast.toml` in up to three places, merged with
//! later sources overwriting earlier ones:
//!
//! - **Bundled** TOML passed in by the application (e.g. via `include_str!`)
//! - **User home**: `~/.overcast/overcast.toml`
//! - **Working directory**: `./overcast.toml`
//!
//! Runtime overrides (the CLI's `--set key=value`) take precedence over all
//! files. Nested tables flatten to dotted keys, so this is read as
//! `web.tunnel.username`:
//!
//! ```toml
//! [web.tunnel]
//! username = "admin"
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use overcast_config::{parse_port_map, ConfigLoader};
//!
//! let config = ConfigLoader::new()
//!     .override_property("web.hostname", "10.0.0.5")
//!     .load()?;
//!
//! let ports = parse_port_map(config.require("web.tunnel.ports")?)?;
//! ```

mod error;
mod loader;
mod ports;
mod store;

use std::sync::OnceLock;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use ports::{parse_port_map, PortForward, PortForwardMap};
pub use store::{display_value, Configuration, MASK, PASSWORD_PROPERTY_SUFFIX};

/// Name of the configuration file looked up in every location
pub const PROPERTY_FILE: &str = "overcast.toml";

static GLOBAL: OnceLock<Result<Configuration, ConfigError>> = OnceLock::new();

/// Process-wide configuration from the standard locations.
///
/// Loaded exactly once on first access; concurrent first callers block until
/// loading finishes. A load failure is cached and returned to every caller.
pub fn global() -> Result<&'static Configuration, ConfigError> {
    GLOBAL
        .get_or_init(|| ConfigLoader::new().load())
        .as_ref()
        .map_err(Clone::clone)
}
