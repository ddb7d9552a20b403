//! Resolved, read-only configuration

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Suffix of keys whose values must never be logged
pub const PASSWORD_PROPERTY_SUFFIX: &str = ".password";

/// Replacement shown instead of a password value
pub const MASK: &str = "********";

/// Render a value for diagnostics, masking passwords
pub fn display_value<'a>(key: &str, value: &'a str) -> &'a str {
    if key.ends_with(PASSWORD_PROPERTY_SUFFIX) {
        MASK
    } else {
        value
    }
}

/// Configuration merged from all file sources, plus runtime overrides.
///
/// Built once by [`ConfigLoader`](crate::ConfigLoader) and never mutated.
#[derive(Clone, Default)]
pub struct Configuration {
    overrides: BTreeMap<String, String>,
    properties: BTreeMap<String, String>,
}

impl Configuration {
    pub(crate) fn new(
        overrides: BTreeMap<String, String>,
        properties: BTreeMap<String, String>,
    ) -> Self {
        Self {
            overrides,
            properties,
        }
    }

    /// Build a configuration from file-style properties only (handy in tests)
    pub fn from_properties<I, K, V>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            overrides: BTreeMap::new(),
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a property; runtime overrides win over file properties
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = self
            .overrides
            .get(key)
            .or_else(|| self.properties.get(key))
            .map(String::as_str);

        match value {
            Some(v) => tracing::trace!("Overcast property {}={}", key, display_value(key, v)),
            None => tracing::trace!("Overcast property {} is not set", key),
        }

        value
    }

    /// Look up a property, falling back to `default`
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Look up a property that must be present
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::missing(key))
    }

    /// Look up and parse an optional property
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };

        raw.trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                value: display_value(key, raw).to_string(),
                reason: e.to_string(),
            })
    }

    /// Whether `key` is defined by any source
    pub fn contains(&self, key: &str) -> bool {
        self.overrides.contains_key(key) || self.properties.contains_key(key)
    }

    /// Number of distinct keys across all sources
    pub fn len(&self) -> usize {
        self.properties.len()
            + self
                .overrides
                .keys()
                .filter(|k| !self.properties.contains_key(*k))
                .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = |map: &BTreeMap<String, String>| -> BTreeMap<String, String> {
            map.iter()
                .map(|(k, v)| (k.clone(), display_value(k, v).to_string()))
                .collect()
        };

        f.debug_struct("Configuration")
            .field("overrides", &masked(&self.overrides))
            .field("properties", &masked(&self.properties))
            .finish()
    }
}
