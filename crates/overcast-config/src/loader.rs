//! Loading `overcast.toml` from its layered locations
//!
//! Sources are merged in this order, later ones overwriting earlier ones:
//! 1. Bundled TOML supplied by the embedding application
//! 2. `~/.overcast/overcast.toml`
//! 3. `./overcast.toml`
//!
//! Runtime overrides are kept apart and always win over file properties.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::store::{display_value, Configuration};
use crate::PROPERTY_FILE;

/// Builder for a [`Configuration`]
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    bundled: Option<String>,
    home_file: Option<PathBuf>,
    working_dir_file: Option<PathBuf>,
    overrides: BTreeMap<String, String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader for the standard locations
    pub fn new() -> Self {
        Self {
            bundled: None,
            home_file: Self::default_home_file(),
            working_dir_file: Some(PathBuf::from(PROPERTY_FILE)),
            overrides: BTreeMap::new(),
        }
    }

    /// Loader that reads no files at all
    pub fn empty() -> Self {
        Self {
            bundled: None,
            home_file: None,
            working_dir_file: None,
            overrides: BTreeMap::new(),
        }
    }

    /// Get the default per-user config file path (`~/.overcast/overcast.toml`)
    pub fn default_home_file() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".overcast").join(PROPERTY_FILE))
    }

    /// TOML shipped with the application, lowest precedence
    pub fn bundled(mut self, toml: impl Into<String>) -> Self {
        self.bundled = Some(toml.into());
        self
    }

    pub fn home_file(mut self, path: Option<PathBuf>) -> Self {
        self.home_file = path;
        self
    }

    pub fn working_dir_file(mut self, path: Option<PathBuf>) -> Self {
        self.working_dir_file = path;
        self
    }

    /// Set a runtime override, which beats every file source
    pub fn override_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.overrides
            .extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Read and merge every source
    pub fn load(self) -> Result<Configuration, ConfigError> {
        let mut properties = BTreeMap::new();

        match &self.bundled {
            Some(content) => {
                tracing::info!("Loading bundled {}", PROPERTY_FILE);
                merge_toml(&mut properties, content, &format!("bundled {}", PROPERTY_FILE))?;
            }
            None => tracing::warn!("No bundled {} provided", PROPERTY_FILE),
        }

        for path in [&self.home_file, &self.working_dir_file].into_iter().flatten() {
            load_file(&mut properties, path)?;
        }

        for (key, value) in &self.overrides {
            tracing::debug!("Runtime override {}={}", key, display_value(key, value));
        }

        Ok(Configuration::new(self.overrides, properties))
    }
}

fn load_file(properties: &mut BTreeMap<String, String>, path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        tracing::warn!("File {} not found", path.display());
        return Ok(());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    tracing::info!("Loading {}", path.display());
    merge_toml(properties, &content, &path.display().to_string())
}

/// Parse TOML and merge it as dotted keys into `properties`
fn merge_toml(
    properties: &mut BTreeMap<String, String>,
    content: &str,
    source_name: &str,
) -> Result<(), ConfigError> {
    let table: toml::Table =
        toml::from_str(content).map_err(|e| ConfigError::parse(source_name, e.to_string()))?;
    flatten_table(properties, None, &table);
    Ok(())
}

fn flatten_table(properties: &mut BTreeMap<String, String>, prefix: Option<&str>, table: &toml::Table) {
    for (key, value) in table {
        let full_key = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };

        match value {
            toml::Value::Table(inner) => flatten_table(properties, Some(&full_key), inner),
            other => {
                properties.insert(full_key, render_value(other));
            }
        }
    }
}

fn render_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_toml(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_nested_tables_flatten() {
        let config = ConfigLoader::empty()
            .bundled(
                r#"
                [web]
                hostname = "web.example.com"

                [web.tunnel]
                username = "admin"
                ports = ["2222:22", "1445:445"]
                "#,
            )
            .load()
            .unwrap();

        assert_eq!(config.get("web.hostname"), Some("web.example.com"));
        assert_eq!(config.get("web.tunnel.username"), Some("admin"));
        assert_eq!(config.get("web.tunnel.ports"), Some("2222:22,1445:445"));
    }

    #[test]
    fn test_top_level_dotted_key() {
        let config = ConfigLoader::empty()
            .bundled("\"db.ami\" = \"ami-123\"\ndb.amiBootSeconds = 45\n")
            .load()
            .unwrap();
        assert_eq!(config.get("db.ami"), Some("ami-123"));
        assert_eq!(config.get("db.amiBootSeconds"), Some("45"));
    }

    #[test]
    fn test_later_files_win() {
        let home = write_toml("[foo]\nhostname = \"home\"\nami = \"ami-home\"\n");
        let cwd = write_toml("[foo]\nhostname = \"cwd\"\n");

        let config = ConfigLoader::empty()
            .bundled("[foo]\nhostname = \"bundled\"\nami = \"ami-bundled\"\nextra = \"kept\"\n")
            .home_file(Some(home.path().to_path_buf()))
            .working_dir_file(Some(cwd.path().to_path_buf()))
            .load()
            .unwrap();

        assert_eq!(config.get("foo.hostname"), Some("cwd"));
        assert_eq!(config.get("foo.ami"), Some("ami-home"));
        assert_eq!(config.get("foo.extra"), Some("kept"));
    }

    #[test]
    fn test_override_beats_files() {
        let cwd = write_toml("[foo]\nhostname = \"Y\"\n");

        let config = ConfigLoader::empty()
            .working_dir_file(Some(cwd.path().to_path_buf()))
            .override_property("foo.hostname", "X")
            .load()
            .unwrap();

        assert_eq!(config.get("foo.hostname"), Some("X"));
    }

    #[test]
    fn test_missing_files_are_not_errors() {
        let config = ConfigLoader::empty()
            .home_file(Some(PathBuf::from("/definitely/not/here/overcast.toml")))
            .working_dir_file(Some(PathBuf::from("/nor/here/overcast.toml")))
            .load()
            .unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let cwd = write_toml("[foo\nhostname = ");
        let result = ConfigLoader::empty()
            .working_dir_file(Some(cwd.path().to_path_buf()))
            .load();
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
