//! Port forwarding specifications (`local:remote,local:remote,...`)

use crate::error::ConfigError;

/// A single forwarded port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortForward {
    /// Port on the remote host
    pub remote: u16,
    /// Port bound on the local side of the tunnel
    pub local: u16,
}

/// Remote port → local port associations, in insertion order.
///
/// Remote ports are unique: inserting an already present remote port replaces
/// its local port but keeps the original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortForwardMap {
    entries: Vec<PortForward>,
}

impl PortForwardMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `remote` to `local`, returning the previous local port if any
    pub fn insert(&mut self, remote: u16, local: u16) -> Option<u16> {
        match self.entries.iter_mut().find(|e| e.remote == remote) {
            Some(entry) => Some(std::mem::replace(&mut entry.local, local)),
            None => {
                self.entries.push(PortForward { remote, local });
                None
            }
        }
    }

    /// Local port forwarded to `remote`
    pub fn local_port(&self, remote: u16) -> Option<u16> {
        self.entries
            .iter()
            .find(|e| e.remote == remote)
            .map(|e| e.local)
    }

    /// Remote ports in insertion order
    pub fn remote_ports(&self) -> Vec<u16> {
        self.entries.iter().map(|e| e.remote).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortForward> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a PortForwardMap {
    type Item = &'a PortForward;
    type IntoIter = std::slice::Iter<'a, PortForward>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Parse a `local:remote` list such as `2222:22,1445:445`.
///
/// Empty tokens between commas are ignored.
pub fn parse_port_map(spec: &str) -> Result<PortForwardMap, ConfigError> {
    let mut map = PortForwardMap::new();

    for token in spec.split(',').filter(|t| !t.is_empty()) {
        let parts: Vec<&str> = token.split(':').collect();
        if parts.len() != 2 {
            return Err(ConfigError::invalid_port_map(spec));
        }

        let local: u16 = parts[0]
            .parse()
            .map_err(|_| ConfigError::invalid_port_map(spec))?;
        let remote: u16 = parts[1]
            .parse()
            .map_err(|_| ConfigError::invalid_port_map(spec))?;

        if let Some(previous) = map.insert(remote, local) {
            tracing::debug!(
                "Remote port {} remapped from local port {} to {}",
                remote,
                previous,
                local
            );
        }
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_entries() {
        let map = parse_port_map("2222:22,1445:445").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.local_port(22), Some(2222));
        assert_eq!(map.local_port(445), Some(1445));
        assert_eq!(map.remote_ports(), vec![22, 445]);
    }

    #[test]
    fn test_duplicate_remote_keeps_slot() {
        let map = parse_port_map("2222:22,1445:445,2223:22").unwrap();
        assert_eq!(map.remote_ports(), vec![22, 445]);
        assert_eq!(map.local_port(22), Some(2223));
    }

    #[test]
    fn test_empty_tokens_skipped() {
        let map = parse_port_map("2222:22,,1445:445,").unwrap();
        assert_eq!(map.remote_ports(), vec![22, 445]);

        assert!(parse_port_map("").unwrap().is_empty());
    }

    #[test]
    fn test_single_port_rejected() {
        let err = parse_port_map("22").unwrap_err();
        assert_eq!(err, ConfigError::invalid_port_map("22"));
        assert!(err.to_string().contains("2222:22,1445:445"));
    }

    #[test]
    fn test_non_numeric_rejected() {
        let err = parse_port_map("abc:22").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPortMap { ref spec } if spec == "abc:22"));
    }

    #[test]
    fn test_error_names_full_spec() {
        let err = parse_port_map("2222:22,1:2:3").unwrap_err();
        assert!(err.to_string().contains("\"2222:22,1:2:3\""));
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(parse_port_map("70000:22").is_err());
        assert!(parse_port_map("-1:22").is_err());
    }

    #[test]
    fn test_unmapped_port() {
        let map = parse_port_map("2222:22").unwrap();
        assert_eq!(map.local_port(80), None);
    }
}
