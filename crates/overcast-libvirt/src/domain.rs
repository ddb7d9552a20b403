//! In-memory libvirt domain descriptor

use xmltree::{Element, EmitterConfig, XMLNode};

use crate::error::TransformError;

/// A parsed `<domain>` definition
#[derive(Debug, Clone, PartialEq)]
pub struct DomainDescriptor {
    root: Element,
}

impl DomainDescriptor {
    /// Parse domain XML, as produced by `virsh dumpxml`
    pub fn parse(xml: &str) -> Result<Self, TransformError> {
        let root =
            Element::parse(xml.as_bytes()).map_err(|e| TransformError::Parse(e.to_string()))?;
        Self::from_element(root)
    }

    /// Wrap an already parsed tree
    pub fn from_element(root: Element) -> Result<Self, TransformError> {
        if root.name != "domain" {
            return Err(TransformError::UnexpectedRoot { found: root.name });
        }
        Ok(Self { root })
    }

    /// Serialize back to indented XML
    pub fn to_xml(&self) -> Result<String, TransformError> {
        let mut buf = Vec::new();
        self.root
            .write_with_config(&mut buf, EmitterConfig::new().perform_indent(true))
            .map_err(|e| TransformError::Write(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TransformError::Write(e.to_string()))
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Text of `/domain/name`
    pub fn name(&self) -> Option<String> {
        self.root
            .get_child("name")
            .and_then(|e| e.get_text())
            .map(|t| t.into_owned())
    }

    /// Text of `/domain/uuid`
    pub fn uuid(&self) -> Option<String> {
        self.root
            .get_child("uuid")
            .and_then(|e| e.get_text())
            .map(|t| t.into_owned())
    }

    /// `address` attributes of every `/domain/devices/interface/mac`
    pub fn mac_addresses(&self) -> Vec<String> {
        child_elements(&self.root, "devices")
            .flat_map(|devices| child_elements(devices, "interface"))
            .flat_map(|interface| child_elements(interface, "mac"))
            .filter_map(|mac| mac.attributes.get("address").cloned())
            .collect()
    }
}

/// Direct element children of `parent` named `name`
pub(crate) fn child_elements<'a>(
    parent: &'a Element,
    name: &'a str,
) -> impl Iterator<Item = &'a Element> + 'a {
    parent.children.iter().filter_map(move |node| match node {
        XMLNode::Element(e) if e.name == name => Some(e),
        _ => None,
    })
}
