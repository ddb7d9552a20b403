//! Structural edits applied before defining a cloned domain

use xmltree::XMLNode;

use crate::domain::DomainDescriptor;
use crate::error::TransformError;

/// Replace the text of `/domain/name`.
///
/// Fails without touching the document if there is no `name` element.
pub fn set_domain_name<'a>(
    domain: &'a mut DomainDescriptor,
    name: &str,
) -> Result<&'a mut DomainDescriptor, TransformError> {
    let name_element = domain
        .root_mut()
        .get_mut_child("name")
        .ok_or_else(|| TransformError::MissingNode {
            path: "/domain/name".to_string(),
        })?;

    name_element.children.clear();
    name_element.children.push(XMLNode::Text(name.to_string()));

    Ok(domain)
}

/// Remove the elements that must be unique per clone so libvirt regenerates them:
/// `/domain/uuid` and every `/domain/devices/interface/mac`.
///
/// Applying it to an already prepared document changes nothing.
pub fn prepare_for_cloning(domain: &mut DomainDescriptor) -> &mut DomainDescriptor {
    let root = domain.root_mut();

    if root.take_child("uuid").is_some() {
        tracing::debug!("Removed domain uuid");
    }

    let mut removed_macs = 0;
    for devices in element_children_mut(&mut root.children, "devices") {
        for interface in element_children_mut(&mut devices.children, "interface") {
            let before = interface.children.len();
            interface
                .children
                .retain(|node| !matches!(node, XMLNode::Element(e) if e.name == "mac"));
            removed_macs += before - interface.children.len();
        }
    }

    if removed_macs > 0 {
        tracing::debug!("Removed {} interface mac address(es)", removed_macs);
    }

    domain
}

fn element_children_mut<'a>(
    children: &'a mut [XMLNode],
    name: &'a str,
) -> impl Iterator<Item = &'a mut xmltree::Element> + 'a {
    children.iter_mut().filter_map(move |node| match node {
        XMLNode::Element(e) if e.name == name => Some(e),
        _ => None,
    })
}
