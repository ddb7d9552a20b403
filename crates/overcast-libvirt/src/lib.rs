//! Libvirt domain descriptors for cloned test VMs
//!
//! A cloned VM starts from the XML of a base domain. Before it can be defined
//! alongside the original it needs its own name, and the identity fields that
//! libvirt regenerates when absent (`uuid`, interface `mac` addresses) must go.
//!
//! ```rust,ignore
//! use overcast_libvirt::{prepare_for_cloning, set_domain_name, DomainDescriptor};
//!
//! let mut domain = DomainDescriptor::parse(&base_xml)?;
//! prepare_for_cloning(set_domain_name(&mut domain, "clone-7")?);
//! let clone_xml = domain.to_xml()?;
//! ```

mod domain;
mod error;
mod transform;

pub use domain::DomainDescriptor;
pub use error::TransformError;
pub use transform::{prepare_for_cloning, set_domain_name};
pub use xmltree::Element;
