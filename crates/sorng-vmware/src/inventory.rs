//! VM enumeration from a root folder.

use crate::error::VmwareResult;
use crate::properties::{ObjectSpec, PropertyCollector, PropertyFilterSpec, PropertySpec};
use crate::types::{ObjectReference, Session, VIRTUAL_MACHINE};
use crate::xml::XmlNode;

use log::debug;

const MANAGED_OBJECT_REFERENCE: &str = "ManagedObjectReference";

/// Lists managed objects below a container.
pub struct InventoryManager<'a> {
    collector: &'a PropertyCollector<'a>,
}

impl<'a> InventoryManager<'a> {
    pub fn new(collector: &'a PropertyCollector<'a>) -> Self {
        Self { collector }
    }

    /// Read `childEntity` of `root` and return its VirtualMachine references
    /// in document order. Sub-folders are not descended into.
    pub async fn enumerate_vms(
        &self,
        session: &Session,
        root: &ObjectReference,
    ) -> VmwareResult<Vec<ObjectReference>> {
        let spec = PropertyFilterSpec::new()
            .with_props(PropertySpec::new(root.kind.clone(), ["childEntity"]))
            .with_object(ObjectSpec::new(root.clone()).skip(false));

        let decoded = self.collector.retrieve(session, &spec).await?;
        let vms = extract_references(decoded.body(), VIRTUAL_MACHINE);
        debug!("{root} has {} virtual machine(s)", vms.len());
        Ok(vms)
    }
}

/// Every managed-object reference of `kind` anywhere below `tree`.
///
/// A node counts when it is a `ManagedObjectReference` element or carries
/// `xsi:type="ManagedObjectReference"`, and its `type` attribute equals
/// `kind` ignoring case. Duplicates are kept.
pub fn extract_references(tree: &XmlNode, kind: &str) -> Vec<ObjectReference> {
    tree.find_all(|n| {
        let is_moref = n.is(MANAGED_OBJECT_REFERENCE)
            || n
                .xsi_type()
                .is_some_and(|t| t.eq_ignore_ascii_case(MANAGED_OBJECT_REFERENCE));
        is_moref
            && plain_type(n).is_some_and(|t| t.eq_ignore_ascii_case(kind))
    })
    .into_iter()
    .filter_map(|n| {
        let value = n.text.trim();
        (!value.is_empty()).then(|| ObjectReference::new(kind, value))
    })
    .collect()
}

/// The unprefixed `type` attribute; `xsi:type` is a different thing.
fn plain_type(node: &XmlNode) -> Option<&str> {
    node.attributes
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("type"))
        .map(|(_, v)| v.as_str())
}
