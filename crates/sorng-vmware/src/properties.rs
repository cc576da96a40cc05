//! PropertyCollector requests and `ObjectContent` parsing.
//!
//! Responses are read structurally: an object block is any element with an
//! `obj` child carrying a `type` attribute (`returnval` for
//! `RetrieveProperties`, `objects` for the paged variants), and each
//! `propSet` child of a block holds one `name`/`val` pair. Tag order and
//! casing are not relied on.

use crate::envelope::{escape, Decoded};
use crate::error::VmwareResult;
use crate::session::this_element;
use crate::types::{ObjectReference, PropertySet, Session};
use crate::vsphere::VsphereClient;
use crate::xml::XmlNode;

use log::{debug, warn};
use std::collections::HashMap;

// ── Request building ─────────────────────────────────────────────────

/// `PropertySpec`: which paths to read on objects of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    pub kind: String,
    pub paths: Vec<String>,
}

impl PropertySpec {
    pub fn new<I, S>(kind: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: kind.into(),
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    fn to_xml(&self) -> String {
        let mut out = format!("<vim25:propSet><vim25:type>{}</vim25:type>", escape(&self.kind));
        for path in &self.paths {
            out.push_str(&format!("<vim25:pathSet>{}</vim25:pathSet>", escape(path)));
        }
        out.push_str("</vim25:propSet>");
        out
    }
}

/// `ObjectSpec`: one starting object, optionally skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSpec {
    pub obj: ObjectReference,
    pub skip: Option<bool>,
}

impl ObjectSpec {
    pub fn new(obj: ObjectReference) -> Self {
        Self { obj, skip: None }
    }

    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = Some(skip);
        self
    }

    fn to_xml(&self) -> String {
        let skip = self
            .skip
            .map(|s| format!("<vim25:skip>{s}</vim25:skip>"))
            .unwrap_or_default();
        format!(
            r#"<vim25:objectSet><vim25:obj type="{}">{}</vim25:obj>{skip}</vim25:objectSet>"#,
            escape(&self.obj.kind),
            escape(&self.obj.value)
        )
    }
}

/// `PropertyFilterSpec` sent as the `specSet` of `RetrieveProperties`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyFilterSpec {
    pub prop_set: Vec<PropertySpec>,
    pub object_set: Vec<ObjectSpec>,
}

impl PropertyFilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_props(mut self, spec: PropertySpec) -> Self {
        self.prop_set.push(spec);
        self
    }

    pub fn with_object(mut self, spec: ObjectSpec) -> Self {
        self.object_set.push(spec);
        self
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from("<vim25:specSet>");
        for p in &self.prop_set {
            out.push_str(&p.to_xml());
        }
        for o in &self.object_set {
            out.push_str(&o.to_xml());
        }
        out.push_str("</vim25:specSet>");
        out
    }
}

// ── Response parsing ─────────────────────────────────────────────────

/// One object block from a `RetrieveProperties` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectContent {
    pub obj: ObjectReference,
    pub props: PropertySet,
    /// Paths the server could not read, with the fault type if given.
    pub missing: Vec<(String, String)>,
}

impl ObjectContent {
    fn from_block(block: &XmlNode) -> Option<Self> {
        let obj = block
            .children_named("obj")
            .find_map(ObjectReference::from_node)?;

        let mut props = PropertySet::new();
        for prop in block.children_named("propSet") {
            let Some(path) = prop.child_text("name").map(str::trim).filter(|p| !p.is_empty())
            else {
                continue;
            };
            props.push(path, prop.child("val").cloned());
        }

        let missing = block
            .children_named("missingSet")
            .filter_map(|m| {
                let path = m.child_text("path")?.trim().to_string();
                let fault = m
                    .child("fault")
                    .and_then(|f| f.child("fault").or(Some(f)))
                    .and_then(|f| f.xsi_type().map(str::to_string))
                    .unwrap_or_default();
                Some((path, fault))
            })
            .collect();

        Some(Self { obj, props, missing })
    }
}

fn is_object_block(node: &XmlNode) -> bool {
    node.children_named("obj").any(|o| o.attr("type").is_some())
}

/// Every object block in `tree`, in document order. Blocks nested inside
/// another block's values are not considered.
pub fn object_contents(tree: &XmlNode) -> Vec<ObjectContent> {
    fn walk(node: &XmlNode, out: &mut Vec<ObjectContent>) {
        for child in &node.children {
            if is_object_block(child) {
                if let Some(content) = ObjectContent::from_block(child) {
                    out.push(content);
                }
            } else {
                walk(child, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(tree, &mut out);
    out
}

// ── Collector ────────────────────────────────────────────────────────

/// Property retrieval against one PropertyCollector object.
pub struct PropertyCollector<'a> {
    client: &'a VsphereClient,
    collector: ObjectReference,
}

impl<'a> PropertyCollector<'a> {
    pub fn new(client: &'a VsphereClient, collector: ObjectReference) -> Self {
        Self { client, collector }
    }

    /// Issue one `RetrieveProperties` call and return the decoded reply.
    pub async fn retrieve(
        &self,
        session: &Session,
        spec: &PropertyFilterSpec,
    ) -> VmwareResult<Decoded> {
        debug!(
            "RetrieveProperties via {} ({} object(s), session {})",
            self.collector,
            spec.object_set.len(),
            session.masked_key()
        );
        let fragment = format!(
            "<vim25:RetrieveProperties>{}{}</vim25:RetrieveProperties>",
            this_element(&self.collector),
            spec.to_xml()
        );
        self.client.invoke("RetrieveProperties", &fragment).await
    }

    /// Fetch `paths` for every reference in one batched request.
    ///
    /// References the server returned nothing for are absent from the map.
    /// Duplicate blocks for the same reference are merged.
    pub async fn fetch_properties(
        &self,
        session: &Session,
        refs: &[ObjectReference],
        paths: &[&str],
    ) -> VmwareResult<HashMap<ObjectReference, PropertySet>> {
        let mut result: HashMap<ObjectReference, PropertySet> = HashMap::new();
        let Some(first) = refs.first() else {
            return Ok(result);
        };

        let mut spec =
            PropertyFilterSpec::new().with_props(PropertySpec::new(first.kind.clone(), paths.iter().copied()));
        for r in refs {
            spec = spec.with_object(ObjectSpec::new(r.clone()));
        }

        let decoded = self.retrieve(session, &spec).await?;

        for content in object_contents(decoded.body()) {
            for (path, fault) in &content.missing {
                warn!("{}: property '{path}' unavailable ({fault})", content.obj);
            }
            // Map back onto the requested reference so type casing from the
            // server does not split one VM into two keys.
            let key = refs
                .iter()
                .find(|r| r.value == content.obj.value && r.kind.eq_ignore_ascii_case(&content.obj.kind))
                .cloned()
                .unwrap_or(content.obj);
            result.entry(key).or_default().extend(content.props);
        }

        debug!("RetrieveProperties returned data for {}/{} object(s)", result.len(), refs.len());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VmwareErrorKind;
    use crate::transport::SimulatedTransport;
    use std::sync::Arc;

    const FETCH_REPLY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<soapenv:Body><RetrievePropertiesResponse xmlns="urn:vim25">
  <returnval>
    <obj type="VirtualMachine">1</obj>
    <propSet><name>name</name><val xsi:type="xsd:string">web01</val></propSet>
    <propSet><val xsi:type="VirtualMachinePowerState">poweredOn</val><name>runtime.powerState</name></propSet>
  </returnval>
  <returnval>
    <obj type="VirtualMachine">2</obj>
    <propSet><name>name</name><val>db01</val></propSet>
    <missingSet><path>snapshot</path><fault><fault xsi:type="NoPermission"/></fault></missingSet>
  </returnval>
  <returnval>
    <obj type="virtualmachine">1</obj>
    <PROPSET><NAME>snapshot</NAME><val xsi:type="VirtualMachineSnapshotInfo"><currentSnapshot type="VirtualMachineSnapshot">1-snapshot-3</currentSnapshot></val></PROPSET>
  </returnval>
</RetrievePropertiesResponse></soapenv:Body></soapenv:Envelope>"#;

    fn setup() -> (Arc<SimulatedTransport>, VsphereClient) {
        let sim = Arc::new(SimulatedTransport::new());
        let client = VsphereClient::new(sim.clone(), "/sdk");
        (sim, client)
    }

    fn collector(client: &VsphereClient) -> PropertyCollector<'_> {
        PropertyCollector::new(client, ObjectReference::new("PropertyCollector", "ha-property-collector"))
    }

    #[test]
    fn filter_spec_renders_folder_query() {
        let spec = PropertyFilterSpec::new()
            .with_props(PropertySpec::new("Folder", ["childEntity"]))
            .with_object(ObjectSpec::new(ObjectReference::new("Folder", "ha-folder-vm")).skip(false));
        assert_eq!(
            spec.to_xml(),
            r#"<vim25:specSet><vim25:propSet><vim25:type>Folder</vim25:type><vim25:pathSet>childEntity</vim25:pathSet></vim25:propSet><vim25:objectSet><vim25:obj type="Folder">ha-folder-vm</vim25:obj><vim25:skip>false</vim25:skip></vim25:objectSet></vim25:specSet>"#
        );
    }

    #[test]
    fn object_contents_ignores_tag_order_and_case() {
        let tree = XmlNode::parse(FETCH_REPLY).unwrap();
        let blocks = object_contents(&tree);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].props.text("runtime.powerState"), Some("poweredOn"));
        assert!(blocks[2].props.contains("snapshot"));
        assert_eq!(blocks[1].missing, vec![("snapshot".to_string(), "NoPermission".to_string())]);
    }

    #[test]
    fn object_contents_accepts_objects_wrapper() {
        let tree = XmlNode::parse(
            r#"<RetrievePropertiesExResponse><returnval><objects><obj type="VirtualMachine">5</obj><propSet><name>name</name><val>x</val></propSet></objects><token>t</token></returnval></RetrievePropertiesExResponse>"#,
        )
        .unwrap();
        let blocks = object_contents(&tree);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].obj, ObjectReference::virtual_machine("5"));
    }

    #[tokio::test]
    async fn fetch_batches_and_merges_duplicates() {
        let (sim, client) = setup();
        sim.push_reply(200, FETCH_REPLY).await;

        let refs = vec![
            ObjectReference::virtual_machine("1"),
            ObjectReference::virtual_machine("2"),
            ObjectReference::virtual_machine("3"),
        ];
        let session = Session::new("k");
        let map = collector(&client)
            .fetch_properties(&session, &refs, &["name", "runtime.powerState", "snapshot"])
            .await
            .unwrap();

        let vm1 = &map[&refs[0]];
        assert_eq!(vm1.len(), 3);
        assert_eq!(vm1.text("name"), Some("web01"));
        assert!(vm1.contains("snapshot"));
        assert!(!map[&refs[1]].contains("snapshot"));
        assert!(!map.contains_key(&refs[2]));

        let reqs = sim.requests().await;
        assert_eq!(reqs.len(), 1);
        let body = &reqs[0].body;
        assert_eq!(body.matches("<vim25:objectSet>").count(), 3);
        assert!(body.contains("<vim25:pathSet>runtime.powerState</vim25:pathSet>"));
        assert!(body.contains(r#"<vim25:_this type="PropertyCollector">ha-property-collector</vim25:_this>"#));
    }

    #[tokio::test]
    async fn fetch_with_no_refs_sends_nothing() {
        let (sim, client) = setup();
        let map = collector(&client)
            .fetch_properties(&Session::new("k"), &[], &["name"])
            .await
            .unwrap();
        assert!(map.is_empty());
        assert!(sim.requests().await.is_empty());
    }

    #[tokio::test]
    async fn fault_in_fetch_is_protocol_fault() {
        let (sim, client) = setup();
        sim.push_reply(
            500,
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body><soapenv:Fault><faultcode>ServerFaultCode</faultcode><faultstring>The object 'vim.VirtualMachine:9' has already been deleted or has not been completely created</faultstring></soapenv:Fault></soapenv:Body></soapenv:Envelope>"#,
        )
        .await;
        let err = collector(&client)
            .fetch_properties(&Session::new("k"), &[ObjectReference::virtual_machine("9")], &["name"])
            .await
            .unwrap_err();
        assert_eq!(err.kind, VmwareErrorKind::ProtocolFault);
    }
}
