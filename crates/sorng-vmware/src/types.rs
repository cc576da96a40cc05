//! Shared types for the vim25 snapshot monitor.

use crate::xml::XmlNode;
use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection / Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Top-level configuration for monitoring an ESXi / vCenter endpoint.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VsphereConfig {
    /// ESXi or vCenter hostname / IP (e.g. "esx01.lab.local")
    #[serde(default)]
    pub host: String,
    /// Port (default 443)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username (e.g. "root")
    #[serde(default)]
    pub username: String,
    /// Password
    #[serde(default)]
    pub password: String,
    /// Skip TLS certificate verification (self-signed hosts)
    #[serde(default)]
    pub insecure: bool,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// SOAP endpoint path
    #[serde(default = "default_sdk_path")]
    pub sdk_path: String,
    /// Value of the `SOAPAction` request header
    #[serde(default = "default_soap_action")]
    pub soap_action: String,
    /// Managed-object id of the SessionManager
    #[serde(default = "default_session_manager")]
    pub session_manager: String,
    /// Managed-object id of the PropertyCollector
    #[serde(default = "default_property_collector")]
    pub property_collector: String,
    /// Managed-object id of the folder whose children are enumerated
    #[serde(default = "default_vm_folder")]
    pub vm_folder: String,
    /// Derive snapshot age from `createTime`
    #[serde(default = "default_true")]
    pub compute_snapshot_age: bool,
    /// Close the session at the end of every cycle
    #[serde(default = "default_true")]
    pub logout: bool,
}

fn default_port() -> u16 { 443 }
fn default_timeout() -> u64 { 30 }
fn default_sdk_path() -> String { "/sdk".into() }
fn default_soap_action() -> String { "urn:vim25".into() }
fn default_session_manager() -> String { "ha-sessionmgr".into() }
fn default_property_collector() -> String { "ha-property-collector".into() }
fn default_vm_folder() -> String { "ha-folder-vm".into() }
fn default_true() -> bool { true }

impl Default for VsphereConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
            insecure: false,
            timeout_secs: default_timeout(),
            sdk_path: default_sdk_path(),
            soap_action: default_soap_action(),
            session_manager: default_session_manager(),
            property_collector: default_property_collector(),
            vm_folder: default_vm_folder(),
            compute_snapshot_age: true,
            logout: true,
        }
    }
}

impl fmt::Debug for VsphereConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { "********" };
        f.debug_struct("VsphereConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &password)
            .field("insecure", &self.insecure)
            .field("timeout_secs", &self.timeout_secs)
            .field("sdk_path", &self.sdk_path)
            .field("soap_action", &self.soap_action)
            .field("session_manager", &self.session_manager)
            .field("property_collector", &self.property_collector)
            .field("vm_folder", &self.vm_folder)
            .field("compute_snapshot_age", &self.compute_snapshot_age)
            .field("logout", &self.logout)
            .finish()
    }
}

impl VsphereConfig {
    /// `https://host:port`, without the SDK path.
    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }

    /// Full SOAP endpoint, for display.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url(), self.sdk_path)
    }

    pub fn session_manager_ref(&self) -> ObjectReference {
        ObjectReference::new("SessionManager", &self.session_manager)
    }

    pub fn property_collector_ref(&self) -> ObjectReference {
        ObjectReference::new("PropertyCollector", &self.property_collector)
    }

    pub fn vm_folder_ref(&self) -> ObjectReference {
        ObjectReference::new("Folder", &self.vm_folder)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An authenticated vim25 session. Owned by exactly one collection cycle;
/// deliberately neither `Clone` nor `Serialize`.
pub struct Session {
    key: String,
    pub user_name: Option<String>,
    pub login_time: Option<String>,
}

impl Session {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            user_name: None,
            login_time: None,
        }
    }

    /// The server-issued session key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Key shortened for log output.
    pub fn masked_key(&self) -> String {
        let prefix: String = self.key.chars().take(8).collect();
        format!("{prefix}…")
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.masked_key())
            .field("user_name", &self.user_name)
            .field("login_time", &self.login_time)
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Managed objects & properties
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `VirtualMachine` managed-object type name.
pub const VIRTUAL_MACHINE: &str = "VirtualMachine";

/// Typed opaque identifier of a remote managed entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectReference {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ObjectReference {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    pub fn virtual_machine(value: impl Into<String>) -> Self {
        Self::new(VIRTUAL_MACHINE, value)
    }

    /// Build from a node carrying a `type` attribute and the id as text.
    pub fn from_node(node: &XmlNode) -> Option<Self> {
        let kind = node.attr("type")?;
        let value = node.text.trim();
        if kind.is_empty() || value.is_empty() {
            return None;
        }
        Some(Self::new(kind, value))
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// One `propSet` entry: a property path and its raw value subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyValue {
    pub path: String,
    /// The `val` element; `None` when the block carried no value.
    pub value: Option<XmlNode>,
}

impl PropertyValue {
    /// Trimmed text of the value, if any.
    pub fn text(&self) -> Option<&str> {
        self.value
            .as_ref()
            .map(|v| v.text.trim())
            .filter(|t| !t.is_empty())
    }
}

/// Ordered properties returned for one object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropertySet {
    pub entries: Vec<PropertyValue>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<String>, value: Option<XmlNode>) {
        self.entries.push(PropertyValue {
            path: path.into(),
            value,
        });
    }

    /// First entry for `path` (case-insensitive).
    pub fn get(&self, path: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|p| p.path.eq_ignore_ascii_case(path))
    }

    /// Whether a block for `path` exists, regardless of its value.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Text value for `path`, if present and non-empty.
    pub fn text(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(PropertyValue::text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, other: PropertySet) {
        self.entries.extend(other.entries);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Snapshot health
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Property paths fetched for every VM.
pub const PROP_NAME: &str = "name";
pub const PROP_POWER_STATE: &str = "runtime.powerState";
pub const PROP_SNAPSHOT: &str = "snapshot";

/// Placeholder for a missing name or power state.
pub const UNKNOWN: &str = "Unknown";

/// `runtime.powerState` value of a running VM.
pub const POWERED_ON: &str = "poweredOn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotStatus {
    None,
    /// Snapshot exists and the VM is running on it.
    ActiveWhilePoweredOn,
    /// Snapshot exists but the VM is off or suspended.
    ActiveWhilePaused,
}

impl SnapshotStatus {
    /// Label shown in tabular output.
    pub fn label(&self) -> &'static str {
        match self {
            SnapshotStatus::None => "No",
            SnapshotStatus::ActiveWhilePoweredOn => "YES (powered on)",
            SnapshotStatus::ActiveWhilePaused => "Paused (Snapshot Exists)",
        }
    }
}

/// Evaluator output for one VM, before the caller attaches its id.
#[derive(Debug, Clone, PartialEq)]
pub struct VmHealth {
    pub name: String,
    pub power_state: String,
    pub snapshot_status: SnapshotStatus,
    pub snapshot_age_days: f64,
}

/// One row of collection output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmRecord {
    pub id: ObjectReference,
    pub name: String,
    pub power_state: String,
    pub snapshot_status: SnapshotStatus,
    pub snapshot_age_days: f64,
}

impl VmRecord {
    pub fn new(id: ObjectReference, health: VmHealth) -> Self {
        Self {
            id,
            name: health.name,
            power_state: health.power_state,
            snapshot_status: health.snapshot_status,
            snapshot_age_days: health.snapshot_age_days,
        }
    }

    /// The alerting condition.
    pub fn is_alerting(&self) -> bool {
        self.snapshot_status == SnapshotStatus::ActiveWhilePoweredOn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_debug_masks_password() {
        let cfg = VsphereConfig {
            host: "esx01".into(),
            username: "root".into(),
            password: "s3cr3t-vmware".into(),
            ..Default::default()
        };
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("s3cr3t-vmware"));
        assert!(shown.contains("********"));
        assert!(shown.contains("esx01"));
    }

    #[test]
    fn config_defaults_target_standalone_esxi() {
        let cfg: VsphereConfig =
            serde_json::from_str(r#"{"host":"esx01","username":"root","password":"pw"}"#).unwrap();
        assert_eq!(cfg.port, 443);
        assert_eq!(cfg.sdk_path, "/sdk");
        assert_eq!(cfg.vm_folder_ref(), ObjectReference::new("Folder", "ha-folder-vm"));
        assert_eq!(cfg.session_manager_ref().value, "ha-sessionmgr");
        assert!(cfg.compute_snapshot_age);
        assert!(cfg.logout);
        assert!(!cfg.insecure);
        assert_eq!(cfg.endpoint(), "https://esx01:443/sdk");
    }

    #[test]
    fn config_reads_camel_case_overrides() {
        let cfg: VsphereConfig = serde_json::from_str(
            r#"{"host":"vc","username":"u","password":"p","vmFolder":"group-v3","propertyCollector":"propertyCollector","computeSnapshotAge":false}"#,
        )
        .unwrap();
        assert_eq!(cfg.vm_folder, "group-v3");
        assert_eq!(cfg.property_collector, "propertyCollector");
        assert!(!cfg.compute_snapshot_age);
    }

    #[test]
    fn object_reference_display_and_serde() {
        let r = ObjectReference::virtual_machine("42");
        assert_eq!(r.to_string(), "VirtualMachine:42");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"type":"VirtualMachine","value":"42"}"#);
    }

    #[test]
    fn object_reference_from_node_requires_type_and_text() {
        let mut node = XmlNode::new("obj");
        node.attributes.push(("type".into(), "VirtualMachine".into()));
        node.text = " 7 ".into();
        assert_eq!(ObjectReference::from_node(&node), Some(ObjectReference::virtual_machine("7")));

        node.text.clear();
        assert_eq!(ObjectReference::from_node(&node), None);
    }

    #[test]
    fn property_set_lookup_is_case_insensitive() {
        let mut props = PropertySet::new();
        let mut val = XmlNode::new("val");
        val.text = "poweredOn".into();
        props.push("Runtime.PowerState", Some(val));
        props.push("snapshot", None);

        assert_eq!(props.text("runtime.powerState"), Some("poweredOn"));
        assert!(props.contains("SNAPSHOT"));
        assert_eq!(props.text("snapshot"), None);
        assert!(!props.contains("name"));
    }

    #[test]
    fn session_debug_masks_key() {
        let s = Session::new("52a8c3f0-1234-5678-9abc-def012345678");
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("def012345678"));
        assert!(dbg.contains("52a8c3f0"));
    }

    #[test]
    fn record_serializes_camel_case_status() {
        let rec = VmRecord::new(
            ObjectReference::virtual_machine("1"),
            VmHealth {
                name: "web01".into(),
                power_state: "poweredOn".into(),
                snapshot_status: SnapshotStatus::ActiveWhilePoweredOn,
                snapshot_age_days: 1.5,
            },
        );
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains(r#""snapshotStatus":"activeWhilePoweredOn""#));
        assert!(json.contains(r#""snapshotAgeDays":1.5"#));
        assert!(rec.is_alerting());
    }
}
