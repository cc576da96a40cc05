//! # sorng-vmware: snapshot health monitor
//!
//! Talks to the vim25 SOAP endpoint of an ESXi host or vCenter, lists the
//! virtual machines in a folder and reports which of them are running on
//! an uncommitted snapshot, and for how long.
//!
//! ## Modules
//!
//! - **types**: Config, session, object references, property sets, records
//! - **error**: Crate-specific error types
//! - **xml**: Schema-tolerant XML tree with predicate lookups
//! - **envelope**: SOAP envelope encode / decode with fault detection
//! - **transport**: `SoapTransport` trait, reqwest and simulated impls
//! - **vsphere**: vim25 client: one request, one classified reply
//! - **session**: SessionManager login / logout
//! - **properties**: PropertyCollector filter specs and `ObjectContent` parsing
//! - **inventory**: VM enumeration from a root folder
//! - **snapshot**: Snapshot health evaluation
//! - **service**: `SnapshotMonitor` façade running validate / collect cycles

pub mod types;
pub mod error;
pub mod xml;
pub mod envelope;
pub mod transport;
pub mod vsphere;
pub mod session;
pub mod properties;
pub mod inventory;
pub mod snapshot;
pub mod service;

pub use error::{VmwareError, VmwareErrorKind, VmwareResult};
pub use service::{SnapshotMonitor, Validation};
pub use types::{ObjectReference, SnapshotStatus, VmRecord, VsphereConfig};
