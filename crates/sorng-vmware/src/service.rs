//! Collection-cycle façade for the VMware crate.
//!
//! `SnapshotMonitor` owns the `VsphereClient` and runs the two entry points:
//! [`SnapshotMonitor::validate`] (login + enumerate, reported step by step)
//! and [`SnapshotMonitor::collect`] (the full login → enumerate → fetch →
//! evaluate chain). Both take `&mut self`, so a monitor and its cookie jar
//! only ever carry one session at a time.

use crate::error::{VmwareError, VmwareResult};
use crate::inventory::InventoryManager;
use crate::properties::PropertyCollector;
use crate::session::SessionManager;
use crate::snapshot::SnapshotEvaluator;
use crate::types::*;
use crate::vsphere::VsphereClient;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use sorng_core::diagnostics::{self, DiagnosticReport, DiagnosticStep, StepTimer};
use std::time::Instant;
use uuid::Uuid;

/// Protocol label used in diagnostic reports.
pub const PROTOCOL: &str = "vim25-soap";

/// Paths read for every VM.
pub const VM_PROPERTIES: [&str; 3] = [PROP_NAME, PROP_POWER_STATE, PROP_SNAPSHOT];

/// Result of [`SnapshotMonitor::validate`].
#[derive(Debug, Clone)]
pub struct Validation {
    pub report: DiagnosticReport,
    pub vm_count: usize,
    /// The error that stopped validation, if any.
    pub error: Option<VmwareError>,
}

impl Validation {
    pub fn into_result(self) -> VmwareResult<DiagnosticReport> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.report),
        }
    }
}

/// Snapshot monitor bound to one endpoint.
pub struct SnapshotMonitor {
    client: VsphereClient,
    config: VsphereConfig,
    evaluator: SnapshotEvaluator,
}

impl SnapshotMonitor {
    pub fn new(client: VsphereClient, config: VsphereConfig) -> Self {
        let evaluator = SnapshotEvaluator::new(config.compute_snapshot_age);
        Self {
            client,
            config,
            evaluator,
        }
    }

    /// Build a monitor over HTTPS. No network traffic happens here.
    pub fn from_config(config: VsphereConfig) -> VmwareResult<Self> {
        let client = VsphereClient::from_config(&config)?;
        Ok(Self::new(client, config))
    }

    pub fn config(&self) -> &VsphereConfig {
        &self.config
    }

    pub fn endpoint(&self) -> String {
        self.client.endpoint()
    }

    fn sessions(&self) -> SessionManager<'_> {
        SessionManager::new(&self.client, self.config.session_manager_ref())
    }

    fn collector(&self) -> PropertyCollector<'_> {
        PropertyCollector::new(&self.client, self.config.property_collector_ref())
    }

    // ── Collect ─────────────────────────────────────────────────────

    /// Run one full cycle and return one record per enumerated VM, in
    /// enumeration order. Any request failure aborts with no records.
    pub async fn collect(&mut self, now: DateTime<Utc>) -> VmwareResult<Vec<VmRecord>> {
        let cycle = Uuid::new_v4();
        debug!("[{cycle}] starting collection against {}", self.endpoint());

        let session = self
            .sessions()
            .login(&self.config.username, &self.config.password)
            .await
            .map_err(|e| {
                error!("[{cycle}] login failed: {e}");
                e
            })?;

        let result = self.collect_with(&session, now).await;
        self.close(session, &cycle.to_string()).await;

        match &result {
            Ok(records) => info!(
                "[{cycle}] collected {} VM(s), {} running on a snapshot",
                records.len(),
                records.iter().filter(|r| r.is_alerting()).count()
            ),
            Err(e) => error!("[{cycle}] collection failed: {e}"),
        }
        result
    }

    async fn collect_with(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> VmwareResult<Vec<VmRecord>> {
        let collector = self.collector();
        let refs = InventoryManager::new(&collector)
            .enumerate_vms(session, &self.config.vm_folder_ref())
            .await?;
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        let props = collector
            .fetch_properties(session, &refs, &VM_PROPERTIES)
            .await?;

        let records = refs
            .into_iter()
            .map(|id| {
                let empty = PropertySet::new();
                let set = props.get(&id).unwrap_or_else(|| {
                    debug!("{id}: no properties returned");
                    &empty
                });
                let health = self.evaluator.evaluate(set, now);
                VmRecord::new(id, health)
            })
            .collect();
        Ok(records)
    }

    /// Best-effort logout; never changes the cycle result.
    async fn close(&self, session: Session, cycle: &str) {
        if !self.config.logout {
            return;
        }
        if let Err(e) = self.sessions().logout(session).await {
            warn!("[{cycle}] logout failed: {e}");
        }
    }

    // ── Validate ────────────────────────────────────────────────────

    /// Login and enumerate, recording each step.
    pub async fn validate(&mut self) -> Validation {
        let start = Instant::now();
        let mut steps: Vec<DiagnosticStep> = Vec::new();
        let mut vm_count = 0;

        let timer = StepTimer::start("Login");
        let session = match self
            .sessions()
            .login(&self.config.username, &self.config.password)
            .await
        {
            Ok(s) => {
                let who = s.user_name.clone().unwrap_or_else(|| self.config.username.clone());
                timer.pass(format!("Authenticated as {who}"), &mut steps);
                s
            }
            Err(e) => {
                timer.fail(e.message.clone(), Some(e.kind.category().to_string()), &mut steps);
                diagnostics::skip_step("Enumerate VMs", &mut steps);
                diagnostics::skip_step("Logout", &mut steps);
                return self.finish(steps, start, vm_count, Some(e));
            }
        };

        let timer = StepTimer::start("Enumerate VMs");
        let enumerated = {
            let collector = self.collector();
            InventoryManager::new(&collector)
                .enumerate_vms(&session, &self.config.vm_folder_ref())
                .await
        };
        let failure = match enumerated {
            Ok(refs) => {
                vm_count = refs.len();
                timer.pass(
                    format!("{} virtual machine(s) in {}", refs.len(), self.config.vm_folder_ref()),
                    &mut steps,
                );
                None
            }
            Err(e) => {
                timer.fail(e.message.clone(), Some(e.kind.category().to_string()), &mut steps);
                Some(e)
            }
        };

        let timer = StepTimer::start("Logout");
        if self.config.logout {
            match self.sessions().logout(session).await {
                Ok(()) => timer.pass("Session closed", &mut steps),
                Err(e) => timer.finish(
                    diagnostics::StepStatus::Warn,
                    e.message,
                    Some(e.kind.category().to_string()),
                    &mut steps,
                ),
            }
        } else {
            timer.finish(
                diagnostics::StepStatus::Info,
                "Logout disabled; session left open",
                None,
                &mut steps,
            );
        }

        self.finish(steps, start, vm_count, failure)
    }

    fn finish(
        &self,
        steps: Vec<DiagnosticStep>,
        start: Instant,
        vm_count: usize,
        error: Option<VmwareError>,
    ) -> Validation {
        let report = diagnostics::finish_report(&self.endpoint(), PROTOCOL, steps, start);
        Validation {
            report,
            vm_count,
            error,
        }
    }
}
