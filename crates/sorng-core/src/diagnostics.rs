//! Shared step-by-step diagnostics infrastructure.
//!
//! A monitor entry point records each stage it runs (login, enumeration,
//! property fetch, ...) as a [`DiagnosticStep`] and folds them into a
//! [`DiagnosticReport`] for the caller to render.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

// ─── Shared types ───────────────────────────────────────────────────────────

/// Outcome of a single diagnostic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pass,
    Fail,
    Skip,
    Warn,
    Info,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pass => "pass",
            StepStatus::Fail => "fail",
            StepStatus::Skip => "skip",
            StepStatus::Warn => "warn",
            StepStatus::Info => "info",
        };
        f.write_str(s)
    }
}

/// Result of a single diagnostic step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticStep {
    pub name: String,
    pub status: StepStatus,
    pub message: String,
    pub duration_ms: u64,
    pub detail: Option<String>,
}

/// Full diagnostic report for one run against an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub endpoint: String,
    pub protocol: String,
    pub steps: Vec<DiagnosticStep>,
    pub summary: String,
    /// Wall-clock milliseconds for the entire run.
    pub total_duration_ms: u64,
}

impl DiagnosticReport {
    /// True when no step failed.
    pub fn is_success(&self) -> bool {
        !self.steps.iter().any(|s| s.status == StepStatus::Fail)
    }

    /// First failing step, if any.
    pub fn first_failure(&self) -> Option<&DiagnosticStep> {
        self.steps.iter().find(|s| s.status == StepStatus::Fail)
    }
}

// ─── Step timer ─────────────────────────────────────────────────────────────

/// Measures one step and pushes it onto a step list when finished.
pub struct StepTimer {
    name: String,
    started: Instant,
}

impl StepTimer {
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            started: Instant::now(),
        }
    }

    pub fn finish(
        self,
        status: StepStatus,
        message: impl Into<String>,
        detail: Option<String>,
        steps: &mut Vec<DiagnosticStep>,
    ) {
        steps.push(DiagnosticStep {
            name: self.name,
            status,
            message: message.into(),
            duration_ms: self.started.elapsed().as_millis() as u64,
            detail,
        });
    }

    pub fn pass(self, message: impl Into<String>, steps: &mut Vec<DiagnosticStep>) {
        self.finish(StepStatus::Pass, message, None, steps);
    }

    pub fn fail(
        self,
        message: impl Into<String>,
        detail: Option<String>,
        steps: &mut Vec<DiagnosticStep>,
    ) {
        self.finish(StepStatus::Fail, message, detail, steps);
    }
}

/// Record a step that never ran because an earlier one failed.
pub fn skip_step(name: &str, steps: &mut Vec<DiagnosticStep>) {
    steps.push(DiagnosticStep {
        name: name.into(),
        status: StepStatus::Skip,
        message: "Skipped after an earlier failure".into(),
        duration_ms: 0,
        detail: None,
    });
}

/// Build the final report from accumulated steps.
pub fn finish_report(
    endpoint: &str,
    protocol: &str,
    steps: Vec<DiagnosticStep>,
    start: Instant,
) -> DiagnosticReport {
    let all_pass = steps
        .iter()
        .all(|s| matches!(s.status, StepStatus::Pass | StepStatus::Info));
    let first_fail = steps.iter().find(|s| s.status == StepStatus::Fail);
    let any_warn = steps.iter().any(|s| s.status == StepStatus::Warn);

    let summary = if all_pass {
        "All steps passed; the endpoint accepted the session and answered queries.".into()
    } else if let Some(fail) = first_fail {
        format!("Stopped at: {}: {}", fail.name, fail.message)
    } else if any_warn {
        "Completed with warnings.".into()
    } else {
        "Completed with mixed results.".into()
    };

    DiagnosticReport {
        endpoint: endpoint.to_string(),
        protocol: protocol.to_string(),
        steps,
        summary,
        total_duration_ms: start.elapsed().as_millis() as u64,
    }
}
