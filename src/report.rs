//! Rendering of collection results and diagnostic reports.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sorng_core::diagnostics::DiagnosticReport;
use sorng_vmware::VmRecord;

const HEADERS: [&str; 5] = [
    "Id",
    "Name",
    "Power State",
    "Running on Snapshot",
    "Snapshot Age (days)",
];

/// JSON document printed by `collect --json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectOutput<'a> {
    pub endpoint: &'a str,
    pub collected_at: DateTime<Utc>,
    pub alerting: usize,
    pub records: &'a [VmRecord],
}

impl<'a> CollectOutput<'a> {
    pub fn new(endpoint: &'a str, collected_at: DateTime<Utc>, records: &'a [VmRecord]) -> Self {
        Self {
            endpoint,
            collected_at,
            alerting: records.iter().filter(|r| r.is_alerting()).count(),
            records,
        }
    }
}

pub fn write_json<T: Serialize>(out: &mut impl Write, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

fn row(record: &VmRecord) -> [String; 5] {
    [
        record.id.value.clone(),
        record.name.clone(),
        record.power_state.clone(),
        record.snapshot_status.label().to_string(),
        format!("{:.2}", record.snapshot_age_days),
    ]
}

/// Plain-text table, one row per record.
pub fn write_table(out: &mut impl Write, records: &[VmRecord]) -> io::Result<()> {
    if records.is_empty() {
        return writeln!(out, "No virtual machines found.");
    }

    let rows: Vec<[String; 5]> = records.iter().map(row).collect();
    let mut widths = HEADERS.map(|h| h.chars().count());
    for r in &rows {
        for (w, cell) in widths.iter_mut().zip(r.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let header: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    write_row(out, &header, &widths)?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_row(out, &rule, &widths)?;
    for r in &rows {
        write_row(out, r, &widths)?;
    }
    Ok(())
}

fn write_row(out: &mut impl Write, cells: &[String], widths: &[usize]) -> io::Result<()> {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(c, w)| format!("{c:<w$}", w = *w))
        .collect();
    writeln!(out, "{}", line.join("  ").trim_end())
}

/// Step list plus summary for `validate`.
pub fn write_diagnostics(out: &mut impl Write, report: &DiagnosticReport) -> io::Result<()> {
    writeln!(out, "{} ({})", report.endpoint, report.protocol)?;
    for step in &report.steps {
        write!(
            out,
            "  [{:<4}] {:<14} {:>6} ms  {}",
            step.status.to_string().to_uppercase(),
            step.name,
            step.duration_ms,
            step.message
        )?;
        match &step.detail {
            Some(detail) => writeln!(out, " ({detail})")?,
            None => writeln!(out)?,
        }
    }
    writeln!(out, "{}", report.summary)?;
    writeln!(out, "Total: {} ms", report.total_duration_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sorng_core::diagnostics::{finish_report, StepTimer};
    use sorng_vmware::types::VmHealth;
    use sorng_vmware::{ObjectReference, SnapshotStatus};
    use std::time::Instant;

    fn record(id: &str, name: &str, state: &str, status: SnapshotStatus, age: f64) -> VmRecord {
        VmRecord::new(
            ObjectReference::virtual_machine(id),
            VmHealth {
                name: name.into(),
                power_state: state.into(),
                snapshot_status: status,
                snapshot_age_days: age,
            },
        )
    }

    #[test]
    fn table_uses_human_labels() {
        let records = vec![
            record("1", "web01", "poweredOn", SnapshotStatus::ActiveWhilePoweredOn, 1.5),
            record("12", "db01", "poweredOff", SnapshotStatus::ActiveWhilePaused, 0.0),
            record("3", "build", "poweredOn", SnapshotStatus::None, 0.0),
        ];
        let mut buf = Vec::new();
        write_table(&mut buf, &records).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("Id  Name"));
        assert!(lines[2].contains("YES (powered on)"));
        assert!(lines[2].ends_with("1.50"));
        assert!(lines[3].contains("Paused (Snapshot Exists)"));
        assert!(lines[4].contains("No"));
    }

    #[test]
    fn empty_table_says_so() {
        let mut buf = Vec::new();
        write_table(&mut buf, &[]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "No virtual machines found.\n");
    }

    #[test]
    fn json_output_counts_alerts() {
        let records = vec![
            record("1", "web01", "poweredOn", SnapshotStatus::ActiveWhilePoweredOn, 2.25),
            record("2", "db01", "poweredOff", SnapshotStatus::ActiveWhilePaused, 0.0),
        ];
        let at = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let mut buf = Vec::new();
        write_json(&mut buf, &CollectOutput::new("https://esx01:443/sdk", at, &records)).unwrap();

        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v["alerting"], 1);
        assert_eq!(v["records"][0]["id"]["value"], "1");
        assert_eq!(v["records"][0]["snapshotStatus"], "activeWhilePoweredOn");
        assert_eq!(v["records"][1]["snapshotAgeDays"], 0.0);
    }

    #[test]
    fn diagnostics_list_each_step() {
        let mut steps = Vec::new();
        StepTimer::start("Login").pass("Authenticated as root", &mut steps);
        StepTimer::start("Enumerate VMs").fail("HTTP 503", Some("unexpected-status".into()), &mut steps);
        let report = finish_report("https://esx01:443/sdk", "vim25-soap", steps, Instant::now());

        let mut buf = Vec::new();
        write_diagnostics(&mut buf, &report).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("[PASS] Login"));
        assert!(text.contains("[FAIL] Enumerate VMs"));
        assert!(text.contains("(unexpected-status)"));
        assert!(text.contains("Stopped at: Enumerate VMs"));
    }
}
