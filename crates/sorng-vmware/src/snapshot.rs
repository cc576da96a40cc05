//! Snapshot health evaluation for one VM's property set.

use crate::types::*;
use crate::xml::XmlNode;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::warn;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Derives [`VmHealth`] from the `name`, `runtime.powerState` and
/// `snapshot` properties. Pure; the clock is passed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEvaluator {
    /// Derive an age from the oldest `createTime` in the snapshot tree.
    pub compute_age: bool,
}

impl Default for SnapshotEvaluator {
    fn default() -> Self {
        Self { compute_age: true }
    }
}

impl SnapshotEvaluator {
    pub fn new(compute_age: bool) -> Self {
        Self { compute_age }
    }

    pub fn evaluate(&self, props: &PropertySet, now: DateTime<Utc>) -> VmHealth {
        let name = props.text(PROP_NAME).unwrap_or(UNKNOWN).to_string();
        let power_state = props.text(PROP_POWER_STATE).unwrap_or(UNKNOWN).to_string();

        // Presence of the block is what matters, not its contents.
        let snapshot = props.get(PROP_SNAPSHOT);

        let snapshot_status = match snapshot {
            Some(_) if power_state == POWERED_ON => {
                SnapshotStatus::ActiveWhilePoweredOn
            }
            Some(_) => SnapshotStatus::ActiveWhilePaused,
            None => SnapshotStatus::None,
        };

        let snapshot_age_days = match snapshot.and_then(|p| p.value.as_ref()) {
            Some(tree) if self.compute_age => oldest_create_time(tree, &name)
                .map(|ts| age_days(ts, now))
                .unwrap_or(0.0),
            _ => 0.0,
        };

        VmHealth {
            name,
            power_state,
            snapshot_status,
            snapshot_age_days,
        }
    }
}

/// Oldest parseable `createTime` anywhere in the snapshot tree.
fn oldest_create_time(tree: &XmlNode, vm_name: &str) -> Option<DateTime<Utc>> {
    tree.find_all(|n| n.is("createTime"))
        .into_iter()
        .filter_map(|n| {
            let raw = n.text.trim();
            let parsed = parse_timestamp(raw);
            if parsed.is_none() && !raw.is_empty() {
                warn!("{vm_name}: ignoring unparseable snapshot createTime '{raw}'");
            }
            parsed
        })
        .min()
}

/// RFC 3339, or a naive ISO timestamp taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Whole-day age rounded to two decimals; never negative.
fn age_days(created: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = (now - created).num_milliseconds() as f64 / MS_PER_DAY;
    (days.max(0.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    fn text_node(name: &str, text: &str) -> XmlNode {
        let mut n = XmlNode::new(name);
        n.text = text.into();
        n
    }

    fn snapshot_tree(times: &[&str]) -> XmlNode {
        let mut val = XmlNode::new("val");
        let mut parent = &mut val;
        for t in times {
            let mut entry = XmlNode::new("rootSnapshotList");
            entry.children.push(text_node("name", "before-patch"));
            entry.children.push(text_node("createTime", t));
            parent.children.push(entry);
            parent = parent.children.last_mut().unwrap();
        }
        val
    }

    fn props(power: Option<&str>, snapshot: Option<XmlNode>) -> PropertySet {
        let mut p = PropertySet::new();
        p.push(PROP_NAME, Some(text_node("val", "web01")));
        if let Some(state) = power {
            p.push(PROP_POWER_STATE, Some(text_node("val", state)));
        }
        if let Some(tree) = snapshot {
            p.push(PROP_SNAPSHOT, Some(tree));
        }
        p
    }

    #[test]
    fn no_snapshot_is_none_for_every_power_state() {
        let eval = SnapshotEvaluator::default();
        for state in [Some("poweredOn"), Some("poweredOff"), Some("suspended"), None] {
            let h = eval.evaluate(&props(state, None), now());
            assert_eq!(h.snapshot_status, SnapshotStatus::None);
            assert_eq!(h.snapshot_age_days, 0.0);
        }
    }

    #[test]
    fn status_depends_only_on_power_state_when_snapshot_present() {
        let eval = SnapshotEvaluator::default();
        let on = eval.evaluate(&props(Some("poweredOn"), Some(XmlNode::new("val"))), now());
        assert_eq!(on.snapshot_status, SnapshotStatus::ActiveWhilePoweredOn);
        for state in ["poweredOff", "suspended", "POWEREDON", "poweredon"] {
            let h = eval.evaluate(&props(Some(state), Some(XmlNode::new("val"))), now());
            assert_eq!(h.snapshot_status, SnapshotStatus::ActiveWhilePaused);
        }
    }

    #[test]
    fn snapshot_block_without_value_still_counts() {
        let mut p = props(Some("poweredOn"), None);
        p.push(PROP_SNAPSHOT, None);
        let h = SnapshotEvaluator::default().evaluate(&p, now());
        assert_eq!(h.snapshot_status, SnapshotStatus::ActiveWhilePoweredOn);
        assert_eq!(h.snapshot_age_days, 0.0);
    }

    #[test]
    fn missing_fields_become_unknown() {
        let h = SnapshotEvaluator::default().evaluate(&PropertySet::new(), now());
        assert_eq!(h.name, UNKNOWN);
        assert_eq!(h.power_state, UNKNOWN);
        assert_eq!(h.snapshot_status, SnapshotStatus::None);
    }

    #[test]
    fn thirty_six_hours_is_one_and_a_half_days() {
        let created = (now() - Duration::hours(36)).to_rfc3339();
        let h = SnapshotEvaluator::default()
            .evaluate(&props(Some("poweredOn"), Some(snapshot_tree(&[&created]))), now());
        assert_eq!(h.snapshot_age_days, 1.5);
    }

    #[test]
    fn oldest_create_time_wins() {
        let tree = snapshot_tree(&["2024-06-09T12:00:00Z", "2024-06-01T00:00:00.000Z", "garbage"]);
        let h = SnapshotEvaluator::default().evaluate(&props(Some("poweredOff"), Some(tree)), now());
        assert_eq!(h.snapshot_age_days, 9.5);
    }

    #[test]
    fn naive_timestamp_is_utc() {
        assert_eq!(
            parse_timestamp("2024-06-10T00:00:00.5"),
            Some(Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap() + Duration::milliseconds(500))
        );
        assert_eq!(
            parse_timestamp("2024-06-10T02:00:00+02:00"),
            Some(Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn future_timestamp_clamps_to_zero() {
        let tree = snapshot_tree(&["2030-01-01T00:00:00Z"]);
        let h = SnapshotEvaluator::default().evaluate(&props(Some("poweredOn"), Some(tree)), now());
        assert_eq!(h.snapshot_age_days, 0.0);
    }

    #[test]
    fn age_disabled_reports_zero() {
        let tree = snapshot_tree(&["2024-06-01T00:00:00Z"]);
        let h = SnapshotEvaluator::new(false).evaluate(&props(Some("poweredOn"), Some(tree)), now());
        assert_eq!(h.snapshot_status, SnapshotStatus::ActiveWhilePoweredOn);
        assert_eq!(h.snapshot_age_days, 0.0);
    }

    #[test]
    fn evaluation_is_idempotent_and_age_monotonic() {
        let eval = SnapshotEvaluator::default();
        let p = props(Some("poweredOn"), Some(snapshot_tree(&["2024-06-01T08:15:00Z"])));
        assert_eq!(eval.evaluate(&p, now()), eval.evaluate(&p, now()));

        let mut last = -1.0;
        for hours in 0..72 {
            let age = eval.evaluate(&p, now() + Duration::hours(hours)).snapshot_age_days;
            assert!(age >= last);
            last = age;
        }
    }
}
