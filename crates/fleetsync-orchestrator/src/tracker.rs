//! Health status tracker: per-host, per-check status with exclusivity.
//!
//! Hosts record their own puppet and validation outcomes under
//! `/status/{check_type}/{status_value}/{hostname}`. Operators aggregate
//! those together with the external health source to decide whether the
//! fleet is healthy.

use std::collections::BTreeSet;
use std::fmt;

use fleetsync_state::{epoch_secs, CheckState, HealthCheck, HealthSource, KvStore};
use tracing::{debug, info, warn};

use crate::error::OrchestrateResult;
use crate::keys;
use crate::reconcile::retain_only;
use crate::status::{CheckType, StatusValue};

/// A (node, check) pair that counts against fleet health.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FailingCheck {
    pub node: String,
    pub check: String,
}

impl FailingCheck {
    pub fn new(node: &str, check: &str) -> Self {
        Self {
            node: node.to_string(),
            check: check.to_string(),
        }
    }
}

impl From<&HealthCheck> for FailingCheck {
    fn from(c: &HealthCheck) -> Self {
        Self::new(&c.node, &c.name)
    }
}

impl fmt::Display for FailingCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node: {}, Check: {}", self.node, self.check)
    }
}

/// Aggregated view of everything failing in the fleet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureReport {
    /// Hard failures: critical checks, puppet/validation warnings, and
    /// the tracker's own `failed` records.
    pub failures: BTreeSet<FailingCheck>,
    /// Every other warning.
    pub warnings: BTreeSet<FailingCheck>,
    /// Whether `warnings` count against health.
    pub strict: bool,
}

impl FailureReport {
    pub fn is_healthy(&self) -> bool {
        self.failures.is_empty() && (!self.strict || self.warnings.is_empty())
    }
}

/// One line per failing (node, check) pair, grouped under `Failures:` and,
/// when they count, `Warnings:`. Empty for a healthy fleet.
impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.failures.is_empty() {
            writeln!(f, "Failures:")?;
            for check in &self.failures {
                writeln!(f, "  {check}")?;
            }
        }
        if self.strict && !self.warnings.is_empty() {
            writeln!(f, "Warnings:")?;
            for check in &self.warnings {
                writeln!(f, "  {check}")?;
            }
        }
        Ok(())
    }
}

/// Whether a check the health source calls a warning is really a failure.
///
/// puppet and validation report failures as warnings so the health source
/// keeps services registered while a host bootstraps.
fn is_bootstrap_check(name: &str) -> bool {
    CheckType::ALL.iter().any(|t| t.as_str() == name)
}

pub struct StatusTracker<S, H> {
    store: S,
    health: H,
}

impl<S: KvStore, H: HealthSource> StatusTracker<S, H> {
    pub fn new(store: S, health: H) -> Self {
        Self { store, health }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn health(&self) -> &H {
        &self.health
    }

    /// Record the outcome of a check run on `hostname`.
    ///
    /// `status_type` must be `puppet` or `validation`; `result` is the raw
    /// exit code of the run. Returns the status recorded.
    pub async fn update_own_status(
        &self,
        hostname: &str,
        status_type: &str,
        result: i32,
    ) -> OrchestrateResult<StatusValue> {
        let check: CheckType = status_type.parse()?;
        let status = check.classify(result);

        let own_key = keys::status_key(check, status, hostname);
        self.store
            .set(&own_key, &epoch_secs().to_string(), None)
            .await?;

        let others = check
            .statuses()
            .iter()
            .map(|s| keys::status_key(check, *s, hostname));
        retain_only(&self.store, others, &own_key).await?;

        info!(%hostname, %check, %status, result, "status updated");
        Ok(status)
    }

    /// Hosts with a `failed` record for the given check type.
    pub async fn failed_hosts(&self, check: CheckType) -> OrchestrateResult<BTreeSet<String>> {
        let dir = keys::status_dir(check, StatusValue::Failed);
        let Some(found) = self.store.find(&dir).await? else {
            return Ok(BTreeSet::new());
        };
        Ok(found
            .iter()
            .filter_map(|key| match keys::segments_below(&dir, key)?.as_slice() {
                [host] if !host.is_empty() => Some(host.to_string()),
                _ => None,
            })
            .collect())
    }

    /// Combine the health source with the tracker's own failure records.
    pub async fn failure_report(&self, show_warnings: bool) -> OrchestrateResult<FailureReport> {
        let critical = self.health.checks_in_state(CheckState::Critical).await?;
        let warning = self.health.checks_in_state(CheckState::Warning).await?;

        let mut report = FailureReport {
            strict: show_warnings,
            ..FailureReport::default()
        };
        report.failures.extend(critical.iter().map(FailingCheck::from));
        for check in &warning {
            if is_bootstrap_check(&check.name) {
                report.failures.insert(check.into());
            } else {
                report.warnings.insert(check.into());
            }
        }
        for check in CheckType::ALL {
            for host in self.failed_hosts(check).await? {
                report.failures.insert(FailingCheck::new(&host, check.as_str()));
            }
        }

        debug!(
            failures = report.failures.len(),
            warnings = report.warnings.len(),
            "failure report"
        );
        Ok(report)
    }

    /// True iff nothing in the fleet is failing.
    ///
    /// With `hosts`, each failing (node, check) pair is emitted, along with
    /// the warnings that count when `show_warnings` is set.
    pub async fn get_failures(&self, hosts: bool, show_warnings: bool) -> OrchestrateResult<bool> {
        let report = self.failure_report(show_warnings).await?;
        if hosts {
            for line in report.to_string().lines() {
                warn!("{line}");
            }
        }
        Ok(report.is_healthy())
    }

    /// Checks on `hostname` that are critical, or are puppet/validation
    /// warnings.
    pub async fn local_health(
        &self,
        hostname: &str,
        verbose: bool,
    ) -> OrchestrateResult<Vec<HealthCheck>> {
        let failing: Vec<HealthCheck> = self
            .health
            .node_checks(hostname)
            .await?
            .into_iter()
            .filter(|c| {
                c.status == CheckState::Critical
                    || (c.status == CheckState::Warning && is_bootstrap_check(&c.name))
            })
            .collect();
        if verbose {
            for c in &failing {
                info!("{}: {}", c.name, c.output);
            }
        }
        Ok(failing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestrateError;
    use fleetsync_state::{MemoryHealth, MemoryStore};

    fn tracker() -> StatusTracker<MemoryStore, MemoryHealth> {
        StatusTracker::new(MemoryStore::new(), MemoryHealth::new())
    }

    async fn statuses_of(
        t: &StatusTracker<MemoryStore, MemoryHealth>,
        check: CheckType,
        host: &str,
    ) -> Vec<StatusValue> {
        let mut present = Vec::new();
        for s in check.statuses() {
            if t.store().get(&keys::status_key(check, *s, host)).await.unwrap().is_some() {
                present.push(*s);
            }
        }
        present
    }

    #[tokio::test]
    async fn every_result_leaves_exactly_one_status() {
        let cases = [
            ("puppet", vec![1, 4, 6], StatusValue::Failed),
            ("puppet", vec![0, 2], StatusValue::Success),
            ("puppet", vec![-1], StatusValue::Pending),
            ("validation", vec![1], StatusValue::Failed),
            ("validation", vec![0], StatusValue::Success),
        ];
        let t = tracker();
        for (status_type, results, expected) in cases {
            let check: CheckType = status_type.parse().unwrap();
            for result in results {
                // Seed every status so the exclusivity sweep has work to do.
                for s in check.statuses() {
                    t.store()
                        .set(&keys::status_key(check, *s, "testhost"), "1", None)
                        .await
                        .unwrap();
                }
                let recorded = t.update_own_status("testhost", status_type, result).await.unwrap();
                assert_eq!(recorded, expected);
                assert_eq!(statuses_of(&t, check, "testhost").await, vec![expected]);
            }
        }
    }

    #[tokio::test]
    async fn status_value_is_a_timestamp() {
        let t = tracker();
        let before = epoch_secs();
        t.update_own_status("h", "validation", 0).await.unwrap();
        let stamp: u64 = t
            .store()
            .get("/status/validation/success/h")
            .await
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();
        assert!(stamp >= before);
    }

    #[tokio::test]
    async fn unknown_status_type_is_invalid_argument() {
        let t = tracker();
        let err = t.update_own_status("h", "ntp", 0).await.unwrap_err();
        assert!(matches!(err, OrchestrateError::InvalidArgument(_)));
        assert!(t.store().is_empty());
    }

    #[tokio::test]
    async fn other_hosts_are_untouched() {
        let t = tracker();
        t.update_own_status("h1", "puppet", 4).await.unwrap();
        t.update_own_status("h2", "puppet", 0).await.unwrap();
        assert_eq!(statuses_of(&t, CheckType::Puppet, "h1").await, vec![StatusValue::Failed]);
        assert_eq!(statuses_of(&t, CheckType::Puppet, "h2").await, vec![StatusValue::Success]);
    }

    #[tokio::test]
    async fn healthy_fleet_has_no_failures() {
        let t = tracker();
        t.health()
            .register(HealthCheck::new("cp1", "serfHealth", CheckState::Passing));
        t.update_own_status("cp1", "puppet", 0).await.unwrap();
        assert!(t.get_failures(true, true).await.unwrap());
    }

    #[tokio::test]
    async fn critical_checks_fail() {
        let t = tracker();
        t.health()
            .register(HealthCheck::new("cp1", "nova-api", CheckState::Critical));
        assert!(!t.get_failures(false, false).await.unwrap());
    }

    #[tokio::test]
    async fn bootstrap_warnings_are_failures_others_only_with_show_warnings() {
        let t = tracker();
        t.health()
            .register(HealthCheck::new("st1", "disk", CheckState::Warning));
        assert!(t.get_failures(false, false).await.unwrap());
        assert!(!t.get_failures(false, true).await.unwrap());

        t.health()
            .register(HealthCheck::new("cp1", "validation", CheckState::Warning));
        assert!(!t.get_failures(false, false).await.unwrap());

        let report = t.failure_report(false).await.unwrap();
        assert_eq!(
            report.failures,
            BTreeSet::from([FailingCheck::new("cp1", "validation")])
        );
        assert_eq!(report.warnings, BTreeSet::from([FailingCheck::new("st1", "disk")]));
    }

    #[tokio::test]
    async fn own_failed_records_fold_in_once() {
        let t = tracker();
        t.update_own_status("cp1", "puppet", 6).await.unwrap();
        t.update_own_status("ctrl1", "validation", 1).await.unwrap();
        // Same failure also visible through the health source.
        t.health()
            .register(HealthCheck::new("cp1", "puppet", CheckState::Warning));

        let report = t.failure_report(false).await.unwrap();
        assert_eq!(
            report.failures,
            BTreeSet::from([
                FailingCheck::new("cp1", "puppet"),
                FailingCheck::new("ctrl1", "validation"),
            ])
        );
        assert!(!report.is_healthy());

        t.update_own_status("cp1", "puppet", 0).await.unwrap();
        t.update_own_status("ctrl1", "validation", 0).await.unwrap();
        t.health()
            .register(HealthCheck::new("cp1", "puppet", CheckState::Passing));
        assert!(t.get_failures(true, false).await.unwrap());
    }

    #[tokio::test]
    async fn report_lists_failures_and_counted_warnings() {
        let t = tracker();
        t.update_own_status("cp1", "puppet", 4).await.unwrap();
        t.health()
            .register(HealthCheck::new("st1", "disk", CheckState::Warning));
        t.health()
            .register(HealthCheck::new("ctrl1", "nova-api", CheckState::Critical));

        let lenient = t.failure_report(false).await.unwrap();
        assert_eq!(
            lenient.to_string(),
            "Failures:\n  Node: cp1, Check: puppet\n  Node: ctrl1, Check: nova-api\n"
        );

        let strict = t.failure_report(true).await.unwrap();
        assert_eq!(
            strict.to_string(),
            "Failures:\n  Node: cp1, Check: puppet\n  Node: ctrl1, Check: nova-api\n\
             Warnings:\n  Node: st1, Check: disk\n"
        );
    }

    #[tokio::test]
    async fn healthy_report_prints_nothing() {
        let t = tracker();
        t.health()
            .register(HealthCheck::new("st1", "disk", CheckState::Warning));
        assert_eq!(t.failure_report(false).await.unwrap().to_string(), "");
    }

    #[tokio::test]
    async fn failed_hosts_ignores_prefix_neighbours() {
        let t = tracker();
        t.store()
            .set("/status/puppet/failed_old/h9", "1", None)
            .await
            .unwrap();
        t.update_own_status("h1", "puppet", 1).await.unwrap();
        assert_eq!(
            t.failed_hosts(CheckType::Puppet).await.unwrap(),
            BTreeSet::from(["h1".to_string()])
        );
    }

    #[tokio::test]
    async fn local_health_filters_node_checks() {
        let t = tracker();
        t.health().register(
            HealthCheck::new("cp1", "puppet", CheckState::Warning).with_output("exit 4"),
        );
        t.health()
            .register(HealthCheck::new("cp1", "disk", CheckState::Warning));
        t.health()
            .register(HealthCheck::new("cp1", "nova", CheckState::Critical));
        t.health()
            .register(HealthCheck::new("cp2", "nova", CheckState::Critical));

        let failing = t.local_health("cp1", true).await.unwrap();
        let names: Vec<&str> = failing.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["puppet", "nova"]);
    }
}
