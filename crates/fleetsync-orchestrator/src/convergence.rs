//! Convergence predicates over snapshots of fleet state.
//!
//! Pure functions; the coordinator feeds them whatever the store returned.
//! A snapshot may be stale, so callers poll until the answer is stable.

use std::collections::BTreeSet;
use std::fmt;

/// How the running versions relate to one wanted version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpread {
    pub wanted: String,
    pub wanted_found: bool,
    /// Every running version other than `wanted`.
    pub unwanted: BTreeSet<String>,
}

impl VersionSpread {
    pub fn of(running: &BTreeSet<String>, wanted: &str) -> Self {
        Self {
            wanted: wanted.to_string(),
            wanted_found: running.contains(wanted),
            unwanted: running.iter().filter(|v| *v != wanted).cloned().collect(),
        }
    }

    /// The fleet runs `wanted` and nothing else.
    pub fn is_converged(&self) -> bool {
        self.wanted_found && self.unwanted.is_empty()
    }
}

impl fmt::Display for VersionSpread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unwanted: Vec<&str> = self.unwanted.iter().map(String::as_str).collect();
        writeln!(f, "Wanted version found: {}", self.wanted_found)?;
        write!(f, "Unwanted versions found: {}", unwanted.join(", "))
    }
}

/// Every expected host is registered. Extra registered hosts are fine.
pub fn all_registered<S: AsRef<str>>(expected: &[S], registered: &BTreeSet<String>) -> bool {
    expected.iter().all(|h| registered.contains(h.as_ref()))
}

/// Expected hosts that are not registered.
pub fn missing_hosts<S: AsRef<str>>(expected: &[S], registered: &BTreeSet<String>) -> BTreeSet<String> {
    expected
        .iter()
        .map(|h| h.as_ref())
        .filter(|h: &&str| !registered.contains(*h))
        .map(str::to_string)
        .collect()
}
