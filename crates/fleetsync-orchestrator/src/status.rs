//! Check types and the status values each one can take.

use std::fmt;
use std::str::FromStr;

use crate::error::OrchestrateError;

/// Category of host health a host reports on itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckType {
    Puppet,
    Validation,
}

/// Outcome recorded for a check type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusValue {
    Pending,
    Failed,
    Success,
}

impl CheckType {
    pub const ALL: [CheckType; 2] = [CheckType::Puppet, CheckType::Validation];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Puppet => "puppet",
            CheckType::Validation => "validation",
        }
    }

    /// Status values this check type can be in.
    pub fn statuses(&self) -> &'static [StatusValue] {
        match self {
            CheckType::Puppet => &[StatusValue::Pending, StatusValue::Failed, StatusValue::Success],
            CheckType::Validation => &[StatusValue::Failed, StatusValue::Success],
        }
    }

    /// Map a raw command exit code to a status.
    ///
    /// puppet uses `--detailed-exitcodes`: 2 means "changes applied" and
    /// counts as success, while 1, 4 and 6 signal failures. `-1` is
    /// reported by hosts that have not finished a first run yet.
    pub fn classify(&self, result: i32) -> StatusValue {
        match self {
            CheckType::Puppet => match result {
                1 | 4 | 6 => StatusValue::Failed,
                -1 => StatusValue::Pending,
                _ => StatusValue::Success,
            },
            CheckType::Validation => match result {
                0 => StatusValue::Success,
                _ => StatusValue::Failed,
            },
        }
    }
}

impl StatusValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusValue::Pending => "pending",
            StatusValue::Failed => "failed",
            StatusValue::Success => "success",
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckType {
    type Err = OrchestrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "puppet" => Ok(CheckType::Puppet),
            "validation" => Ok(CheckType::Validation),
            other => Err(OrchestrateError::InvalidArgument(format!(
                "invalid status type: {other}"
            ))),
        }
    }
}
