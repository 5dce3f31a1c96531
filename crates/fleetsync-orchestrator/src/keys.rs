//! Key layout in the shared store.
//!
//! ```text
//! /current_version                               desired version
//! /running_version/{version}/{hostname}          heartbeat timestamp
//! /status/{check_type}/{status_value}/{hostname} timestamp
//! ```

use crate::status::{CheckType, StatusValue};

pub const CURRENT_VERSION: &str = "/current_version";
pub const RUNNING_VERSION: &str = "/running_version";
pub const STATUS: &str = "/status";

pub fn version_dir(version: &str) -> String {
    format!("{RUNNING_VERSION}/{version}")
}

pub fn running_version_key(version: &str, hostname: &str) -> String {
    format!("{RUNNING_VERSION}/{version}/{hostname}")
}

pub fn status_dir(check: CheckType, status: StatusValue) -> String {
    format!("{STATUS}/{check}/{status}")
}

pub fn status_key(check: CheckType, status: StatusValue, hostname: &str) -> String {
    format!("{STATUS}/{check}/{status}/{hostname}")
}

/// Split a key below `dir` into its remaining path segments.
///
/// `None` for keys outside `dir` and for `dir` itself. Requires a `/`
/// boundary, so `/running_version/v10/h1` is not below
/// `/running_version/v1`.
pub fn segments_below<'a>(dir: &str, key: &'a str) -> Option<Vec<&'a str>> {
    let rest = key.strip_prefix(dir)?.strip_prefix('/')?;
    let segments: Vec<&str> = rest.split('/').collect();
    (!segments.iter().all(|s| s.is_empty())).then_some(segments)
}

/// `(version, hostname)` of a heartbeat record key.
///
/// Only a full `/running_version/{version}/{hostname}` key with non-empty
/// parts qualifies; directory keys and deeper paths do not.
pub fn parse_running_version_key(key: &str) -> Option<(&str, &str)> {
    match segments_below(RUNNING_VERSION, key)?.as_slice() {
        [version, hostname] if !version.is_empty() && !hostname.is_empty() => {
            Some((*version, *hostname))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_keys() {
        assert_eq!(running_version_key("v13", "testhost"), "/running_version/v13/testhost");
        assert_eq!(
            status_key(CheckType::Puppet, StatusValue::Failed, "testhost"),
            "/status/puppet/failed/testhost"
        );
        assert_eq!(version_dir("v1"), "/running_version/v1");
    }

    #[test]
    fn parses_record_keys() {
        assert_eq!(
            parse_running_version_key("/running_version/foo/node1"),
            Some(("foo", "node1"))
        );
        assert_eq!(parse_running_version_key("/running_version/foo"), None);
        assert_eq!(parse_running_version_key("/running_version/foo/"), None);
        assert_eq!(parse_running_version_key("/running_version"), None);
        assert_eq!(parse_running_version_key("/running_version/a/b/c"), None);
        assert_eq!(parse_running_version_key("/status/puppet/failed/h"), None);
    }

    #[test]
    fn segments_respect_path_boundary() {
        assert_eq!(
            segments_below("/running_version/v1", "/running_version/v1/h3"),
            Some(vec!["h3"])
        );
        assert_eq!(segments_below("/running_version/v1", "/running_version/v10/h1"), None);
        assert_eq!(segments_below("/running_version/v1", "/running_version/v1"), None);
        assert_eq!(segments_below("/running_version/v1", "/running_version/v1/"), None);
    }
}
