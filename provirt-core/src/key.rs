//! Durable resource identifiers.
//!
//! A provisioned VM is addressed by `(node, resource kind, vmid)`. The host
//! persists the rendered `node/kind/vmid` string as the resource id across
//! plan/apply cycles, so the codec must round-trip exactly.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;

static KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^/]+)/([^/]+)/(\d+)").expect("key pattern is valid"));

/// Addresses one VM across create/read/update/delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    /// Cluster node hosting the VM.
    pub node: String,
    /// Resource kind, e.g. `"qemu"`.
    pub kind: String,
    /// Numeric VM id, unique per cluster.
    pub vmid: u32,
}

impl ResourceKey {
    pub fn new(node: impl Into<String>, kind: impl Into<String>, vmid: u32) -> Self {
        Self {
            node: node.into(),
            kind: kind.into(),
            vmid,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.node, self.kind, self.vmid)
    }
}

impl FromStr for ResourceKey {
    type Err = Error;

    /// Parses the first `<non-slash>/<non-slash>/<digits>` occurrence in
    /// `s`. Inputs without one, or whose numeric segment does not fit a
    /// vmid, are rejected with the offending string in the error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = KEY_PATTERN
            .captures(s)
            .ok_or_else(|| Error::InvalidResourceKey {
                input: s.to_string(),
            })?;
        let vmid = captures[3]
            .parse::<u32>()
            .map_err(|_| Error::InvalidResourceKey {
                input: s.to_string(),
            })?;

        Ok(Self {
            node: captures[1].to_string(),
            kind: captures[2].to_string(),
            vmid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_rendered_form() {
        let key = ResourceKey::new("node1", "qemu", 101);
        let parsed: ResourceKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn rejects_malformed_input() {
        let err = "not-a-valid-key".parse::<ResourceKey>().unwrap_err();
        match err {
            Error::InvalidResourceKey { input } => assert_eq!(input, "not-a-valid-key"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_overflowing_vmid() {
        assert!("node1/qemu/99999999999".parse::<ResourceKey>().is_err());
    }

    #[test]
    fn matches_anywhere_in_the_input() {
        let key: ResourceKey = "/pve-a/qemu/105".parse().unwrap();
        assert_eq!(key, ResourceKey::new("pve-a", "qemu", 105));
    }
}
