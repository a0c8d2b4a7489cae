//! Tagged device-field model shared by the reconciler and the typed VM
//! specification.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single device field value as the hypervisor or the operator supplies
/// it.
///
/// The hypervisor API is weakly typed: booleans come back as `0`/`1`
/// integers and most everything else as strings. Keeping the variant tag
/// explicit lets reconciliation match on types instead of guessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Variant name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Text(_) => "text",
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// The fields of one attached device.
pub type DeviceFields = BTreeMap<String, FieldValue>;

/// Devices indexed by slot: list position for authored configuration, the
/// hypervisor's reported index for live state.
pub type DeviceMap = BTreeMap<u32, DeviceFields>;

/// Which device family a collection describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Disk,
    NetworkInterface,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Disk => write!(f, "disk"),
            DeviceKind::NetworkInterface => write!(f, "network"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_payload_maps_onto_tagged_values() {
        let fields: DeviceFields = serde_json::from_str(
            r#"{"bridge":"vmbr0","firewall":1,"link_down":true,"tag":-1}"#,
        )
        .unwrap();

        assert_eq!(fields["bridge"], FieldValue::Text("vmbr0".to_string()));
        assert_eq!(fields["firewall"], FieldValue::Int(1));
        assert_eq!(fields["link_down"], FieldValue::Bool(true));
        assert_eq!(fields["tag"], FieldValue::Int(-1));
    }

    #[test]
    fn accessors_reject_mismatched_variants() {
        let value = FieldValue::Int(1);
        assert_eq!(value.as_int(), Some(1));
        assert_eq!(value.as_bool(), None);
        assert_eq!(value.as_text(), None);
        assert_eq!(value.type_name(), "int");
    }
}
