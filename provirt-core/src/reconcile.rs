//! Merges hypervisor-reported device state into the configured model.
//!
//! The hypervisor only reports fields that are active on its side; values
//! that exist purely in the operator's configuration (defaults the API never
//! echoes back) would otherwise read back as gone and show up as spurious
//! drift on the next plan. The merge also papers over the API's habit of
//! reporting booleans as `0`/`1` integers.

use std::collections::btree_map::Entry;

use tracing::warn;

use crate::device::{DeviceKind, DeviceMap, FieldValue};

/// Merge the reported device collection with the configured one.
///
/// The result is indexed like `reported`, augmented with configured-only
/// slots. For a slot present on both sides, reported fields win; configured
/// fields the hypervisor did not report are filled back in; and where the
/// configuration declares a boolean but the report carries an integer, `0`
/// and `1` normalize to `false`/`true`. Any other integer is kept as
/// reported and logged; reconciliation never fails.
///
/// Merging with an empty `reported` returns `configured` unchanged, and
/// vice versa. The function is pure: no hidden state, and identical inputs
/// give identical output.
pub fn merge_devices(kind: DeviceKind, configured: &DeviceMap, reported: &DeviceMap) -> DeviceMap {
    let mut merged = reported.clone();

    for (slot, wanted) in configured {
        let live = match merged.entry(*slot) {
            // The hypervisor did not report this device at all; keep the
            // configured slot verbatim.
            Entry::Vacant(entry) => {
                entry.insert(wanted.clone());
                continue;
            }
            Entry::Occupied(entry) => entry.into_mut(),
        };

        for (field, value) in wanted {
            let current = match live.entry(field.clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(value.clone());
                    continue;
                }
                Entry::Occupied(entry) => entry.into_mut(),
            };

            let reported_int = match (value, &*current) {
                (FieldValue::Bool(_), FieldValue::Int(raw)) => Some(*raw),
                _ => None,
            };
            if let Some(raw) = reported_int {
                match raw {
                    0 => *current = FieldValue::Bool(false),
                    1 => *current = FieldValue::Bool(true),
                    other => warn!(
                        "{} slot {} field '{}': expected a boolean, hypervisor reported {}; keeping reported value",
                        kind, slot, field, other
                    ),
                }
            }
        }
    }

    merged
}
