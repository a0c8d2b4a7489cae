//! Shared types crossing the hypervisor client contract.

use serde::{Deserialize, Serialize};

use crate::device::DeviceMap;

/// Addresses a VM for in-flight API calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmHandle {
    pub node: String,
    pub vmid: u32,
}

impl VmHandle {
    pub fn new(node: impl Into<String>, vmid: u32) -> Self {
        Self {
            node: node.into(),
            vmid,
        }
    }
}

/// Power state as the hypervisor reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmPowerState {
    Running,
    Stopped,
}

/// The API-side machine configuration: what gets sent on create/update and
/// what a config read returns.
///
/// Device collections use the index-keyed [`DeviceMap`] form; the typed
/// per-device schema lives in the provider layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    pub name: String,
    pub description: String,
    pub onboot: bool,
    /// Memory in MB.
    pub memory: u32,
    pub cores: u32,
    pub sockets: u32,
    /// Guest OS hint, e.g. `"l26"`.
    pub os_type: String,
    /// ISO volume for from-scratch installs.
    pub iso: Option<String>,
    pub networks: DeviceMap,
    pub disks: DeviceMap,
    pub cloud_init: CloudInitConfig,
}

/// Cloud-init settings pushed alongside the machine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudInitConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    pub search_domain: Option<String>,
    pub nameserver: Option<String>,
    pub ssh_keys: Option<String>,
    pub ipconfig0: Option<String>,
    pub ipconfig1: Option<String>,
}
