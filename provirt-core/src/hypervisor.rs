//! Contract of the hypervisor API client.
//!
//! The concrete HTTP client is an external collaborator; this trait is its
//! public surface as the provider consumes it. Every method is a slow,
//! fallible network call and may be issued from several operations at once,
//! so implementations must be `Send + Sync`. The provider never retries a
//! failed call; retry policy, if any, belongs to the client or the host.
//!
//! Errors surface as [`Error::Api`](crate::error::Error::Api) carrying the
//! hypervisor's own message verbatim, so the operator can diagnose
//! hypervisor-side failures from the provider's output.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::{MachineConfig, VmHandle, VmPowerState};

#[async_trait]
pub trait HypervisorClient: Send + Sync {
    /// Next free VM id at or above `floor`.
    async fn next_vm_id(&self, floor: u32) -> Result<u32>;

    /// Look a VM up by name anywhere in the cluster.
    async fn find_vm(&self, name: &str) -> Result<Option<VmHandle>>;

    /// Create a VM from scratch (ISO-based install).
    async fn create_vm(&self, vm: &VmHandle, config: &MachineConfig) -> Result<()>;

    /// Clone `source` into `target`.
    async fn clone_vm(&self, source: &VmHandle, target: &VmHandle) -> Result<()>;

    /// Apply a full machine configuration to an existing VM.
    async fn update_config(&self, vm: &VmHandle, config: &MachineConfig) -> Result<()>;

    /// Read the live machine configuration.
    async fn read_config(&self, vm: &VmHandle) -> Result<MachineConfig>;

    /// Grow a disk by `grow_gb` gigabytes. The hypervisor cannot shrink
    /// disks.
    async fn resize_disk(&self, vm: &VmHandle, disk: &str, grow_gb: u32) -> Result<()>;

    async fn start_vm(&self, vm: &VmHandle) -> Result<()>;

    async fn stop_vm(&self, vm: &VmHandle) -> Result<()>;

    async fn delete_vm(&self, vm: &VmHandle) -> Result<()>;

    /// Current power state.
    async fn power_state(&self, vm: &VmHandle) -> Result<VmPowerState>;

    /// Push raw `key=value` parameters, bypassing the typed config model.
    async fn set_raw_config(&self, vm: &VmHandle, params: &BTreeMap<String, String>) -> Result<()>;

    /// Tear down the SSH forwarding user-net device.
    async fn remove_ssh_forward(&self, vm: &VmHandle) -> Result<()>;
}
