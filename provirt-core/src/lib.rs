//! Reusable core for declaratively provisioning VMs against a hypervisor
//! API: concurrency admission control, device-state reconciliation, and the
//! durable resource-key codec.
//!
//! The concrete hypervisor HTTP client and the host plugin protocol both
//! live outside this crate; the [`hypervisor::HypervisorClient`] trait is
//! the seam the provider layer consumes them through.

pub mod device;
pub mod error;
pub mod gate;
pub mod hypervisor;
pub mod key;
pub mod reconcile;
pub mod types;

pub use device::{DeviceFields, DeviceKind, DeviceMap, FieldValue};
pub use error::{Error, Result};
pub use gate::{AdmissionGate, OperationPermit};
pub use hypervisor::HypervisorClient;
pub use key::ResourceKey;
pub use reconcile::merge_devices;
pub use types::{CloudInitConfig, MachineConfig, VmHandle, VmPowerState};
