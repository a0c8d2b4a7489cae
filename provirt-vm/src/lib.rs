//! Provider layer over the provisioning core: the declarative VM model, the
//! session owning the admission gate, and the lifecycle operations a host
//! plugin dispatches.

pub mod config;
pub mod ops;
pub mod provisioner;
pub mod session;
pub mod spec;

pub use config::ProviderConfig;
pub use ops::RESOURCE_KIND;
pub use provisioner::ProvisionerAction;
pub use session::ProviderSession;
pub use spec::{DiskSpec, NicSpec, VmSpec};

// Re-export core types for convenience
pub use provirt_core::{
    device::{DeviceFields, DeviceKind, DeviceMap, FieldValue},
    error::{Error, Result},
    gate::{AdmissionGate, OperationPermit},
    hypervisor::HypervisorClient,
    key::ResourceKey,
    types::{CloudInitConfig, MachineConfig, VmHandle, VmPowerState},
};
