//! Provider session: one per configured provider, owning the admission
//! gate every operation passes through and the client handle they share.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use provirt_core::{
    error::Result,
    gate::{AdmissionGate, OperationPermit},
    hypervisor::HypervisorClient,
};

use crate::config::ProviderConfig;

pub struct ProviderSession {
    pub(crate) client: Arc<dyn HypervisorClient>,
    pub(crate) config: ProviderConfig,
    gate: AdmissionGate,
    /// Highest VM id this session has handed out; allocation scans upward
    /// from here so concurrent creates do not race for the same id.
    vmid_cursor: Mutex<Option<u32>>,
    /// Serializes clones when the hypervisor cannot overlap them.
    pub(crate) clone_lock: Mutex<()>,
    /// Serializes disk resizes, same deal.
    pub(crate) resize_lock: Mutex<()>,
}

impl ProviderSession {
    /// Open a session over an already-connected client.
    ///
    /// The client itself is an external collaborator: whoever builds it
    /// consumes the endpoint and credential fields of `config`; the session
    /// consumes the concurrency fields.
    pub fn new(config: ProviderConfig, client: Arc<dyn HypervisorClient>) -> Result<Self> {
        config.validate()?;
        let gate = AdmissionGate::new(config.parallel_resources);
        Ok(Self {
            client,
            config,
            gate,
            vmid_cursor: Mutex::new(None),
            clone_lock: Mutex::new(()),
            resize_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Claim an admission slot; hold the permit for the whole operation.
    pub(crate) async fn admit(&self) -> Result<OperationPermit> {
        self.gate.acquire().await
    }

    /// Allocate the next free VM id.
    pub(crate) async fn next_vm_id(&self) -> Result<u32> {
        let mut cursor = self.vmid_cursor.lock().await;
        let floor = cursor.map_or(0, |id| id + 1);
        let next = self.client.next_vm_id(floor).await?;
        *cursor = Some(next);
        debug!("allocated vmid {}", next);
        Ok(next)
    }
}
