//! VM lifecycle operations.
//!
//! Every operation admits itself through the session gate before touching
//! the hypervisor and holds the permit until it returns. The permit guard
//! drops on success and error paths alike, so an aborted operation never
//! leaks its slot.

use tokio::time::{sleep, Duration};
use tracing::{debug, info};

use provirt_core::{
    error::{Error, Result},
    key::ResourceKey,
    types::{VmHandle, VmPowerState},
};

use crate::session::ProviderSession;
use crate::spec::{parse_size_gb, VmSpec};

/// Resource kind under which VMs are keyed.
pub const RESOURCE_KIND: &str = "qemu";

/// The hypervisor applies mutations asynchronously; wait this long before
/// issuing the next call against the same VM.
const CONFIG_SETTLE: Duration = Duration::from_secs(5);
/// Extra headroom for a freshly started guest to boot.
const BOOT_SETTLE: Duration = Duration::from_secs(9);
/// Wait after a stop request before deleting.
const STOP_SETTLE: Duration = Duration::from_secs(2);

impl ProviderSession {
    /// Provision a new VM and start it.
    ///
    /// The spec must name exactly one provisioning source: an existing VM
    /// to clone or an ISO volume to install from.
    pub async fn create_vm(&self, spec: &VmSpec) -> Result<ResourceKey> {
        let _permit = self.admit().await?;
        spec.validate()?;

        debug!("checking for duplicate name '{}'", spec.name);
        if let Some(existing) = self.client.find_vm(&spec.name).await? {
            return Err(Error::DuplicateVmName {
                name: spec.name.clone(),
                vmid: existing.vmid,
                node: existing.node,
            });
        }

        let vmid = self.next_vm_id().await?;
        let vm = VmHandle::new(spec.target_node.clone(), vmid);
        let config = spec.to_machine_config();

        if let Some(source_name) = &spec.clone_from {
            let source = self.client.find_vm(source_name).await?.ok_or_else(|| {
                Error::VmNotFound {
                    name: source_name.clone(),
                }
            })?;

            info!(
                "cloning VM '{}' from '{}' as vmid {}",
                spec.name, source_name, vmid
            );
            {
                let _serial = if self.config.parallel_clone {
                    None
                } else {
                    Some(self.clone_lock.lock().await)
                };
                self.client.clone_vm(&source, &vm).await?;
            }
            self.client.update_config(&vm, &config).await?;
            sleep(CONFIG_SETTLE).await;
            self.grow_disks(&vm, spec).await?;
        } else {
            // validate() guarantees an ISO source on this branch.
            info!("creating VM '{}' as vmid {}", spec.name, vmid);
            self.client.create_vm(&vm, &config).await?;
        }

        sleep(CONFIG_SETTLE).await;
        info!("starting VM '{}'", spec.name);
        self.client.start_vm(&vm).await?;

        Ok(ResourceKey::new(
            spec.target_node.clone(),
            RESOURCE_KIND,
            vmid,
        ))
    }

    /// Refresh a VM: read the live configuration and reconcile it into the
    /// configured spec.
    pub async fn read_vm(&self, configured: &VmSpec) -> Result<(ResourceKey, VmSpec)> {
        let _permit = self.admit().await?;

        let vm = self.locate(&configured.name).await?;
        let live = self.client.read_config(&vm).await?;

        let mut observed = configured.reconciled_with(&live);
        observed.target_node = vm.node.clone();

        let key = ResourceKey::new(vm.node, RESOURCE_KIND, vm.vmid);
        Ok((key, observed))
    }

    /// Push the configured spec onto an existing VM.
    pub async fn update_vm(&self, spec: &VmSpec) -> Result<()> {
        let _permit = self.admit().await?;
        spec.validate()?;

        let vm = self.locate(&spec.name).await?;
        let config = spec.to_machine_config();
        self.client.update_config(&vm, &config).await?;
        sleep(CONFIG_SETTLE).await;

        self.grow_disks(&vm, spec).await?;
        sleep(CONFIG_SETTLE).await;

        // Start the VM only if it is not already running.
        if self.client.power_state(&vm).await? == VmPowerState::Stopped {
            info!("starting VM '{}'", spec.name);
            self.client.start_vm(&vm).await?;
            sleep(BOOT_SETTLE).await;
        }
        Ok(())
    }

    /// Stop and delete the VM a resource key points at.
    pub async fn delete_vm(&self, key: &ResourceKey) -> Result<()> {
        let _permit = self.admit().await?;

        let vm = VmHandle::new(key.node.clone(), key.vmid);
        info!("stopping VM {}", key);
        self.client.stop_vm(&vm).await?;
        sleep(STOP_SETTLE).await;
        info!("deleting VM {}", key);
        self.client.delete_vm(&vm).await
    }

    /// Adopt an existing VM into the configured model; identical to a
    /// refresh.
    pub async fn import_vm(&self, configured: &VmSpec) -> Result<(ResourceKey, VmSpec)> {
        self.read_vm(configured).await
    }

    async fn locate(&self, name: &str) -> Result<VmHandle> {
        self.client
            .find_vm(name)
            .await?
            .ok_or_else(|| Error::VmNotFound {
                name: name.to_string(),
            })
    }

    /// Grow any configured disk whose live size is smaller.
    ///
    /// The hypervisor only ever grows disks; a configured size at or below
    /// the live one is left alone. Disks the hypervisor does not report
    /// are skipped.
    async fn grow_disks(&self, vm: &VmHandle, spec: &VmSpec) -> Result<()> {
        let live = self.client.read_config(vm).await?;

        for (slot, disk) in spec.disks.iter().enumerate() {
            let slot = slot as u32;
            let wanted_gb = parse_size_gb(&disk.size)?;

            let live_fields = match live.disks.get(&slot) {
                Some(fields) => fields,
                None => {
                    debug!("disk slot {} not reported by hypervisor, skipping", slot);
                    continue;
                }
            };
            let live_size = match live_fields.get("size").and_then(|v| v.as_text()) {
                Some(size) => size,
                None => {
                    debug!("disk slot {} reported without a size, skipping", slot);
                    continue;
                }
            };
            let live_gb = parse_size_gb(live_size)?;

            if wanted_gb > live_gb {
                let grow_by = (wanted_gb - live_gb).ceil() as u32;
                let disk_name = format!("{}{}", disk.disk_type, slot);
                info!(
                    "growing disk {} on vmid {} by {}G",
                    disk_name, vm.vmid, grow_by
                );
                let _serial = if self.config.parallel_resize {
                    None
                } else {
                    Some(self.resize_lock.lock().await)
                };
                self.client.resize_disk(vm, &disk_name, grow_by).await?;
            }
        }
        Ok(())
    }
}
