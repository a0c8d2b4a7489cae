//! Post-provisioning actions the host dispatches against an existing VM.
//!
//! These run after the resource itself exists, addressed purely by its
//! persisted resource key. Like the lifecycle operations they go through
//! the admission gate, since both mutate hypervisor state.

use std::collections::BTreeMap;
use std::str::FromStr;

use tokio::time::{sleep, Duration};
use tracing::info;

use provirt_core::{
    error::{Error, Result},
    key::ResourceKey,
    types::VmHandle,
};

use crate::session::ProviderSession;

/// Wait between tearing a forward down and pushing the replacement device,
/// and again before handing the VM back.
const RECONNECT_SETTLE: Duration = Duration::from_secs(10);

/// Actions a host-side provisioner block can request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionerAction {
    /// Remove the SSH forwarding user-net device.
    SshBackward,
    /// Re-plug the secondary network interface with a new device string.
    Reconnect { net1: Option<String> },
}

impl FromStr for ProvisionerAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sshbackward" => Ok(Self::SshBackward),
            "reconnect" => Ok(Self::Reconnect { net1: None }),
            other => Err(Error::UnknownAction {
                action: other.to_string(),
            }),
        }
    }
}

impl ProviderSession {
    /// Run one provisioner action against the VM a key addresses.
    pub async fn apply_action(&self, key: &ResourceKey, action: &ProvisionerAction) -> Result<()> {
        let _permit = self.admit().await?;
        let vm = VmHandle::new(key.node.clone(), key.vmid);

        match action {
            ProvisionerAction::SshBackward => {
                info!("removing SSH forward from VM {}", key);
                self.client.remove_ssh_forward(&vm).await
            }
            ProvisionerAction::Reconnect { net1 } => {
                info!("reconnecting VM {}", key);
                self.client.remove_ssh_forward(&vm).await?;
                sleep(RECONNECT_SETTLE).await;

                let mut params = BTreeMap::new();
                params.insert("net1".to_string(), net1.clone().unwrap_or_default());
                self.client.set_raw_config(&vm, &params).await?;
                sleep(RECONNECT_SETTLE).await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_strings_parse() {
        assert_eq!(
            "sshbackward".parse::<ProvisionerAction>().unwrap(),
            ProvisionerAction::SshBackward
        );
        assert_eq!(
            "reconnect".parse::<ProvisionerAction>().unwrap(),
            ProvisionerAction::Reconnect { net1: None }
        );
    }

    #[test]
    fn unknown_actions_are_rejected() {
        let err = "destroy-everything"
            .parse::<ProvisionerAction>()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAction { .. }));
    }
}
