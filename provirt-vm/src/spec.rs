//! The declarative VM model an operator authors, and its mapping onto the
//! hypervisor's index-keyed device representation.
//!
//! Authored device lists become [`DeviceMap`]s keyed by list position; a
//! config read comes back the other way through [`merge_devices`] so that
//! operator-side defaults the hypervisor never echoes survive a refresh.

use serde::{Deserialize, Serialize};

use provirt_core::{
    device::{DeviceFields, DeviceKind, DeviceMap, FieldValue},
    error::{Error, Result},
    reconcile::merge_devices,
    types::{CloudInitConfig, MachineConfig},
};

pub const DEFAULT_BRIDGE: &str = "nat";
pub const DEFAULT_OS_TYPE: &str = "l26";

/// What an operator declares for one VM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmSpec {
    pub name: String,
    pub description: String,
    pub onboot: bool,
    pub target_node: String,
    /// Guest OS hint, e.g. `"l26"`.
    pub os_type: String,
    /// Memory in MB.
    pub memory: u32,
    pub cores: u32,
    pub sockets: u32,
    /// Name of an existing VM to clone. Mutually exclusive with `iso`.
    pub clone_from: Option<String>,
    /// ISO volume to install from. Mutually exclusive with `clone_from`.
    pub iso: Option<String>,
    pub networks: Vec<NicSpec>,
    pub disks: Vec<DiskSpec>,
    pub cloud_init: CloudInitConfig,
}

impl Default for VmSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            onboot: true,
            target_node: String::new(),
            os_type: DEFAULT_OS_TYPE.to_string(),
            memory: 0,
            cores: 0,
            sockets: 0,
            clone_from: None,
            iso: None,
            networks: Vec::new(),
            disks: Vec::new(),
            cloud_init: CloudInitConfig::default(),
        }
    }
}

impl VmSpec {
    /// Reject specs the hypervisor would choke on halfway through a create.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidConfiguration {
                message: "VM name must be set".to_string(),
            });
        }
        if self.target_node.is_empty() {
            return Err(Error::InvalidConfiguration {
                message: format!("VM '{}': target_node must be set", self.name),
            });
        }
        if self.memory == 0 || self.cores == 0 || self.sockets == 0 {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "VM '{}': memory, cores and sockets must be nonzero",
                    self.name
                ),
            });
        }
        match (&self.clone_from, &self.iso) {
            (None, None) => {
                return Err(Error::InvalidConfiguration {
                    message: format!(
                        "VM '{}': either clone_from or iso must be set",
                        self.name
                    ),
                })
            }
            (Some(_), Some(_)) => {
                return Err(Error::InvalidConfiguration {
                    message: format!(
                        "VM '{}': clone_from and iso are mutually exclusive",
                        self.name
                    ),
                })
            }
            _ => {}
        }
        for disk in &self.disks {
            parse_size_gb(&disk.size)?;
        }
        Ok(())
    }

    /// Build the API-side configuration this spec describes.
    pub fn to_machine_config(&self) -> MachineConfig {
        MachineConfig {
            name: self.name.clone(),
            description: self.description.clone(),
            onboot: self.onboot,
            memory: self.memory,
            cores: self.cores,
            sockets: self.sockets,
            os_type: self.os_type.clone(),
            iso: self.iso.clone(),
            networks: nics_to_devices(&self.networks),
            disks: disks_to_devices(&self.disks),
            cloud_init: self.cloud_init.clone(),
        }
    }

    /// Fold a live machine configuration back into this spec.
    ///
    /// Scalar fields come from the live side; device collections go through
    /// [`merge_devices`], the only place reconciliation happens.
    pub fn reconciled_with(&self, live: &MachineConfig) -> VmSpec {
        let disks = merge_devices(DeviceKind::Disk, &disks_to_devices(&self.disks), &live.disks);
        let networks = merge_devices(
            DeviceKind::NetworkInterface,
            &nics_to_devices(&self.networks),
            &live.networks,
        );

        VmSpec {
            name: live.name.clone(),
            description: live.description.clone(),
            onboot: live.onboot,
            target_node: self.target_node.clone(),
            os_type: live.os_type.clone(),
            memory: live.memory,
            cores: live.cores,
            sockets: live.sockets,
            clone_from: self.clone_from.clone(),
            iso: self.iso.clone(),
            networks: nics_from_devices(&networks),
            disks: disks_from_devices(&disks),
            cloud_init: live.cloud_init.clone(),
        }
    }
}

/// One virtual network interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NicSpec {
    pub model: String,
    /// Assigned by the hypervisor; reported back, never configured.
    pub macaddr: Option<String>,
    pub bridge: String,
    /// VLAN tag; `-1` means untagged.
    pub tag: i64,
    pub firewall: bool,
    /// Rate limit in MB/s; `-1` means unlimited.
    pub rate: i64,
    pub queues: i64,
    pub link_down: bool,
}

impl Default for NicSpec {
    fn default() -> Self {
        Self {
            model: String::new(),
            macaddr: None,
            bridge: DEFAULT_BRIDGE.to_string(),
            tag: -1,
            firewall: false,
            rate: -1,
            queues: -1,
            link_down: false,
        }
    }
}

impl NicSpec {
    fn to_fields(&self) -> DeviceFields {
        let mut fields = DeviceFields::new();
        fields.insert("model".to_string(), FieldValue::Text(self.model.clone()));
        if let Some(mac) = &self.macaddr {
            fields.insert("macaddr".to_string(), FieldValue::Text(mac.clone()));
        }
        fields.insert("bridge".to_string(), FieldValue::Text(self.bridge.clone()));
        fields.insert("tag".to_string(), FieldValue::Int(self.tag));
        fields.insert("firewall".to_string(), FieldValue::Bool(self.firewall));
        fields.insert("rate".to_string(), FieldValue::Int(self.rate));
        fields.insert("queues".to_string(), FieldValue::Int(self.queues));
        fields.insert("link_down".to_string(), FieldValue::Bool(self.link_down));
        fields
    }

    fn from_fields(fields: &DeviceFields) -> Self {
        let defaults = Self::default();
        Self {
            model: text_field(fields, "model").unwrap_or_default(),
            macaddr: text_field(fields, "macaddr"),
            bridge: text_field(fields, "bridge").unwrap_or(defaults.bridge),
            tag: int_field(fields, "tag").unwrap_or(defaults.tag),
            firewall: bool_field(fields, "firewall").unwrap_or(defaults.firewall),
            rate: int_field(fields, "rate").unwrap_or(defaults.rate),
            queues: int_field(fields, "queues").unwrap_or(defaults.queues),
            link_down: bool_field(fields, "link_down").unwrap_or(defaults.link_down),
        }
    }
}

/// One virtual disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskSpec {
    /// Bus type, e.g. `"virtio"`; combined with the slot index it names the
    /// disk on the API (`virtio0`).
    #[serde(rename = "type")]
    pub disk_type: String,
    pub storage: String,
    pub storage_type: String,
    /// Size with unit suffix, e.g. `"30G"`.
    pub size: String,
    pub format: String,
    pub cache: String,
    pub backup: bool,
    pub iothread: bool,
    pub replicate: bool,
}

impl Default for DiskSpec {
    fn default() -> Self {
        Self {
            disk_type: String::new(),
            storage: String::new(),
            storage_type: "dir".to_string(),
            size: String::new(),
            format: "raw".to_string(),
            cache: "none".to_string(),
            backup: false,
            iothread: false,
            replicate: false,
        }
    }
}

impl DiskSpec {
    fn to_fields(&self) -> DeviceFields {
        let mut fields = DeviceFields::new();
        fields.insert("type".to_string(), FieldValue::Text(self.disk_type.clone()));
        fields.insert("storage".to_string(), FieldValue::Text(self.storage.clone()));
        fields.insert(
            "storage_type".to_string(),
            FieldValue::Text(self.storage_type.clone()),
        );
        fields.insert("size".to_string(), FieldValue::Text(self.size.clone()));
        fields.insert("format".to_string(), FieldValue::Text(self.format.clone()));
        fields.insert("cache".to_string(), FieldValue::Text(self.cache.clone()));
        fields.insert("backup".to_string(), FieldValue::Bool(self.backup));
        fields.insert("iothread".to_string(), FieldValue::Bool(self.iothread));
        fields.insert("replicate".to_string(), FieldValue::Bool(self.replicate));
        fields
    }

    fn from_fields(fields: &DeviceFields) -> Self {
        let defaults = Self::default();
        Self {
            disk_type: text_field(fields, "type").unwrap_or_default(),
            storage: text_field(fields, "storage").unwrap_or_default(),
            storage_type: text_field(fields, "storage_type").unwrap_or(defaults.storage_type),
            size: text_field(fields, "size").unwrap_or_default(),
            format: text_field(fields, "format").unwrap_or(defaults.format),
            cache: text_field(fields, "cache").unwrap_or(defaults.cache),
            backup: bool_field(fields, "backup").unwrap_or(defaults.backup),
            iothread: bool_field(fields, "iothread").unwrap_or(defaults.iothread),
            replicate: bool_field(fields, "replicate").unwrap_or(defaults.replicate),
        }
    }
}

/// Index authored network interfaces by list position.
pub fn nics_to_devices(nics: &[NicSpec]) -> DeviceMap {
    nics.iter()
        .enumerate()
        .map(|(slot, nic)| (slot as u32, nic.to_fields()))
        .collect()
}

/// Index authored disks by list position.
pub fn disks_to_devices(disks: &[DiskSpec]) -> DeviceMap {
    disks
        .iter()
        .enumerate()
        .map(|(slot, disk)| (slot as u32, disk.to_fields()))
        .collect()
}

/// Rebuild typed interfaces from an index-keyed map, in slot order.
pub fn nics_from_devices(devices: &DeviceMap) -> Vec<NicSpec> {
    devices.values().map(NicSpec::from_fields).collect()
}

/// Rebuild typed disks from an index-keyed map, in slot order.
pub fn disks_from_devices(devices: &DeviceMap) -> Vec<DiskSpec> {
    devices.values().map(DiskSpec::from_fields).collect()
}

/// Parse a disk size like `"30G"` into gigabytes.
pub fn parse_size_gb(size: &str) -> Result<f64> {
    let digits = size.trim().trim_end_matches(['G', 'g']);
    match digits.parse::<f64>() {
        Ok(gb) if gb.is_finite() && gb >= 0.0 => Ok(gb),
        _ => Err(Error::InvalidDiskSize {
            value: size.to_string(),
        }),
    }
}

fn text_field(fields: &DeviceFields, name: &str) -> Option<String> {
    fields.get(name).and_then(|v| v.as_text()).map(str::to_string)
}

fn int_field(fields: &DeviceFields, name: &str) -> Option<i64> {
    fields.get(name).and_then(FieldValue::as_int)
}

fn bool_field(fields: &DeviceFields, name: &str) -> Option<bool> {
    fields.get(name).and_then(FieldValue::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_spec() -> VmSpec {
        VmSpec {
            name: "web-1".to_string(),
            target_node: "node1".to_string(),
            memory: 1024,
            cores: 2,
            sockets: 1,
            iso: Some("local:iso/debian.iso".to_string()),
            ..VmSpec::default()
        }
    }

    #[test]
    fn validate_accepts_a_complete_spec() {
        assert!(base_spec().validate().is_ok());
    }

    #[test]
    fn validate_requires_exactly_one_provisioning_source() {
        let mut spec = base_spec();
        spec.iso = None;
        assert!(spec.validate().is_err());

        spec.iso = Some("local:iso/debian.iso".to_string());
        spec.clone_from = Some("template".to_string());
        assert!(spec.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_resources_and_bad_disk_sizes() {
        let mut spec = base_spec();
        spec.memory = 0;
        assert!(spec.validate().is_err());

        let mut spec = base_spec();
        spec.disks.push(DiskSpec {
            disk_type: "virtio".to_string(),
            storage: "local".to_string(),
            size: "lots".to_string(),
            ..DiskSpec::default()
        });
        assert!(spec.validate().is_err());
    }

    #[test]
    fn serde_fills_schema_defaults() {
        let nic: NicSpec = serde_json::from_str(r#"{"model":"virtio"}"#).unwrap();
        assert_eq!(nic.bridge, "nat");
        assert_eq!(nic.tag, -1);
        assert!(!nic.firewall);

        let disk: DiskSpec =
            serde_json::from_str(r#"{"type":"virtio","storage":"local","size":"30G"}"#).unwrap();
        assert_eq!(disk.storage_type, "dir");
        assert_eq!(disk.format, "raw");
        assert_eq!(disk.cache, "none");
    }

    #[test]
    fn device_lists_index_by_position() {
        let nics = vec![
            NicSpec {
                model: "virtio".to_string(),
                ..NicSpec::default()
            },
            NicSpec {
                model: "e1000".to_string(),
                ..NicSpec::default()
            },
        ];
        let devices = nics_to_devices(&nics);
        assert_eq!(devices[&0]["model"], FieldValue::Text("virtio".to_string()));
        assert_eq!(devices[&1]["model"], FieldValue::Text("e1000".to_string()));
    }

    #[test]
    fn reconciliation_preserves_defaults_and_normalizes_booleans() {
        let mut spec = base_spec();
        spec.networks.push(NicSpec {
            model: "virtio".to_string(),
            bridge: "vmbr0".to_string(),
            ..NicSpec::default()
        });

        // The hypervisor reports a partial view: a generated MAC, the
        // firewall flag as an integer, and none of the schema-only fields.
        let mut live = spec.to_machine_config();
        let reported_nic = DeviceFields::from([
            ("model".to_string(), FieldValue::Text("virtio".to_string())),
            ("bridge".to_string(), FieldValue::Text("vmbr0".to_string())),
            (
                "macaddr".to_string(),
                FieldValue::Text("02:00:00:aa:bb:cc".to_string()),
            ),
            ("firewall".to_string(), FieldValue::Int(0)),
        ]);
        live.networks = DeviceMap::from([(0, reported_nic)]);

        let reconciled = spec.reconciled_with(&live);
        let nic = &reconciled.networks[0];
        assert_eq!(nic.macaddr.as_deref(), Some("02:00:00:aa:bb:cc"));
        assert!(!nic.firewall);
        assert_eq!(nic.tag, -1);
        assert_eq!(nic.rate, -1);
        assert_eq!(nic.bridge, "vmbr0");
    }

    #[test]
    fn parse_size_accepts_suffixed_gigabytes() {
        assert_eq!(parse_size_gb("30G").unwrap(), 30.0);
        assert_eq!(parse_size_gb("2.5G").unwrap(), 2.5);
        assert!(parse_size_gb("").is_err());
        assert!(parse_size_gb("-4G").is_err());
        assert!(parse_size_gb("4T").is_err());
    }
}
