//! Output shapes handed to the control plane's configure/customize call.
//!
//! Field names mirror the platform's customization-spec and VM config-spec
//! structures, so the serialized result can be passed through unchanged.

use serde::Serialize;

use crate::descriptor::{
    BootOptions, CustomizationOptions, DatacenterRef, DatastoreRef, HostSystemConfig,
    ManagedObjectRef, NetworkDescriptor, ResourceDescriptor, StorageDescriptor,
};

// ---------------------------------------------------------------------------
// Guest customization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomizationSpec {
    pub options: CustomizationOptions,
    pub identity: Identity,
    pub nic_setting_map: Vec<AdapterMapping>,
}

/// Guest identity block. Shape depends on the guest family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Identity {
    #[serde(rename = "CustomizationLinuxPrep", rename_all = "PascalCase")]
    LinuxPrep { host_name: FixedName, domain: String },
    #[serde(rename = "CustomizationSysprep", rename_all = "PascalCase")]
    Sysprep {
        computer_name: FixedName,
        workgroup: String,
    },
}

impl Identity {
    pub fn host_name(&self) -> &str {
        match self {
            Self::LinuxPrep { host_name, .. } => &host_name.name,
            Self::Sysprep { computer_name, .. } => &computer_name.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FixedName {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdapterMapping {
    pub adapter: IpSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpSettings {
    pub ip: IpGenerator,
    pub subnet_mask: String,
    pub gateway: Vec<String>,
    #[serde(rename = "IpV6Spec", skip_serializing_if = "Option::is_none")]
    pub ip_v6_spec: Option<IpV6Spec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IpGenerator {
    #[serde(rename = "CustomizationFixedIp")]
    Fixed {
        #[serde(rename = "IpAddress")]
        ip_address: String,
    },
    #[serde(rename = "CustomizationDhcpIpGenerator")]
    Dhcp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpV6Spec {
    pub ip: Vec<IpV6Generator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IpV6Generator {
    #[serde(rename = "CustomizationAutoIpV6Generator")]
    AutoIpV6,
}

/// Output of the network stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkCustomization {
    pub descriptor: NetworkDescriptor,
    pub nic_setting_map: Vec<AdapterMapping>,
    pub identity: Identity,
}

// ---------------------------------------------------------------------------
// Device and VM config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceConfigSpec {
    pub operation: DeviceOperation,
    pub file_operation: FileOperation,
    pub device: VirtualDisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceOperation {
    Add,
    Edit,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Create,
    Replace,
    Destroy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VirtualDisk {
    #[serde(rename = "CapacityInKB")]
    pub capacity_kb: u64,
    pub backing: DiskFlatBacking,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskFlatBacking {
    pub file_name: String,
    pub datastore: ManagedObjectRef,
    pub disk_mode: DiskMode,
    pub thin_provisioned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskMode {
    Persistent,
    IndependentPersistent,
}

/// Output of the storage stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StorageConfig {
    pub descriptor: StorageDescriptor,
    pub device_change: DeviceConfigSpec,
}

impl StorageConfig {
    pub fn datastore(&self) -> &DatastoreRef {
        &self.descriptor.datastore
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VirtualMachineConfigSpec {
    #[serde(rename = "NumCPUs")]
    pub num_cpus: u32,
    #[serde(rename = "MemoryMB")]
    pub memory_mb: u64,
    pub boot_options: BootOptions,
    pub device_change: Vec<DeviceConfigSpec>,
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Consolidated output of one compile. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisioningResult {
    pub request_id: String,
    pub datacenter: DatacenterRef,
    pub host_system: HostSystemConfig,
    pub network: NetworkCustomization,
    pub storage: StorageConfig,
    pub resources: ResourceDescriptor,
}

impl ProvisioningResult {
    /// Guest customization payload for the customize call.
    pub fn customization_spec(&self) -> CustomizationSpec {
        CustomizationSpec {
            options: self.host_system.options.clone(),
            identity: self.network.identity.clone(),
            nic_setting_map: self.network.nic_setting_map.clone(),
        }
    }

    /// Hardware payload for the reconfigure call.
    pub fn config_spec(&self) -> VirtualMachineConfigSpec {
        VirtualMachineConfigSpec {
            num_cpus: self.resources.cpu_count,
            memory_mb: self.resources.memory_mb,
            boot_options: self.host_system.boot_options,
            device_change: vec![self.storage.device_change.clone()],
        }
    }
}
