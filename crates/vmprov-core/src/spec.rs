use serde::{Deserialize, Serialize};

/// Customer-supplied provisioning specification, as decoded from JSON or XML.
///
/// Structural only: nothing here is validated or defaulted. The compiler
/// stages own every semantic check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningSpec {
    #[serde(rename = "Metadata")]
    pub metadata: Metadata,
    #[serde(rename = "HostSystem")]
    pub host_system: HostSystemSpec,
    #[serde(rename = "Network", default, skip_serializing_if = "NetworkSpec::is_empty")]
    pub network: NetworkSpec,
    #[serde(rename = "Resources")]
    pub resources: ResourcesSpec,
    #[serde(rename = "Disk")]
    pub disk: DiskSpec,
    /// Inventory location to deploy into; falls back to the configured default.
    #[serde(rename = "Datacenter", default, skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<DatacenterSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "VirtualMachineId")]
    pub vm_id: String,
    #[serde(rename = "VmOwnerId")]
    pub owner_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSystemSpec {
    #[serde(rename = "DistributionName")]
    pub distribution_name: String,
    /// Guest word size in bits. Absent means "let the compiler default it".
    #[serde(rename = "Bit", default, skip_serializing_if = "Option::is_none")]
    pub bit: Option<i64>,
}

/// Requested network identity. Every field may be absent or empty; missing
/// values are filled by the configured generators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    #[serde(rename = "IP", default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "Netmask", default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    #[serde(rename = "Gateway", default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(rename = "Hostname", default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(rename = "Enablev4", default, skip_serializing_if = "Option::is_none")]
    pub enable_v4: Option<bool>,
    #[serde(rename = "Enablev6", default, skip_serializing_if = "Option::is_none")]
    pub enable_v6: Option<bool>,
}

impl NetworkSpec {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesSpec {
    #[serde(rename = "CpuNum")]
    pub cpu_num: i32,
    #[serde(rename = "MemoryInMegabytes")]
    pub memory_mb: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSpec {
    #[serde(rename = "CapacityInKB")]
    pub capacity_kb: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatacenterSpec {
    #[serde(rename = "ItemPath")]
    pub item_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_document_parses_without_network() {
        let json = r#"{
            "Metadata": {"VirtualMachineId": "vm-1", "VmOwnerId": "owner-9"},
            "HostSystem": {"DistributionName": "ubuntu"},
            "Resources": {"CpuNum": 2, "MemoryInMegabytes": 4096},
            "Disk": {"CapacityInKB": 20000}
        }"#;
        let spec: ProvisioningSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.metadata.vm_id, "vm-1");
        assert_eq!(spec.host_system.bit, None);
        assert!(spec.network.is_empty());
        assert!(spec.datacenter.is_none());
    }

    #[test]
    fn test_missing_required_block_is_rejected() {
        let json = r#"{
            "Metadata": {"VirtualMachineId": "vm-1", "VmOwnerId": "owner-9"},
            "HostSystem": {"DistributionName": "ubuntu"},
            "Disk": {"CapacityInKB": 20000}
        }"#;
        assert!(serde_json::from_str::<ProvisioningSpec>(json).is_err());
    }

    #[test]
    fn test_absent_optionals_are_not_serialized() {
        let spec = ProvisioningSpec {
            metadata: Metadata {
                vm_id: "vm-1".to_string(),
                owner_id: "owner-9".to_string(),
            },
            host_system: HostSystemSpec {
                distribution_name: "ubuntu".to_string(),
                bit: None,
            },
            network: NetworkSpec::default(),
            resources: ResourcesSpec {
                cpu_num: 2,
                memory_mb: 4096,
            },
            disk: DiskSpec { capacity_kb: 20000 },
            datacenter: None,
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert!(!json.contains("Network"));
        assert!(!json.contains("Bit"));
        assert!(!json.contains("Datacenter"));
    }
}
