use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use vmprov_core::config::StorageSettings;
use vmprov_core::customization::{
    DeviceConfigSpec, DeviceOperation, DiskFlatBacking, DiskMode, FileOperation, StorageConfig,
    VirtualDisk,
};
use vmprov_core::descriptor::{DatastoreRef, ObjectKind, StorageDescriptor};
use vmprov_core::error::{Resource, StageError};

use super::resources::bounded;
use crate::inventory::{Inventory, VmRecordStore};
use crate::remote::RemotePolicy;

pub const VM_ID_FIELD: &str = "Metadata.VirtualMachineId";
pub const OWNER_ID_FIELD: &str = "Metadata.VmOwnerId";
pub const CAPACITY_FIELD: &str = "Disk.CapacityInKB";

/// Builds the disk device for an existing VM on its first datastore.
pub struct StorageProvisioner {
    inventory: Arc<dyn Inventory>,
    records: Arc<dyn VmRecordStore>,
    policy: RemotePolicy,
    max_capacity_kb: u64,
    thin_provisioned: bool,
}

impl StorageProvisioner {
    pub fn new(
        inventory: Arc<dyn Inventory>,
        records: Arc<dyn VmRecordStore>,
        policy: RemotePolicy,
        settings: &StorageSettings,
    ) -> Self {
        Self {
            inventory,
            records,
            policy,
            max_capacity_kb: settings.max_capacity_kb,
            thin_provisioned: settings.thin_provisioned,
        }
    }

    /// Local checks run before any remote call.
    pub fn precheck(
        &self,
        vm_id: &str,
        owner_id: &str,
        capacity_kb: i64,
    ) -> Result<u64, StageError> {
        let mut missing = Vec::new();
        if vm_id.trim().is_empty() {
            missing.push(VM_ID_FIELD.to_string());
        }
        if owner_id.trim().is_empty() {
            missing.push(OWNER_ID_FIELD.to_string());
        }
        if !missing.is_empty() {
            return Err(StageError::Validation { fields: missing });
        }
        bounded(CAPACITY_FIELD, capacity_kb, self.max_capacity_kb)
    }

    pub async fn provision(
        &self,
        vm_id: &str,
        owner_id: &str,
        capacity_kb: i64,
        token: &CancellationToken,
    ) -> Result<StorageConfig, StageError> {
        let capacity_kb = self.precheck(vm_id, owner_id, capacity_kb)?;

        let record = self
            .policy
            .call(token, "find_vm_record", self.records.find_owned(vm_id, owner_id))
            .await?
            .filter(|r| r.id == vm_id && r.owner_id == owner_id)
            .ok_or(StageError::NotFound(Resource::VirtualMachine))?;

        let vm = self
            .policy
            .call(
                token,
                "find_vm",
                self.inventory.find_by_inventory_path(&record.item_path),
            )
            .await?
            .filter(|obj| obj.reference.kind == ObjectKind::VirtualMachine)
            .ok_or(StageError::NotFound(Resource::VirtualMachine))?;

        let datastores = self
            .policy
            .call(token, "list_datastores", self.inventory.datastores(&vm.reference))
            .await?;
        let datastore = datastores
            .into_iter()
            .next()
            .ok_or(StageError::NotFound(Resource::Datastore))?;

        tracing::info!(
            vm = %vm.reference,
            datastore = %datastore.name,
            capacity_kb,
            "selected datastore"
        );
        Ok(self.build(capacity_kb, datastore))
    }

    fn build(&self, capacity_kb: u64, datastore: DatastoreRef) -> StorageConfig {
        let device_change = DeviceConfigSpec {
            operation: DeviceOperation::Add,
            file_operation: FileOperation::Create,
            device: VirtualDisk {
                capacity_kb,
                backing: DiskFlatBacking {
                    file_name: format!("[{}]", datastore.name),
                    datastore: datastore.reference.clone(),
                    disk_mode: DiskMode::Persistent,
                    thin_provisioned: self.thin_provisioned,
                },
            },
        };
        StorageConfig {
            descriptor: StorageDescriptor {
                capacity_kb,
                datastore,
            },
            device_change,
        }
    }
}
