//! In-memory collaborators, used by tests and by the CLI via a TOML fixture.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use vmprov_core::descriptor::{DatastoreRef, ManagedObjectRef, ObjectKind};

use crate::inventory::{
    Inventory, InventoryError, ManagedObject, StoreError, VmRecord, VmRecordStore,
};

/// Control-plane inventory held in a map keyed by inventory path.
#[derive(Debug, Default)]
pub struct MemoryInventory {
    objects: HashMap<String, ManagedObject>,
    datastores: HashMap<ManagedObjectRef, Vec<DatastoreRef>>,
    latency: Option<Duration>,
    outage: Option<String>,
    calls: AtomicUsize,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail every call with `Unavailable(reason)`.
    pub fn with_outage(mut self, reason: impl Into<String>) -> Self {
        self.outage = Some(reason.into());
        self
    }

    pub fn add_object(&mut self, path: &str, kind: ObjectKind, id: &str) -> ManagedObjectRef {
        let reference = ManagedObjectRef::new(kind, id);
        let name = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(path);
        self.objects.insert(
            path.to_string(),
            ManagedObject {
                name: name.to_string(),
                inventory_path: path.to_string(),
                reference: reference.clone(),
            },
        );
        reference
    }

    pub fn add_datacenter(&mut self, path: &str, id: &str) -> ManagedObjectRef {
        self.add_object(path, ObjectKind::Datacenter, id)
    }

    pub fn add_vm(
        &mut self,
        path: &str,
        id: &str,
        datastores: Vec<DatastoreRef>,
    ) -> ManagedObjectRef {
        let reference = self.add_object(path, ObjectKind::VirtualMachine, id);
        self.datastores.insert(reference.clone(), datastores);
        reference
    }

    /// Number of remote calls answered so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), InventoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.outage {
            Some(reason) => Err(InventoryError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Inventory for MemoryInventory {
    async fn find_by_inventory_path(
        &self,
        path: &str,
    ) -> Result<Option<ManagedObject>, InventoryError> {
        self.enter().await?;
        Ok(self.objects.get(path).cloned())
    }

    async fn datastores(&self, vm: &ManagedObjectRef) -> Result<Vec<DatastoreRef>, InventoryError> {
        self.enter().await?;
        if vm.kind != ObjectKind::VirtualMachine {
            return Err(InventoryError::Rejected(format!("{} is not a virtual machine", vm)));
        }
        Ok(self.datastores.get(vm).cloned().unwrap_or_default())
    }
}

/// VM ownership records keyed by VM id.
#[derive(Debug, Default)]
pub struct MemoryVmStore {
    records: HashMap<String, VmRecord>,
    latency: Option<Duration>,
    outage: Option<String>,
    calls: AtomicUsize,
}

impl MemoryVmStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_outage(mut self, reason: impl Into<String>) -> Self {
        self.outage = Some(reason.into());
        self
    }

    pub fn insert(&mut self, vm_id: &str, owner_id: &str, item_path: &str) {
        self.records.insert(
            vm_id.to_string(),
            VmRecord {
                id: vm_id.to_string(),
                owner_id: owner_id.to_string(),
                item_path: item_path.to_string(),
            },
        );
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VmRecordStore for MemoryVmStore {
    async fn find_owned(
        &self,
        vm_id: &str,
        owner_id: &str,
    ) -> Result<Option<VmRecord>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(reason) = &self.outage {
            return Err(StoreError::Unavailable(reason.clone()));
        }
        Ok(self
            .records
            .get(vm_id)
            .filter(|r| r.owner_id == owner_id)
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse fixture TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Inventory and ownership records described in one TOML document:
///
/// ```toml
/// [[datacenters]]
/// path = "/dc1"
/// id = "datacenter-2"
///
/// [[vms]]
/// id = "vm-1"
/// owner_id = "owner-9"
/// path = "/dc1/vm/web-01"
/// moref = "vm-42"
/// datastores = [{ name = "ssd-a", id = "datastore-11" }]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub datacenters: Vec<FixtureDatacenter>,
    #[serde(default)]
    pub vms: Vec<FixtureVm>,
    /// Simulated latency applied to every call, in milliseconds.
    #[serde(default)]
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureDatacenter {
    pub path: String,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureVm {
    pub id: String,
    pub owner_id: String,
    pub path: String,
    pub moref: String,
    #[serde(default)]
    pub datastores: Vec<FixtureDatastore>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureDatastore {
    pub name: String,
    pub id: String,
}

impl Fixture {
    pub fn from_file(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(s: &str) -> Result<Self, FixtureError> {
        Ok(toml::from_str(s)?)
    }

    pub fn into_collaborators(self) -> (MemoryInventory, MemoryVmStore) {
        let mut inventory = MemoryInventory::new();
        let mut store = MemoryVmStore::new();
        for dc in &self.datacenters {
            inventory.add_datacenter(&dc.path, &dc.id);
        }
        for vm in self.vms {
            let datastores = vm
                .datastores
                .into_iter()
                .map(|ds| DatastoreRef {
                    name: ds.name,
                    reference: ManagedObjectRef::new(ObjectKind::Datastore, ds.id),
                })
                .collect();
            inventory.add_vm(&vm.path, &vm.moref, datastores);
            store.insert(&vm.id, &vm.owner_id, &vm.path);
        }
        if self.latency_ms > 0 {
            let latency = Duration::from_millis(self.latency_ms);
            inventory = inventory.with_latency(latency);
            store = store.with_latency(latency);
        }
        (inventory, store)
    }
}
