//! Collaborator interfaces for the infrastructure control plane and the
//! VM ownership record store.
//!
//! Implementations are shared read-only across concurrent compiles and must
//! not hold per-request state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vmprov_core::descriptor::{DatastoreRef, ManagedObjectRef};

/// An object found in the control plane's inventory tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedObject {
    pub name: String,
    pub inventory_path: String,
    pub reference: ManagedObjectRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("control plane unavailable: {0}")]
    Unavailable(String),
    #[error("control plane rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Inventory: Send + Sync {
    /// Look up an object by inventory path. `Ok(None)` when nothing lives there.
    async fn find_by_inventory_path(
        &self,
        path: &str,
    ) -> Result<Option<ManagedObject>, InventoryError>;

    /// Datastores attached to a virtual machine, in platform order.
    async fn datastores(&self, vm: &ManagedObjectRef) -> Result<Vec<DatastoreRef>, InventoryError>;
}

/// Ownership record for an existing VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmRecord {
    pub id: String,
    pub owner_id: String,
    /// Inventory path of the live VM on the control plane.
    pub item_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait VmRecordStore: Send + Sync {
    /// Record matching both `vm_id` and `owner_id`. A record owned by someone
    /// else is reported exactly like a missing one.
    async fn find_owned(&self, vm_id: &str, owner_id: &str)
    -> Result<Option<VmRecord>, StoreError>;
}
