use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use vmprov_core::config::DatacenterSettings;
use vmprov_core::descriptor::{DatacenterRef, ObjectKind};
use vmprov_core::error::{Resource, StageError};
use vmprov_core::spec::DatacenterSpec;

use crate::inventory::Inventory;
use crate::remote::RemotePolicy;

pub const ITEM_PATH_FIELD: &str = "Datacenter.ItemPath";

/// Resolves an inventory path to a live datacenter. One bounded remote call.
pub struct DatacenterResolver {
    inventory: Arc<dyn Inventory>,
    policy: RemotePolicy,
    default_path: Option<String>,
}

impl DatacenterResolver {
    pub fn new(
        inventory: Arc<dyn Inventory>,
        policy: RemotePolicy,
        settings: &DatacenterSettings,
    ) -> Self {
        Self {
            inventory,
            policy,
            default_path: settings.default_path.clone(),
        }
    }

    /// Path to resolve: the request's own block, else the configured default.
    pub fn target_path(&self, spec: Option<&DatacenterSpec>) -> Result<String, StageError> {
        spec.map(|dc| dc.item_path.trim())
            .filter(|p| !p.is_empty())
            .or(self.default_path.as_deref())
            .map(str::to_string)
            .ok_or_else(|| StageError::Validation {
                fields: vec![ITEM_PATH_FIELD.to_string()],
            })
    }

    pub async fn resolve(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<DatacenterRef, StageError> {
        let found = self
            .policy
            .call(
                token,
                "find_datacenter",
                self.inventory.find_by_inventory_path(path),
            )
            .await?;

        match found {
            Some(obj) if obj.reference.kind == ObjectKind::Datacenter => {
                tracing::info!(path, datacenter = %obj.reference, "resolved datacenter");
                Ok(DatacenterRef {
                    inventory_path: path.to_string(),
                    name: obj.name,
                    reference: obj.reference,
                })
            }
            Some(obj) => {
                tracing::debug!(path, found = %obj.reference, "path is not a datacenter");
                Err(StageError::NotFound(Resource::Datacenter))
            }
            None => Err(StageError::NotFound(Resource::Datacenter)),
        }
    }
}
