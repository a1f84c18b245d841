use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;
use vmprov_core::config::{CompilerConfig, ConfigError};
use vmprov_core::customization::{NetworkCustomization, ProvisioningResult};
use vmprov_core::descriptor::{HostSystemConfig, ResourceDescriptor};
use vmprov_core::error::{CompileError, Stage, StageError};
use vmprov_core::naming::Ipv4Pool;
use vmprov_core::spec::ProvisioningSpec;

use crate::decoder;
use crate::inventory::{Inventory, VmRecordStore};
use crate::remote::RemotePolicy;
use crate::stages::{
    DatacenterResolver, HostSystemCustomizer, NetworkCustomizer, ResourceAllocator,
    StorageProvisioner,
};

/// Output of the stages that need no remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocalPlan {
    pub datacenter_path: String,
    pub resources: ResourceDescriptor,
    pub host_system: HostSystemConfig,
    pub network: NetworkCustomization,
    #[serde(rename = "CapacityInKB")]
    pub capacity_kb: u64,
}

struct Prechecked {
    resources: ResourceDescriptor,
    host_system: HostSystemConfig,
    capacity_kb: u64,
    datacenter_path: String,
}

/// Compiles one provisioning spec into the platform configuration.
///
/// Order: resources, host system, local storage checks, datacenter (gates
/// every remote call), network, storage. The first failing stage aborts the
/// compile. Holds no per-request state; one instance serves concurrent
/// compiles.
pub struct ProvisioningCompiler {
    config: Arc<CompilerConfig>,
    resources: ResourceAllocator,
    host_system: HostSystemCustomizer,
    datacenter: DatacenterResolver,
    network: NetworkCustomizer,
    storage: StorageProvisioner,
}

impl ProvisioningCompiler {
    pub fn new(
        config: CompilerConfig,
        inventory: Arc<dyn Inventory>,
        records: Arc<dyn VmRecordStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let pool = Ipv4Pool::parse(&config.network.ipv4_pool).map_err(|e| {
            ConfigError::Invalid {
                key: "network.ipv4_pool",
                reason: e.to_string(),
            }
        })?;
        let policy = RemotePolicy::new(config.remote_timeout());

        Ok(Self {
            resources: ResourceAllocator::new(&config.resources),
            host_system: HostSystemCustomizer::new(&config.host_system),
            datacenter: DatacenterResolver::new(inventory.clone(), policy, &config.datacenter),
            network: NetworkCustomizer::new(&config.network, pool),
            storage: StorageProvisioner::new(inventory, records, policy, &config.storage),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Decode a raw JSON/XML document, then compile it.
    pub async fn compile_bytes(
        &self,
        raw: &[u8],
        token: &CancellationToken,
    ) -> Result<ProvisioningResult, CompileError> {
        let spec = decoder::decode(raw).map_err(|e| StageError::from(e).at(Stage::Decode))?;
        self.compile(&spec, token).await
    }

    pub async fn compile(
        &self,
        spec: &ProvisioningSpec,
        token: &CancellationToken,
    ) -> Result<ProvisioningResult, CompileError> {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "compile",
            request_id = %request_id,
            vm_id = %spec.metadata.vm_id,
            owner_id = %spec.metadata.owner_id,
        );

        async move {
            let started = Instant::now();
            let result = self.run(request_id, spec, token).await;
            match &result {
                Ok(r) => info!(
                    datacenter = %r.datacenter.reference,
                    datastore = %r.storage.datastore().name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "compile succeeded"
                ),
                Err(e) => warn!(
                    stage = %e.stage(),
                    kind = %e.kind(),
                    error = %e.stage_error(),
                    "compile failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Decode plus every stage that needs no remote call.
    pub fn check(&self, spec: &ProvisioningSpec) -> Result<LocalPlan, CompileError> {
        let pre = self.precheck(spec)?;
        let network = self.customize_network(spec, &pre.host_system)?;
        Ok(LocalPlan {
            datacenter_path: pre.datacenter_path,
            resources: pre.resources,
            host_system: pre.host_system,
            network,
            capacity_kb: pre.capacity_kb,
        })
    }

    async fn run(
        &self,
        request_id: String,
        spec: &ProvisioningSpec,
        token: &CancellationToken,
    ) -> Result<ProvisioningResult, CompileError> {
        let pre = self.precheck(spec)?;

        let datacenter = self
            .datacenter
            .resolve(&pre.datacenter_path, token)
            .instrument(info_span!("datacenter", path = %pre.datacenter_path))
            .await
            .map_err(|e| e.at(Stage::Datacenter))?;

        let network = self.customize_network(spec, &pre.host_system)?;

        let meta = &spec.metadata;
        let storage = self
            .storage
            .provision(&meta.vm_id, &meta.owner_id, spec.disk.capacity_kb, token)
            .instrument(info_span!("storage"))
            .await
            .map_err(|e| e.at(Stage::Storage))?;

        Ok(ProvisioningResult {
            request_id,
            datacenter,
            host_system: pre.host_system,
            network,
            storage,
            resources: pre.resources,
        })
    }

    fn precheck(&self, spec: &ProvisioningSpec) -> Result<Prechecked, CompileError> {
        let resources = info_span!("resources")
            .in_scope(|| {
                self.resources
                    .allocate(spec.resources.cpu_num, spec.resources.memory_mb)
            })
            .map_err(|e| e.at(Stage::Resources))?;

        let host_system = info_span!("host_system")
            .in_scope(|| {
                self.host_system
                    .derive_options(&spec.host_system.distribution_name, spec.host_system.bit)
            })
            .map_err(|e| e.at(Stage::HostSystem))?;

        let capacity_kb = self
            .storage
            .precheck(
                &spec.metadata.vm_id,
                &spec.metadata.owner_id,
                spec.disk.capacity_kb,
            )
            .map_err(|e| e.at(Stage::Storage))?;

        let datacenter_path = self
            .datacenter
            .target_path(spec.datacenter.as_ref())
            .map_err(|e| e.at(Stage::Datacenter))?;

        Ok(Prechecked {
            resources,
            host_system,
            capacity_kb,
            datacenter_path,
        })
    }

    fn customize_network(
        &self,
        spec: &ProvisioningSpec,
        host_system: &HostSystemConfig,
    ) -> Result<NetworkCustomization, CompileError> {
        info_span!("network")
            .in_scope(|| {
                self.network.customize(
                    &spec.network,
                    &spec.metadata.vm_id,
                    host_system.options.family(),
                )
            })
            .map_err(|e| e.at(Stage::Network))
    }
}
