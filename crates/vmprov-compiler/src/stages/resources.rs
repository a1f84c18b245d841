use vmprov_core::config::ResourceSettings;
use vmprov_core::descriptor::ResourceDescriptor;
use vmprov_core::error::StageError;

/// Pure transform of requested vCPU/memory into a descriptor, bounded by
/// configured maxima.
#[derive(Debug, Clone)]
pub struct ResourceAllocator {
    max_cpu_count: u32,
    max_memory_mb: u64,
}

impl ResourceAllocator {
    pub fn new(settings: &ResourceSettings) -> Self {
        Self {
            max_cpu_count: settings.max_cpu_count,
            max_memory_mb: settings.max_memory_mb,
        }
    }

    pub fn allocate(
        &self,
        cpu_count: i32,
        memory_mb: i64,
    ) -> Result<ResourceDescriptor, StageError> {
        let cpu_count = bounded(
            "Resources.CpuNum",
            i64::from(cpu_count),
            u64::from(self.max_cpu_count),
        )?;
        let memory_mb = bounded("Resources.MemoryInMegabytes", memory_mb, self.max_memory_mb)?;
        Ok(ResourceDescriptor {
            // Bounded by a u32 maximum above.
            cpu_count: cpu_count as u32,
            memory_mb,
        })
    }
}

/// Check `value` is in `1..=max` and return it unsigned.
pub(crate) fn bounded(field: &'static str, value: i64, max: u64) -> Result<u64, StageError> {
    let max_signed = i64::try_from(max).unwrap_or(i64::MAX);
    if value < 1 || value > max_signed {
        return Err(StageError::Range {
            field,
            value,
            max: max_signed,
        });
    }
    Ok(value as u64)
}
