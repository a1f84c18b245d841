use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::{BootOptions, GeneratorKind, NetworkField};
use crate::naming::Ipv4Pool;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config TOML: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

/// Compiler configuration loaded from TOML. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub remote: RemoteSettings,
    #[serde(default)]
    pub datacenter: DatacenterSettings,
    #[serde(default)]
    pub host_system: HostSystemSettings,
    #[serde(default)]
    pub network: NetworkSettings,
    #[serde(default)]
    pub resources: ResourceSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Budget shared by every remote-bound stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatacenterSettings {
    /// Inventory path used when a request carries no Datacenter block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSystemSettings {
    #[serde(default = "default_linux_distributions")]
    pub linux_distributions: Vec<String>,
    #[serde(default = "default_windows_distributions")]
    pub windows_distributions: Vec<String>,
    #[serde(default = "default_word_sizes")]
    pub word_sizes: Vec<i64>,
    #[serde(default)]
    pub boot: BootSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootSettings {
    #[serde(default = "default_boot_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_true")]
    pub retry_enabled: bool,
    #[serde(default = "default_boot_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(default = "default_ipv4_pool")]
    pub ipv4_pool: String,
    #[serde(default = "default_hostname_prefix")]
    pub hostname_prefix: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_workgroup")]
    pub workgroup: String,
    #[serde(default)]
    pub generators: GeneratorTable,
}

/// Field -> generator assignments. `"none"` leaves a field without one, so
/// an invalid value for it fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorTable {
    #[serde(default = "default_ip_generator", with = "generator_choice")]
    pub ip: Option<GeneratorKind>,
    #[serde(default = "default_netmask_generator", with = "generator_choice")]
    pub netmask: Option<GeneratorKind>,
    #[serde(default = "default_gateway_generator", with = "generator_choice")]
    pub gateway: Option<GeneratorKind>,
    #[serde(default = "default_hostname_generator", with = "generator_choice")]
    pub hostname: Option<GeneratorKind>,
}

impl GeneratorTable {
    pub fn get(&self, field: NetworkField) -> Option<GeneratorKind> {
        match field {
            NetworkField::Ip => self.ip,
            NetworkField::Netmask => self.netmask,
            NetworkField::Gateway => self.gateway,
            NetworkField::Hostname => self.hostname,
        }
    }

    pub fn with(mut self, field: NetworkField, generator: Option<GeneratorKind>) -> Self {
        match field {
            NetworkField::Ip => self.ip = generator,
            NetworkField::Netmask => self.netmask = generator,
            NetworkField::Gateway => self.gateway = generator,
            NetworkField::Hostname => self.hostname = generator,
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSettings {
    #[serde(default = "default_max_cpu_count")]
    pub max_cpu_count: u32,
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_max_capacity_kb")]
    pub max_capacity_kb: u64,
    #[serde(default = "default_true")]
    pub thin_provisioned: bool,
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_linux_distributions() -> Vec<String> {
    [
        "ubuntu",
        "debian",
        "centos",
        "rhel",
        "fedora",
        "rocky",
        "almalinux",
        "suse",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_windows_distributions() -> Vec<String> {
    ["windows", "windows-server", "windows-10", "windows-11"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_word_sizes() -> Vec<i64> {
    vec![32, 64]
}
fn default_boot_delay_ms() -> u64 {
    10
}
fn default_boot_retry_delay_ms() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_ipv4_pool() -> String {
    "10.240.0.0/24".to_string()
}
fn default_hostname_prefix() -> String {
    "vm".to_string()
}
fn default_domain() -> String {
    "localdomain".to_string()
}
fn default_workgroup() -> String {
    "WORKGROUP".to_string()
}
fn default_ip_generator() -> Option<GeneratorKind> {
    Some(GeneratorKind::FixedIp)
}
fn default_netmask_generator() -> Option<GeneratorKind> {
    Some(GeneratorKind::SubnetMask)
}
fn default_gateway_generator() -> Option<GeneratorKind> {
    Some(GeneratorKind::PoolGateway)
}
fn default_hostname_generator() -> Option<GeneratorKind> {
    Some(GeneratorKind::HostName)
}
fn default_max_cpu_count() -> u32 {
    128
}
fn default_max_memory_mb() -> u64 {
    4 * 1024 * 1024
}
fn default_max_capacity_kb() -> u64 {
    64 * 1024 * 1024 * 1024
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for HostSystemSettings {
    fn default() -> Self {
        Self {
            linux_distributions: default_linux_distributions(),
            windows_distributions: default_windows_distributions(),
            word_sizes: default_word_sizes(),
            boot: BootSettings::default(),
        }
    }
}

impl Default for BootSettings {
    fn default() -> Self {
        Self {
            delay_ms: default_boot_delay_ms(),
            retry_enabled: true,
            retry_delay_ms: default_boot_retry_delay_ms(),
        }
    }
}

impl BootSettings {
    pub fn options(&self) -> BootOptions {
        BootOptions {
            boot_delay: self.delay_ms,
            boot_retry_enabled: self.retry_enabled,
            boot_retry_delay: self.retry_delay_ms,
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            ipv4_pool: default_ipv4_pool(),
            hostname_prefix: default_hostname_prefix(),
            domain: default_domain(),
            workgroup: default_workgroup(),
            generators: GeneratorTable::default(),
        }
    }
}

impl Default for GeneratorTable {
    fn default() -> Self {
        Self {
            ip: default_ip_generator(),
            netmask: default_netmask_generator(),
            gateway: default_gateway_generator(),
            hostname: default_hostname_generator(),
        }
    }
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            max_cpu_count: default_max_cpu_count(),
            max_memory_mb: default_max_memory_mb(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            max_capacity_kb: default_max_capacity_kb(),
            thin_provisioned: true,
        }
    }
}

impl CompilerConfig {
    /// Load compiler config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded compiler config");
        Self::parse(&content)
    }

    /// Parse compiler config from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.timeout_secs == 0 {
            return Err(invalid("remote.timeout_secs", "must be greater than zero"));
        }

        if let Some(path) = &self.datacenter.default_path {
            if path.trim().is_empty() {
                return Err(invalid("datacenter.default_path", "must not be empty"));
            }
        }

        self.validate_host_system()?;

        Ipv4Pool::parse(&self.network.ipv4_pool)
            .map_err(|e| invalid("network.ipv4_pool", e.to_string()))?;
        if !crate::naming::is_hostname(&self.network.hostname_prefix) {
            return Err(invalid(
                "network.hostname_prefix",
                format!("{:?} is not a valid host label", self.network.hostname_prefix),
            ));
        }
        for field in NetworkField::ALL {
            let Some(generator) = self.network.generators.get(field) else {
                continue;
            };
            if !generator.applies_to(field) {
                return Err(invalid(
                    "network.generators",
                    format!(
                        "generator '{}' cannot produce a value for '{}'",
                        generator,
                        field.config_key()
                    ),
                ));
            }
        }

        if self.resources.max_cpu_count == 0 {
            return Err(invalid("resources.max_cpu_count", "must be greater than zero"));
        }
        if self.resources.max_memory_mb == 0 {
            return Err(invalid("resources.max_memory_mb", "must be greater than zero"));
        }
        if self.storage.max_capacity_kb == 0 {
            return Err(invalid("storage.max_capacity_kb", "must be greater than zero"));
        }
        Ok(())
    }

    fn validate_host_system(&self) -> Result<(), ConfigError> {
        let hs = &self.host_system;
        let mut linux = HashSet::new();
        for name in &hs.linux_distributions {
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                return Err(invalid(
                    "host_system.linux_distributions",
                    "distribution names must not be empty",
                ));
            }
            linux.insert(name);
        }
        for name in &hs.windows_distributions {
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                return Err(invalid(
                    "host_system.windows_distributions",
                    "distribution names must not be empty",
                ));
            }
            if linux.contains(&name) {
                return Err(invalid(
                    "host_system.windows_distributions",
                    format!("'{}' is also listed as a Linux distribution", name),
                ));
            }
        }
        if hs.word_sizes.is_empty() || hs.word_sizes.iter().any(|w| *w <= 0) {
            return Err(invalid(
                "host_system.word_sizes",
                "must list at least one positive word size",
            ));
        }
        Ok(())
    }
}

mod generator_choice {
    use serde::de::value::StringDeserializer;
    use serde::de::IntoDeserializer;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::descriptor::GeneratorKind;

    const NONE: &str = "none";

    pub fn serialize<S: Serializer>(
        value: &Option<GeneratorKind>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(kind) => kind.serialize(serializer),
            None => serializer.serialize_str(NONE),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<GeneratorKind>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == NONE {
            return Ok(None);
        }
        let de: StringDeserializer<D::Error> = raw.into_deserializer();
        GeneratorKind::deserialize(de).map(Some)
    }
}
