use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Host system
// ---------------------------------------------------------------------------

/// Normalized guest identity: lower-cased distribution name plus word size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostSystemDescriptor {
    pub system_name: String,
    pub word_size: i64,
}

impl HostSystemDescriptor {
    pub fn new(distribution_name: &str, word_size: i64) -> Self {
        Self {
            system_name: distribution_name.trim().to_lowercase(),
            word_size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestFamily {
    Linux,
    Windows,
}

impl fmt::Display for GuestFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// Guest customization options. Exactly one family, each with its own shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CustomizationOptions {
    #[serde(rename = "CustomizationLinuxOptions")]
    Linux(LinuxOptions),
    #[serde(rename = "CustomizationWinOptions")]
    Windows(WinOptions),
}

impl CustomizationOptions {
    pub fn family(&self) -> GuestFamily {
        match self {
            Self::Linux(_) => GuestFamily::Linux,
            Self::Windows(_) => GuestFamily::Windows,
        }
    }
}

/// The platform's Linux options carry no fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinuxOptions {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WinOptions {
    #[serde(rename = "ChangeSID")]
    pub change_sid: bool,
    pub delete_accounts: bool,
    pub reboot: SysprepRebootOption,
}

impl Default for WinOptions {
    fn default() -> Self {
        Self {
            change_sid: true,
            delete_accounts: false,
            reboot: SysprepRebootOption::Reboot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SysprepRebootOption {
    Reboot,
    Noreboot,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BootOptions {
    /// Milliseconds.
    pub boot_delay: u64,
    pub boot_retry_enabled: bool,
    /// Milliseconds.
    pub boot_retry_delay: u64,
}

/// Output of the host system stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostSystemConfig {
    pub descriptor: HostSystemDescriptor,
    pub options: CustomizationOptions,
    pub boot_options: BootOptions,
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// The four identity fields the network stage validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkField {
    Ip,
    Netmask,
    Gateway,
    Hostname,
}

impl NetworkField {
    pub const ALL: [NetworkField; 4] = [Self::Ip, Self::Netmask, Self::Gateway, Self::Hostname];

    /// Field name as it appears in the customer document.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ip => "IP",
            Self::Netmask => "Netmask",
            Self::Gateway => "Gateway",
            Self::Hostname => "Hostname",
        }
    }

    /// Key used in the `[network.generators]` config table.
    pub fn config_key(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Netmask => "netmask",
            Self::Gateway => "gateway",
            Self::Hostname => "hostname",
        }
    }
}

impl fmt::Display for NetworkField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strategy that produces a value for a missing or invalid network field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeneratorKind {
    /// Deterministic address from the configured IPv4 pool.
    FixedIp,
    /// Address assigned by DHCP at boot.
    Dhcp,
    /// Mask of the configured IPv4 pool.
    SubnetMask,
    /// First host of the configured IPv4 pool.
    PoolGateway,
    /// "<prefix>-<vm id>" host label.
    HostName,
    /// Stateless IPv6 autoconfiguration. Only used for the IPv6 adapter spec.
    AutoIpv6,
}

impl GeneratorKind {
    /// Whether this generator produces a meaningful value for `field`.
    pub fn applies_to(self, field: NetworkField) -> bool {
        matches!(
            (self, field),
            (Self::FixedIp | Self::Dhcp, NetworkField::Ip)
                | (Self::SubnetMask, NetworkField::Netmask)
                | (Self::PoolGateway, NetworkField::Gateway)
                | (Self::HostName, NetworkField::Hostname)
        )
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedIp => write!(f, "fixed-ip"),
            Self::Dhcp => write!(f, "dhcp"),
            Self::SubnetMask => write!(f, "subnet-mask"),
            Self::PoolGateway => write!(f, "pool-gateway"),
            Self::HostName => write!(f, "host-name"),
            Self::AutoIpv6 => write!(f, "auto-ipv6"),
        }
    }
}

/// A validated network field: either the customer's literal or a generated
/// placeholder that records which generator produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "Source", rename_all = "PascalCase")]
pub enum FieldValue {
    Literal {
        #[serde(rename = "Value")]
        value: String,
    },
    Generated {
        #[serde(rename = "Generator")]
        generator: GeneratorKind,
        #[serde(rename = "Value")]
        value: String,
    },
}

impl FieldValue {
    pub fn value(&self) -> &str {
        match self {
            Self::Literal { value } | Self::Generated { value, .. } => value,
        }
    }

    pub fn generator(&self) -> Option<GeneratorKind> {
        match self {
            Self::Literal { .. } => None,
            Self::Generated { generator, .. } => Some(*generator),
        }
    }

    pub fn is_generated(&self) -> bool {
        self.generator().is_some()
    }
}

/// Network identity after validation. No field is ever empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkDescriptor {
    #[serde(rename = "IPv4")]
    pub ipv4: FieldValue,
    pub netmask: FieldValue,
    pub gateway: FieldValue,
    pub hostname: FieldValue,
    pub enable_v4: bool,
    pub enable_v6: bool,
}

impl NetworkDescriptor {
    pub fn field(&self, field: NetworkField) -> &FieldValue {
        match field {
            NetworkField::Ip => &self.ipv4,
            NetworkField::Netmask => &self.netmask,
            NetworkField::Gateway => &self.gateway,
            NetworkField::Hostname => &self.hostname,
        }
    }
}

// ---------------------------------------------------------------------------
// Inventory references
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Datacenter,
    Folder,
    VirtualMachine,
    Datastore,
    Network,
}

/// Managed object reference on the control plane, e.g. `datacenter-2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManagedObjectRef {
    #[serde(rename = "Type")]
    pub kind: ObjectKind,
    pub value: String,
}

impl ManagedObjectRef {
    pub fn new(kind: ObjectKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl fmt::Display for ManagedObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.kind, self.value)
    }
}

/// Datacenter resolved at compile time. A snapshot: not re-validated if the
/// object disappears afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatacenterRef {
    pub inventory_path: String,
    pub name: String,
    pub reference: ManagedObjectRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatastoreRef {
    pub name: String,
    pub reference: ManagedObjectRef,
}

// ---------------------------------------------------------------------------
// Storage and resources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StorageDescriptor {
    #[serde(rename = "CapacityInKB")]
    pub capacity_kb: u64,
    pub datastore: DatastoreRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceDescriptor {
    pub cpu_count: u32,
    #[serde(rename = "MemoryMB")]
    pub memory_mb: u64,
}
