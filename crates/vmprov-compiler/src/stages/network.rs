use std::net::Ipv4Addr;

use vmprov_core::config::NetworkSettings;
use vmprov_core::customization::{
    AdapterMapping, FixedName, Identity, IpGenerator, IpSettings, IpV6Generator, IpV6Spec,
    NetworkCustomization,
};
use vmprov_core::descriptor::{
    FieldValue, GeneratorKind, GuestFamily, NetworkDescriptor, NetworkField,
};
use vmprov_core::error::StageError;
use vmprov_core::naming::{self, Ipv4Pool};
use vmprov_core::spec::NetworkSpec;

/// Value written to the IP field when the adapter is left to DHCP.
pub const DHCP_ADDRESS: &str = "dhcp";

type Validator = fn(&str) -> bool;

/// Per-field validation rules. Generators are attached from config.
const VALIDATORS: [(NetworkField, Validator); 4] = [
    (NetworkField::Ip, naming::is_host_ipv4),
    (NetworkField::Netmask, naming::is_netmask),
    (NetworkField::Gateway, naming::is_host_ipv4),
    (NetworkField::Hostname, naming::is_hostname),
];

/// Addresses a request already fixed. Generated values are drawn from
/// `subnet` so they land on the same network as these.
#[derive(Debug, Clone, Copy)]
struct Anchors {
    ip: Option<Ipv4Addr>,
    gateway: Option<Ipv4Addr>,
    subnet: Option<Ipv4Pool>,
}

#[derive(Debug, Clone, Copy)]
struct FieldRule {
    field: NetworkField,
    validate: Validator,
    generator: Option<GeneratorKind>,
}

/// Validates the four identity fields, fills invalid ones from their
/// generator, and builds the adapter mapping and guest identity.
#[derive(Debug, Clone)]
pub struct NetworkCustomizer {
    rules: [FieldRule; 4],
    pool: Ipv4Pool,
    hostname_prefix: String,
    domain: String,
    workgroup: String,
}

impl NetworkCustomizer {
    pub fn new(settings: &NetworkSettings, pool: Ipv4Pool) -> Self {
        let rules = VALIDATORS.map(|(field, validate)| FieldRule {
            field,
            validate,
            generator: settings
                .generators
                .get(field)
                .filter(|g| g.applies_to(field)),
        });
        Self {
            rules,
            pool,
            hostname_prefix: settings.hostname_prefix.clone(),
            domain: settings.domain.clone(),
            workgroup: settings.workgroup.clone(),
        }
    }

    pub fn generator_for(&self, field: NetworkField) -> Option<GeneratorKind> {
        self.rules
            .iter()
            .find(|r| r.field == field)
            .and_then(|r| r.generator)
    }

    /// Every field that fails validation and has no generator is reported,
    /// not only the first. A literal IP and gateway that do not share a
    /// subnet fail with both fields named.
    pub fn customize(
        &self,
        spec: &NetworkSpec,
        vm_id: &str,
        family: GuestFamily,
    ) -> Result<NetworkCustomization, StageError> {
        let anchors = self.anchors(spec);
        let resolved = self.rules.map(|rule| self.resolve_field(rule, spec, &anchors, vm_id));
        let invalid: Vec<String> = resolved
            .iter()
            .filter_map(|r| r.as_ref().err())
            .map(|field| field.name().to_string())
            .collect();

        let [Ok(ipv4), Ok(netmask), Ok(gateway), Ok(hostname)] = resolved else {
            return Err(StageError::Validation { fields: invalid });
        };
        let descriptor = NetworkDescriptor {
            ipv4,
            netmask,
            gateway,
            hostname,
            enable_v4: spec.enable_v4.unwrap_or(true),
            enable_v6: spec.enable_v6.unwrap_or(false),
        };
        check_routable(&descriptor)?;

        let adapter = self.adapter(&descriptor);
        let identity = self.identity(&descriptor, family);
        Ok(NetworkCustomization {
            descriptor,
            nic_setting_map: vec![adapter],
            identity,
        })
    }

    /// The subnet generators draw from: the literal IP's network, else the
    /// literal gateway's, else the configured pool. A literal netmask sets
    /// the prefix length. `None` when that subnet is too small to host
    /// generated addresses.
    fn anchors(&self, spec: &NetworkSpec) -> Anchors {
        let ip = self.literal_addr(spec, NetworkField::Ip);
        let gateway = self.literal_addr(spec, NetworkField::Gateway);
        let prefix = self
            .literal_addr(spec, NetworkField::Netmask)
            .map(naming::prefix_len)
            .unwrap_or(self.pool.prefix());
        let base = ip.or(gateway).unwrap_or(self.pool.network());
        Anchors {
            ip,
            gateway,
            subnet: Ipv4Pool::new(base, prefix).ok(),
        }
    }

    fn literal_addr(&self, spec: &NetworkSpec, field: NetworkField) -> Option<Ipv4Addr> {
        let raw = input(spec, field)?;
        let rule = self.rules.iter().find(|r| r.field == field)?;
        if (rule.validate)(raw) {
            raw.parse().ok()
        } else {
            None
        }
    }

    /// Literal if it validates, else the generator's value. `Err` names a
    /// field that is invalid and could not be generated.
    fn resolve_field(
        &self,
        rule: FieldRule,
        spec: &NetworkSpec,
        anchors: &Anchors,
        vm_id: &str,
    ) -> Result<FieldValue, NetworkField> {
        let raw = input(spec, rule.field).unwrap_or_default();
        if (rule.validate)(raw) {
            return Ok(FieldValue::Literal {
                value: raw.to_string(),
            });
        }
        let generator = rule.generator.ok_or(rule.field)?;
        let value = self.generate(generator, anchors, vm_id).ok_or(rule.field)?;
        tracing::debug!(field = %rule.field, %generator, %value, "generated network field");
        Ok(FieldValue::Generated { generator, value })
    }

    fn generate(&self, generator: GeneratorKind, anchors: &Anchors, vm_id: &str) -> Option<String> {
        let value = match generator {
            GeneratorKind::FixedIp => anchors
                .subnet?
                .host_address_avoiding(vm_id, anchors.gateway)
                .to_string(),
            GeneratorKind::Dhcp => DHCP_ADDRESS.to_string(),
            GeneratorKind::SubnetMask => anchors.subnet?.netmask().to_string(),
            GeneratorKind::PoolGateway => anchors.subnet?.gateway_avoiding(anchors.ip).to_string(),
            GeneratorKind::HostName => naming::generate_hostname(&self.hostname_prefix, vm_id),
            GeneratorKind::AutoIpv6 => return None,
        };
        Some(value)
    }

    fn adapter(&self, descriptor: &NetworkDescriptor) -> AdapterMapping {
        let dhcp = uses_dhcp(descriptor);
        let ip = if dhcp {
            IpGenerator::Dhcp
        } else {
            IpGenerator::Fixed {
                ip_address: descriptor.ipv4.value().to_string(),
            }
        };
        let ip_v6_spec = descriptor.enable_v6.then(|| IpV6Spec {
            ip: vec![IpV6Generator::AutoIpV6],
        });
        AdapterMapping {
            adapter: IpSettings {
                ip,
                subnet_mask: descriptor.netmask.value().to_string(),
                gateway: vec![descriptor.gateway.value().to_string()],
                ip_v6_spec,
            },
        }
    }

    fn identity(&self, descriptor: &NetworkDescriptor, family: GuestFamily) -> Identity {
        let name = FixedName {
            name: descriptor.hostname.value().to_string(),
        };
        match family {
            GuestFamily::Linux => Identity::LinuxPrep {
                host_name: name,
                domain: self.domain.clone(),
            },
            GuestFamily::Windows => Identity::Sysprep {
                computer_name: name,
                workgroup: self.workgroup.clone(),
            },
        }
    }
}

fn uses_dhcp(descriptor: &NetworkDescriptor) -> bool {
    !descriptor.enable_v4 || descriptor.ipv4.generator() == Some(GeneratorKind::Dhcp)
}

/// A fixed IPv4 address must reach its gateway directly.
fn check_routable(descriptor: &NetworkDescriptor) -> Result<(), StageError> {
    if uses_dhcp(descriptor) {
        return Ok(());
    }
    let addr = |value: &FieldValue| value.value().parse::<Ipv4Addr>().ok();
    let (Some(ip), Some(mask), Some(gateway)) = (
        addr(&descriptor.ipv4),
        addr(&descriptor.netmask),
        addr(&descriptor.gateway),
    ) else {
        return Ok(());
    };
    if naming::share_subnet(ip, gateway, mask) {
        return Ok(());
    }
    tracing::debug!(%ip, %mask, %gateway, "gateway is not on the address's subnet");
    Err(StageError::Validation {
        fields: vec![
            NetworkField::Ip.name().to_string(),
            NetworkField::Gateway.name().to_string(),
        ],
    })
}

fn input(spec: &NetworkSpec, field: NetworkField) -> Option<&str> {
    match field {
        NetworkField::Ip => spec.ip.as_deref(),
        NetworkField::Netmask => spec.netmask.as_deref(),
        NetworkField::Gateway => spec.gateway.as_deref(),
        NetworkField::Hostname => spec.hostname.as_deref(),
    }
}
