use std::net::Ipv4Addr;

use proptest::prelude::*;
use vmprov_compiler::stages::{HostSystemCustomizer, NetworkCustomizer};
use vmprov_compiler::{decode, encode};
use vmprov_core::config::{HostSystemSettings, NetworkSettings};
use vmprov_core::descriptor::{FieldValue, GeneratorKind, GuestFamily, NetworkField};
use vmprov_core::error::{ErrorKind, StageError};
use vmprov_core::naming::{self, Ipv4Pool};
use vmprov_core::spec::{
    DatacenterSpec, DiskSpec, HostSystemSpec, Metadata, NetworkSpec, ProvisioningSpec,
    ResourcesSpec,
};

fn dotted(octets: [u8; 4]) -> String {
    Ipv4Addr::from(octets).to_string()
}

fn address_input() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        any::<[u8; 4]>().prop_map(|o| Some(dotted(o))),
        prop_oneof![
            Just("0.0.0.0"),
            Just("255.255.255.255"),
            Just("127.0.0.1"),
            Just("224.0.0.1"),
            Just("dhcp"),
        ]
        .prop_map(|s| Some(s.to_string())),
        "[0-9.]{0,16}".prop_map(Some),
    ]
}

fn netmask_input() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        (0u32..=32).prop_map(|len| {
            let bits = if len == 0 { 0 } else { u32::MAX << (32 - len) };
            Some(Ipv4Addr::from(bits).to_string())
        }),
        any::<[u8; 4]>().prop_map(|o| Some(dotted(o))),
    ]
}

fn hostname_input() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        "[a-z0-9-]{0,70}".prop_map(Some),
        ".{0,20}".prop_map(Some),
    ]
}

fn network_spec() -> impl Strategy<Value = NetworkSpec> {
    (
        address_input(),
        netmask_input(),
        address_input(),
        hostname_input(),
        any::<Option<bool>>(),
        any::<Option<bool>>(),
    )
        .prop_map(|(ip, netmask, gateway, hostname, enable_v4, enable_v6)| NetworkSpec {
            ip,
            netmask,
            gateway,
            hostname,
            enable_v4,
            enable_v6,
        })
}

fn provisioning_spec() -> impl Strategy<Value = ProvisioningSpec> {
    (
        (".*", ".*"),
        (".*", any::<Option<i64>>()),
        network_spec(),
        (any::<i32>(), any::<i64>(), any::<i64>()),
        proptest::option::of(".*"),
    )
        .prop_map(
            |((vm_id, owner_id), (distribution_name, bit), network, (cpu, mem, disk), path)| {
                ProvisioningSpec {
                    metadata: Metadata { vm_id, owner_id },
                    host_system: HostSystemSpec {
                        distribution_name,
                        bit,
                    },
                    network,
                    resources: ResourcesSpec {
                        cpu_num: cpu,
                        memory_mb: mem,
                    },
                    disk: DiskSpec { capacity_kb: disk },
                    datacenter: path.map(|item_path| DatacenterSpec { item_path }),
                }
            },
        )
}

fn network_customizer() -> NetworkCustomizer {
    let settings = NetworkSettings::default();
    let pool = Ipv4Pool::parse(&settings.ipv4_pool).unwrap();
    NetworkCustomizer::new(&settings, pool)
}

fn addr(value: &FieldValue) -> Ipv4Addr {
    value.value().parse().unwrap()
}

fn validator(field: NetworkField) -> fn(&str) -> bool {
    match field {
        NetworkField::Ip | NetworkField::Gateway => naming::is_host_ipv4,
        NetworkField::Netmask => naming::is_netmask,
        NetworkField::Hostname => naming::is_hostname,
    }
}

proptest! {
    #[test]
    fn test_encoded_specs_decode_to_themselves(spec in provisioning_spec()) {
        let encoded = encode(&spec).unwrap();
        prop_assert_eq!(decode(encoded.as_bytes()).unwrap(), spec);
    }

    #[test]
    fn test_customized_fields_are_never_empty(
        spec in network_spec(),
        vm_id in "[a-z0-9-]{1,24}",
    ) {
        match network_customizer().customize(&spec, &vm_id, GuestFamily::Linux) {
            Ok(out) => {
                let d = &out.descriptor;
                for field in NetworkField::ALL {
                    let value = d.field(field);
                    prop_assert!(!value.value().is_empty(), "{} is empty", field);
                    if !value.is_generated() {
                        prop_assert!(validator(field)(value.value()), "{} kept {:?}", field, value);
                    }
                }
                if d.enable_v4 && d.ipv4.generator() != Some(GeneratorKind::Dhcp) {
                    prop_assert!(
                        naming::share_subnet(addr(&d.ipv4), addr(&d.gateway), addr(&d.netmask)),
                        "{:?}",
                        d
                    );
                }
            }
            Err(err) => {
                prop_assert_eq!(err.kind(), ErrorKind::Validation);
                let StageError::Validation { fields } = err else {
                    unreachable!()
                };
                prop_assert!(!fields.is_empty());
                for name in &fields {
                    prop_assert!(NetworkField::ALL.iter().any(|f| f.name() == name));
                }
            }
        }
    }

    #[test]
    fn test_single_literal_address_always_customizes(
        octets in any::<[u8; 4]>(),
        as_gateway in any::<bool>(),
        vm_id in "[a-z0-9-]{1,24}",
    ) {
        let literal = dotted(octets);
        prop_assume!(naming::is_host_ipv4(&literal));
        let spec = if as_gateway {
            NetworkSpec { gateway: Some(literal.clone()), ..NetworkSpec::default() }
        } else {
            NetworkSpec { ip: Some(literal.clone()), ..NetworkSpec::default() }
        };
        let out = network_customizer()
            .customize(&spec, &vm_id, GuestFamily::Linux)
            .unwrap();
        let d = &out.descriptor;
        let kept = if as_gateway { &d.gateway } else { &d.ipv4 };
        prop_assert_eq!(kept.value(), literal.as_str());
        prop_assert!(naming::share_subnet(addr(&d.ipv4), addr(&d.gateway), addr(&d.netmask)));
    }

    #[test]
    fn test_configured_distributions_always_resolve(
        index in any::<prop::sample::Index>(),
        upper in prop::collection::vec(any::<bool>(), 0..32),
        bit in prop_oneof![Just(None), Just(Some(0i64)), Just(Some(32i64)), Just(Some(64i64))],
    ) {
        let settings = HostSystemSettings::default();
        let known: Vec<(&String, GuestFamily)> = settings
            .linux_distributions
            .iter()
            .map(|n| (n, GuestFamily::Linux))
            .chain(settings.windows_distributions.iter().map(|n| (n, GuestFamily::Windows)))
            .collect();
        let (name, family) = known[index.index(known.len())];
        let cased: String = name
            .chars()
            .zip(upper.iter().chain(std::iter::repeat(&false)))
            .map(|(c, up)| if *up { c.to_ascii_uppercase() } else { c })
            .collect();

        let config = HostSystemCustomizer::new(&settings)
            .derive_options(&cased, bit)
            .unwrap();
        prop_assert_eq!(config.options.family(), family);
        prop_assert_eq!(&config.descriptor.system_name, name);
    }

    #[test]
    fn test_unknown_distributions_never_default(name in "[A-Za-z0-9 ._-]{0,24}") {
        let settings = HostSystemSettings::default();
        let normalized = name.trim().to_lowercase();
        prop_assume!(!settings.linux_distributions.contains(&normalized));
        prop_assume!(!settings.windows_distributions.contains(&normalized));

        let err = HostSystemCustomizer::new(&settings)
            .derive_options(&name, Some(64))
            .unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
