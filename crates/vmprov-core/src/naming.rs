use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// RFC 1123 host label: alphanumeric + hyphens, no leading/trailing hyphen.
static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("static hostname pattern")
});

/// Host offsets below this are reserved (.0 network, .1 gateway, .2 builder).
const FIRST_HOST_OFFSET: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid IPv4 CIDR {0:?}, expected a.b.c.d/len")]
    InvalidCidr(String),
    #[error("IPv4 pool {0} is too small, need at least a /29")]
    PoolTooSmall(String),
}

/// IPv4 subnet that generated addresses, netmask and gateway are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Pool {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Pool {
    /// Parse "10.240.0.0/24". Host bits in the address are masked off.
    pub fn parse(cidr: &str) -> Result<Self, AddressError> {
        let invalid = || AddressError::InvalidCidr(cidr.to_string());
        let (addr, len) = cidr.split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr.trim().parse().map_err(|_| invalid())?;
        let prefix: u8 = len.trim().parse().map_err(|_| invalid())?;
        Self::new(addr, prefix)
    }

    /// Subnet of `addr` with the given prefix length.
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, AddressError> {
        if prefix > 32 {
            return Err(AddressError::InvalidCidr(format!("{}/{}", addr, prefix)));
        }
        if prefix > 29 {
            return Err(AddressError::PoolTooSmall(format!("{}/{}", addr, prefix)));
        }
        let network = Ipv4Addr::from(u32::from(addr) & mask_bits(prefix));
        Ok(Self { network, prefix })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(mask_bits(self.prefix))
    }

    /// First host of the subnet.
    pub fn gateway(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) + 1)
    }

    /// First host, or the last one when `taken` already holds the first.
    pub fn gateway_avoiding(&self, taken: Option<Ipv4Addr>) -> Ipv4Addr {
        let first = self.gateway();
        if taken == Some(first) {
            Ipv4Addr::from(u32::from(self.broadcast()) - 1)
        } else {
            first
        }
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | !mask_bits(self.prefix))
    }

    /// Deterministic host address for `key`, skipping the reserved offsets
    /// and the broadcast address.
    pub fn host_address(&self, key: &str) -> Ipv4Addr {
        self.host_address_avoiding(key, None)
    }

    /// Like [`host_address`](Self::host_address), but steps past `taken`
    /// when the hash lands on it.
    pub fn host_address_avoiding(&self, key: &str, taken: Option<Ipv4Addr>) -> Ipv4Addr {
        let size = 1u64 << (32 - u32::from(self.prefix));
        let first = u64::from(FIRST_HOST_OFFSET);
        let usable = size - first - 1;
        let digest = Sha256::digest(key.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let slot = u64::from_be_bytes(head) % usable;

        let at = |slot: u64| Ipv4Addr::from(u32::from(self.network) + (slot + first) as u32);
        let addr = at(slot);
        if taken == Some(addr) {
            at((slot + 1) % usable)
        } else {
            addr
        }
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & mask_bits(self.prefix) == u32::from(self.network)
    }
}

impl std::fmt::Display for Ipv4Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

fn mask_bits(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

/// Dotted-quad IPv4 literal a guest can hold as its own address or use as
/// a next hop. Unspecified, broadcast, multicast and loopback are rejected.
pub fn is_host_ipv4(value: &str) -> bool {
    match value.parse::<Ipv4Addr>() {
        Ok(addr) => {
            !(addr.is_unspecified()
                || addr.is_broadcast()
                || addr.is_multicast()
                || addr.is_loopback())
        }
        Err(_) => false,
    }
}

/// Dotted-quad mask with contiguous leading ones, e.g. "255.255.255.0".
pub fn is_netmask(value: &str) -> bool {
    match value.parse::<Ipv4Addr>() {
        Ok(addr) => {
            let bits = u32::from(addr);
            bits != 0 && bits.leading_ones() + bits.trailing_zeros() == 32
        }
        Err(_) => false,
    }
}

/// Prefix length of a contiguous mask, e.g. 24 for "255.255.255.0".
pub fn prefix_len(mask: Ipv4Addr) -> u8 {
    u32::from(mask).leading_ones() as u8
}

/// Whether `a` and `b` are distinct addresses on the same network under `mask`.
pub fn share_subnet(a: Ipv4Addr, b: Ipv4Addr, mask: Ipv4Addr) -> bool {
    let mask = u32::from(mask);
    a != b && u32::from(a) & mask == u32::from(b) & mask
}

pub fn is_hostname(value: &str) -> bool {
    HOSTNAME_RE.is_match(value)
}

/// Generate "<prefix>-<vm id>" with the VM id folded into a host label.
///
/// Falls back to a short digest when the id has no usable characters.
pub fn generate_hostname(prefix: &str, vm_id: &str) -> String {
    let mut label = String::with_capacity(vm_id.len());
    for c in vm_id.chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c.to_ascii_lowercase());
        } else if !label.ends_with('-') {
            label.push('-');
        }
    }
    let label = label.trim_matches('-');
    let label = if label.is_empty() {
        let digest = Sha256::digest(vm_id.as_bytes());
        digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
    } else {
        label.to_string()
    };

    let mut name = format!("{}-{}", prefix, label);
    name.truncate(63);
    name.trim_end_matches('-').to_string()
}
