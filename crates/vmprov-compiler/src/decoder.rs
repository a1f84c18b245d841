//! Structural decoding of customer specifications.
//!
//! No semantic validation or defaulting happens here: a document that parses
//! is handed to the stages as-is, and one that does not never becomes a
//! zero-valued spec.

use std::fmt;

use thiserror::Error;
use vmprov_core::error::StageError;
use vmprov_core::spec::ProvisioningSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Xml,
}

impl SpecFormat {
    /// Guess the format from the first non-whitespace byte.
    pub fn sniff(raw: &[u8]) -> Self {
        match raw.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'<') => Self::Xml,
            _ => Self::Json,
        }
    }
}

impl fmt::Display for SpecFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Xml => write!(f, "xml"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("specification is empty")]
    Empty,
    #[error("specification is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("invalid JSON specification: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid XML specification: {0}")]
    Xml(#[from] quick_xml::DeError),
}

impl From<DecodeError> for StageError {
    fn from(e: DecodeError) -> Self {
        StageError::Decode(e.to_string())
    }
}

/// Decode a JSON or XML document, picking the format by sniffing.
pub fn decode(raw: &[u8]) -> Result<ProvisioningSpec, DecodeError> {
    decode_as(raw, SpecFormat::sniff(raw))
}

pub fn decode_as(raw: &[u8], format: SpecFormat) -> Result<ProvisioningSpec, DecodeError> {
    if raw.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(DecodeError::Empty);
    }
    let spec = match format {
        SpecFormat::Json => serde_json::from_slice(raw)?,
        SpecFormat::Xml => {
            let text = std::str::from_utf8(raw)?;
            quick_xml::de::from_str(text)?
        }
    };
    tracing::debug!(%format, "decoded provisioning spec");
    Ok(spec)
}

/// Canonical JSON encoding. Absent optionals are omitted, so
/// `decode(encode(spec)) == spec`.
pub fn encode(spec: &ProvisioningSpec) -> Result<String, DecodeError> {
    Ok(serde_json::to_string_pretty(spec)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "Metadata": {"VirtualMachineId": "vm-1", "VmOwnerId": "owner-9"},
        "HostSystem": {"DistributionName": "ubuntu", "Bit": 64},
        "Network": {"IP": "", "Netmask": "255.255.255.0", "Enablev6": true},
        "Resources": {"CpuNum": 2, "MemoryInMegabytes": 4096},
        "Disk": {"CapacityInKB": 20000},
        "Datacenter": {"ItemPath": "/dc1"}
    }"#;

    const XML: &str = r#"<?xml version="1.0"?>
<ProvisioningSpec>
  <Metadata>
    <VirtualMachineId>vm-1</VirtualMachineId>
    <VmOwnerId>owner-9</VmOwnerId>
  </Metadata>
  <HostSystem>
    <DistributionName>ubuntu</DistributionName>
    <Bit>64</Bit>
  </HostSystem>
  <Network>
    <Netmask>255.255.255.0</Netmask>
    <Enablev6>true</Enablev6>
  </Network>
  <Resources>
    <CpuNum>2</CpuNum>
    <MemoryInMegabytes>4096</MemoryInMegabytes>
  </Resources>
  <Disk>
    <CapacityInKB>20000</CapacityInKB>
  </Disk>
</ProvisioningSpec>"#;

    #[test]
    fn test_sniff() {
        assert_eq!(SpecFormat::sniff(b"  \n<Spec/>"), SpecFormat::Xml);
        assert_eq!(SpecFormat::sniff(b"{}"), SpecFormat::Json);
        assert_eq!(SpecFormat::sniff(b""), SpecFormat::Json);
    }

    #[test]
    fn test_decode_json() {
        let spec = decode(JSON.as_bytes()).unwrap();
        assert_eq!(spec.metadata.owner_id, "owner-9");
        assert_eq!(spec.host_system.bit, Some(64));
        assert_eq!(spec.network.ip.as_deref(), Some(""));
        assert_eq!(spec.network.enable_v6, Some(true));
        assert_eq!(spec.network.gateway, None);
        assert_eq!(spec.datacenter.unwrap().item_path, "/dc1");
    }

    #[test]
    fn test_decode_xml() {
        let spec = decode(XML.as_bytes()).unwrap();
        assert_eq!(spec.metadata.vm_id, "vm-1");
        assert_eq!(spec.host_system.distribution_name, "ubuntu");
        assert_eq!(spec.resources.cpu_num, 2);
        assert_eq!(spec.resources.memory_mb, 4096);
        assert_eq!(spec.disk.capacity_kb, 20000);
        assert_eq!(spec.network.netmask.as_deref(), Some("255.255.255.0"));
        assert_eq!(spec.network.enable_v6, Some(true));
        assert!(spec.datacenter.is_none());
    }

    #[test]
    fn test_json_and_xml_agree() {
        let from_xml = decode(XML.as_bytes()).unwrap();
        let mut from_json = decode(JSON.as_bytes()).unwrap();
        from_json.network.ip = None;
        from_json.datacenter = None;
        assert_eq!(from_xml, from_json);
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let bad = JSON.replace("\"CpuNum\": 2", "\"CpuNum\": \"two\"");
        assert!(matches!(decode(bad.as_bytes()), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        assert!(matches!(decode(b"   "), Err(DecodeError::Empty)));
        assert!(matches!(decode(b"{\"Metadata\":"), Err(DecodeError::Json(_))));
        assert!(decode(b"{}").is_err());
        assert!(matches!(
            decode_as(b"<Spec><Metadata>", SpecFormat::Xml),
            Err(DecodeError::Xml(_))
        ));
    }

    #[test]
    fn test_encode_then_decode_is_identity() {
        let spec = decode(JSON.as_bytes()).unwrap();
        let encoded = encode(&spec).unwrap();
        assert_eq!(decode(encoded.as_bytes()).unwrap(), spec);

        let spec = decode(XML.as_bytes()).unwrap();
        let encoded = encode(&spec).unwrap();
        assert!(!encoded.contains("Datacenter"));
        assert_eq!(decode(encoded.as_bytes()).unwrap(), spec);
    }

    #[test]
    fn test_decode_error_maps_to_stage_error() {
        let err: StageError = decode(b"not json").unwrap_err().into();
        assert!(matches!(err, StageError::Decode(_)));
    }
}
