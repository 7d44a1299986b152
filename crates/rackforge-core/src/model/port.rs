// ── Port, interface, address, and link desired state ─────────────────

use serde::{Deserialize, Serialize};

use super::device::TagEntry;

/// A cable connection declared on a port or interface.
///
/// The termination-type pairing is *not* declared here; the cable
/// reconciler infers it from the device roles on both ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSpec {
    pub peer_device: String,
    pub peer_port: String,
    #[serde(default)]
    pub cable_type: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub length_unit: Option<String>,
}

/// Role of an address on its device: primary addresses are pushed onto
/// the device's `primary_ip4`/`primary_ip6` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressRole {
    Primary,
    #[default]
    Secondary,
}

/// 802.1Q mode of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterfaceMode {
    Access,
    Tagged,
    TaggedAll,
}

impl InterfaceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Tagged => "tagged",
            Self::TaggedAll => "tagged-all",
        }
    }
}

/// IP address configuration assigned to an interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpSpec {
    /// CIDR notation, e.g. `10.0.0.1/24`.
    pub address: String,
    #[serde(default)]
    pub dns_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_ip_status")]
    pub status: String,
    #[serde(default)]
    pub vrf: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagEntry>,
}

fn default_ip_status() -> String {
    "active".to_owned()
}

/// Interface configuration for a concrete device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceSpec {
    pub name: String,
    #[serde(default = "default_interface_type")]
    pub r#type: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mtu: Option<u32>,

    // Layer 1: cabling
    #[serde(default)]
    pub link: Option<LinkSpec>,

    // Layer 2: switching
    #[serde(default)]
    pub mode: Option<InterfaceMode>,
    #[serde(default)]
    pub untagged_vlan: Option<String>,
    #[serde(default)]
    pub tagged_vlans: Vec<String>,

    // Layer 3: addressing
    #[serde(default)]
    pub ip: Option<IpSpec>,
    #[serde(default)]
    pub address_role: AddressRole,

    #[serde(default)]
    pub tags: Vec<TagEntry>,
}

fn default_interface_type() -> String {
    "1000base-t".to_owned()
}

fn default_true() -> bool {
    true
}

/// Rear port configuration (backbone side of a panel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RearPortSpec {
    pub name: String,
    #[serde(default = "default_rear_port_type")]
    pub r#type: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_positions")]
    pub positions: u16,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagEntry>,
    #[serde(default)]
    pub link: Option<LinkSpec>,
}

fn default_rear_port_type() -> String {
    "lc".to_owned()
}

fn default_positions() -> u16 {
    1
}

/// Front port configuration (patch side of a panel).
///
/// Always maps onto a named rear port position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontPortSpec {
    pub name: String,
    pub r#type: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagEntry>,

    pub rear_port: String,
    #[serde(default = "default_positions")]
    pub rear_port_position: u16,

    #[serde(default)]
    pub link: Option<LinkSpec>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::{InterfaceMode, InterfaceSpec};

    #[test]
    fn interface_defaults_match_backend_expectations() {
        let iface: InterfaceSpec = serde_yaml::from_str("name: eth0\n").unwrap();
        assert_eq!(iface.r#type, "1000base-t");
        assert!(iface.enabled);
        assert!(iface.tagged_vlans.is_empty());
        assert!(iface.link.is_none());
    }

    #[test]
    fn interface_mode_uses_kebab_case() {
        let iface: InterfaceSpec =
            serde_yaml::from_str("name: eth0\nmode: tagged-all\n").unwrap();
        assert_eq!(iface.mode, Some(InterfaceMode::TaggedAll));
    }
}
