// ── Resource kinds ───────────────────────────────────────────────────
//
// Every backend resource the reconciler touches, with its REST path and
// a capability flag for tag support. Template kinds reject tag payloads,
// so the flag is consulted instead of probing live objects.

use strum::Display;

/// A NetBox resource kind, addressable under `/api/<app>/<endpoint>/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ResourceKind {
    Sites,
    Racks,
    DeviceTypes,
    DeviceRoles,
    Manufacturers,
    Devices,
    DeviceBays,
    DeviceBayTemplates,
    ModuleTypes,
    ModuleBays,
    Modules,
    Interfaces,
    FrontPorts,
    RearPorts,
    Cables,
    Vrfs,
    Vlans,
    IpAddresses,
    Tags,
}

impl ResourceKind {
    /// Relative REST path for this kind (joined onto the `/api/` base).
    pub fn path(self) -> &'static str {
        match self {
            Self::Sites => "dcim/sites/",
            Self::Racks => "dcim/racks/",
            Self::DeviceTypes => "dcim/device-types/",
            Self::DeviceRoles => "dcim/device-roles/",
            Self::Manufacturers => "dcim/manufacturers/",
            Self::Devices => "dcim/devices/",
            Self::DeviceBays => "dcim/device-bays/",
            Self::DeviceBayTemplates => "dcim/device-bay-templates/",
            Self::ModuleTypes => "dcim/module-types/",
            Self::ModuleBays => "dcim/module-bays/",
            Self::Modules => "dcim/modules/",
            Self::Interfaces => "dcim/interfaces/",
            Self::FrontPorts => "dcim/front-ports/",
            Self::RearPorts => "dcim/rear-ports/",
            Self::Cables => "dcim/cables/",
            Self::Vrfs => "ipam/vrfs/",
            Self::Vlans => "ipam/vlans/",
            Self::IpAddresses => "ipam/ip-addresses/",
            Self::Tags => "extras/tags/",
        }
    }

    /// Whether objects of this kind accept a `tags` field.
    ///
    /// Template kinds do not; sending tags to them is a 400.
    pub fn supports_tags(self) -> bool {
        !matches!(self, Self::DeviceBayTemplates)
    }
}

#[cfg(test)]
mod tests {
    use super::ResourceKind;

    #[test]
    fn paths_are_app_scoped() {
        assert_eq!(ResourceKind::Devices.path(), "dcim/devices/");
        assert_eq!(ResourceKind::IpAddresses.path(), "ipam/ip-addresses/");
        assert_eq!(ResourceKind::Tags.path(), "extras/tags/");
    }

    #[test]
    fn template_kinds_reject_tags() {
        assert!(!ResourceKind::DeviceBayTemplates.supports_tags());
        assert!(ResourceKind::Cables.supports_tags());
        assert!(ResourceKind::Modules.supports_tags());
    }

    #[test]
    fn display_matches_endpoint_naming() {
        assert_eq!(ResourceKind::FrontPorts.to_string(), "front-ports");
        assert_eq!(ResourceKind::DeviceBayTemplates.to_string(), "device-bay-templates");
    }
}
