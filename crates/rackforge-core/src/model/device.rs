// ── Device desired state ─────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use super::port::{FrontPortSpec, InterfaceSpec, RearPortSpec};

/// Which rack face a device mounts on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFace {
    #[default]
    Front,
    Rear,
}

impl DeviceFace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Rear => "rear",
        }
    }
}

/// A desired tag: numeric backend id or a slug to be resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagEntry {
    Id(i64),
    Slug(String),
}

/// Desired state for a module installed in a named module bay.
///
/// `name` must equal an existing module-bay name on the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    pub module_type_slug: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub asset_tag: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagEntry>,
}

/// Desired state for one physical device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub name: String,
    pub site_slug: String,
    pub device_type_slug: String,
    pub role_slug: String,

    // Rack location (normal devices)
    #[serde(default)]
    pub rack_slug: Option<String>,
    #[serde(default)]
    pub position: Option<f64>,
    #[serde(default)]
    pub face: DeviceFace,

    // Chassis location (blade/node devices)
    #[serde(default)]
    pub parent_device: Option<String>,
    #[serde(default)]
    pub device_bay: Option<String>,

    // Metadata
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub asset_tag: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagEntry>,

    // Components
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceSpec>,
    #[serde(default)]
    pub front_ports: Vec<FrontPortSpec>,
    #[serde(default)]
    pub rear_ports: Vec<RearPortSpec>,
}

fn default_status() -> String {
    "active".to_owned()
}

/// Resolved physical placement of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement<'a> {
    /// Installed into a chassis bay of a parent device.
    Bayed { parent: &'a str, bay: &'a str },
    /// Mounted in a rack under its own coordinates.
    Racked { rack_slug: &'a str },
    /// No placement; rack/position stay clear.
    Floating,
}

impl DeviceSpec {
    /// Resolve the target placement state.
    ///
    /// Chassis placement takes precedence when both are declared;
    /// [`Self::placement_conflict`] reports that case so callers can flag it.
    pub fn placement(&self) -> Placement<'_> {
        if let (Some(parent), Some(bay)) = (self.parent_device.as_deref(), self.device_bay.as_deref())
        {
            return Placement::Bayed { parent, bay };
        }
        if let Some(rack) = self.rack_slug.as_deref() {
            return Placement::Racked { rack_slug: rack };
        }
        Placement::Floating
    }

    /// True when the spec declares both a rack slug and a chassis bay.
    pub fn placement_conflict(&self) -> bool {
        self.rack_slug.is_some() && self.parent_device.is_some() && self.device_bay.is_some()
    }
}
