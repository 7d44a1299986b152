//! Desired-state value objects.
//!
//! These are the validated inputs to the engine: one [`DeviceSpec`] per
//! physical device, with nested port, module, address, and link entries.
//! Structural validation happens in the loader; the engine only checks
//! that cross-references (sites, roles, types, peers) resolve.

mod device;
mod port;

pub use device::{DeviceFace, DeviceSpec, ModuleSpec, Placement, TagEntry};
pub use port::{
    AddressRole, FrontPortSpec, InterfaceMode, InterfaceSpec, IpSpec, LinkSpec, RearPortSpec,
};
