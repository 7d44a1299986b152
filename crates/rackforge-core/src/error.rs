use thiserror::Error;

use rackforge_api::ResourceKind;

/// Errors raised by the reconciliation engine.
///
/// Most of these abort only the unit of work they occur in (a device, a
/// module bay, a cable link); the engine logs them and moves on. Nothing
/// here aborts a whole run.
#[derive(Debug, Error)]
pub enum Error {
    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] rackforge_api::Error),

    /// A reference (site, role, type, rack, VLAN, ...) did not resolve.
    #[error("unresolved {kind} reference '{key}'")]
    MissingReference { kind: ResourceKind, key: String },

    /// Chassis parent device does not exist in the backend.
    #[error("parent device '{name}' not found")]
    ParentNotFound { name: String },

    /// Named device bay does not exist on the parent.
    #[error("device bay '{bay}' not found on parent '{parent}'")]
    BayNotFound { parent: String, bay: String },

    /// Peer device role could not be determined by any strategy.
    #[error("role of peer device '{device}' could not be resolved")]
    RoleUnresolved { device: String },

    /// Peer device for a cable link does not exist.
    #[error("peer device '{name}' not found")]
    PeerDeviceNotFound { name: String },

    /// Peer port of the inferred kind does not exist on the peer device.
    #[error("peer port '{device}:{port}' not found as {kind}")]
    PeerPortNotFound {
        device: String,
        port: String,
        kind: ResourceKind,
    },

    /// A destructive operation was refused because the object is not ours.
    #[error("refusing to delete unmanaged cable {id}")]
    UnmanagedCable { id: i64 },

    /// Create or update was rejected by the backend.
    #[error("failed to apply {kind} '{name}'")]
    ApplyFailed { kind: ResourceKind, name: String },
}
