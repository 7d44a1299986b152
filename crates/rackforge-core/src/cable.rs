// ── Cable reconciliation ─────────────────────────────────────────────
//
// Cables are bidirectional edges over polymorphic port terminations, and
// the termination pairing is never declared in configuration -- it is
// inferred from the device roles on both ends:
//
//   panel ↔ panel      rear ↔ rear    (backbone trunk)
//   device → panel     * ↔ front      (access cabling lands on the front face)
//   device ↔ device    interface ↔ interface
//
// Every link is checked on both ends before creation; conflicting cables
// are removed only when they carry the ownership tag.

use std::time::Duration;

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, warn};

use rackforge_api::{NetBoxClient, Record, ResourceKind};

use crate::error::Error;
use crate::model::{DeviceSpec, LinkSpec};
use crate::tag::is_managed;

/// Role slug that flips pairing inference from interfaces to ports.
pub const PATCH_PANEL_ROLE: &str = "patch-panel";

const DEFAULT_CABLE_TYPE: &str = "cat6a";
const DEFAULT_LENGTH_UNIT: &str = "m";

/// Settling delay after a cable deletion, for backend-side cleanup.
const WAIT_AFTER_CABLE_DELETE: Duration = Duration::from_secs(1);

// ── Termination kinds ───────────────────────────────────────────────

/// The three port kinds a cable may terminate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationKind {
    Interface,
    FrontPort,
    RearPort,
}

impl TerminationKind {
    /// Polymorphic object-type string used in cable terminations.
    pub fn object_type(self) -> &'static str {
        match self {
            Self::Interface => "dcim.interface",
            Self::FrontPort => "dcim.frontport",
            Self::RearPort => "dcim.rearport",
        }
    }

    pub fn resource_kind(self) -> ResourceKind {
        match self {
            Self::Interface => ResourceKind::Interfaces,
            Self::FrontPort => ResourceKind::FrontPorts,
            Self::RearPort => ResourceKind::RearPorts,
        }
    }

    /// Infer the peer-side termination kind from the role pairing.
    pub fn infer_peer(local_is_panel: bool, peer_is_panel: bool) -> Self {
        match (local_is_panel, peer_is_panel) {
            (true, true) => Self::RearPort,
            (_, true) => Self::FrontPort,
            (_, false) => Self::Interface,
        }
    }
}

// ── Color normalization ─────────────────────────────────────────────

/// Map a color name to its hex code and strip any `#` prefix.
///
/// Unrecognized values pass through unchanged (minus the prefix), so
/// custom hex codes keep working.
pub fn normalize_color(color: Option<&str>) -> String {
    let Some(color) = color else {
        return String::new();
    };
    let raw = color.trim().to_lowercase();
    let mapped = match raw.as_str() {
        "purple" => "800080",
        "blue" => "0000ff",
        "yellow" => "ffff00",
        "red" => "ff0000",
        "white" => "ffffff",
        "black" => "000000",
        "gray" | "grey" => "808080",
        "orange" => "ffa500",
        "green" => "008000",
        _ => &raw,
    };
    mapped.replace('#', "")
}

// ── Reconciler ──────────────────────────────────────────────────────

/// Reconciles the cable links declared on one device's ports.
pub struct CableReconciler<'a> {
    client: &'a NetBoxClient,
    tag_id: i64,
    dry_run: bool,
}

impl<'a> CableReconciler<'a> {
    pub fn new(client: &'a NetBoxClient, tag_id: i64, dry_run: bool) -> Self {
        Self {
            client,
            tag_id,
            dry_run,
        }
    }

    /// Reconcile every link declared on `spec`'s interfaces and ports.
    ///
    /// Per-link failures are logged and the remaining links proceed.
    pub async fn reconcile_device_cables(&self, device: &Record, spec: &DeviceSpec) {
        let device_id = device.id();
        info!(device = spec.name, "reconciling cables");

        // The union of the device's real ports, tagged with the collection
        // each was found in -- that collection *is* the local termination kind.
        let mut local_ports: IndexMap<String, (TerminationKind, Record)> = IndexMap::new();
        for kind in [
            TerminationKind::Interface,
            TerminationKind::FrontPort,
            TerminationKind::RearPort,
        ] {
            match self
                .client
                .filter(kind.resource_kind(), &[("device_id", device_id.to_string())])
                .await
            {
                Ok(ports) => {
                    for port in ports {
                        let Some(name) = port.name().map(str::to_owned) else {
                            continue;
                        };
                        local_ports.insert(name, (kind, port));
                    }
                }
                Err(e) => {
                    error!(device = spec.name, kind = %kind.resource_kind(), error = %e, "port listing failed");
                }
            }
        }

        let mut linked: Vec<(&str, &LinkSpec)> = Vec::new();
        for iface in &spec.interfaces {
            if let Some(link) = &iface.link {
                linked.push((&iface.name, link));
            }
        }
        for port in &spec.front_ports {
            if let Some(link) = &port.link {
                linked.push((&port.name, link));
            }
        }
        for port in &spec.rear_ports {
            if let Some(link) = &port.link {
                linked.push((&port.name, link));
            }
        }
        debug!(device = spec.name, ports = local_ports.len(), links = linked.len(), "gathered ports");

        for (name, link) in linked {
            let Some((local_kind, local_port)) = local_ports.get(name) else {
                warn!(device = spec.name, port = name, "local port not found, skipping link");
                continue;
            };

            if let Err(e) = self
                .reconcile_link(&spec.name, &spec.role_slug, *local_kind, local_port, name, link)
                .await
            {
                warn!(device = spec.name, port = name, error = %e, "link not reconciled");
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn reconcile_link(
        &self,
        device_name: &str,
        device_role: &str,
        local_kind: TerminationKind,
        local_port: &Record,
        port_name: &str,
        link: &LinkSpec,
    ) -> Result<(), Error> {
        // Peer device and role. The role must resolve -- pairing inference
        // depends on it -- so a thin relation triggers a full re-fetch.
        let peer_device = self
            .client
            .get(ResourceKind::Devices, &[("name", link.peer_device.clone())])
            .await?
            .ok_or_else(|| Error::PeerDeviceNotFound {
                name: link.peer_device.clone(),
            })?;

        let peer_role = match peer_device.role_slug() {
            Some(role) => role,
            None => self
                .client
                .get_by_id(ResourceKind::Devices, peer_device.id())
                .await?
                .and_then(|full| full.role_slug())
                .ok_or_else(|| Error::RoleUnresolved {
                    device: link.peer_device.clone(),
                })?,
        };

        let local_is_panel = device_role == PATCH_PANEL_ROLE;
        let peer_is_panel = peer_role == PATCH_PANEL_ROLE;
        let peer_kind = TerminationKind::infer_peer(local_is_panel, peer_is_panel);

        let peer_port = self
            .client
            .get(
                peer_kind.resource_kind(),
                &[
                    ("device_id", peer_device.id().to_string()),
                    ("name", link.peer_port.clone()),
                ],
            )
            .await?
            .ok_or_else(|| Error::PeerPortNotFound {
                device: link.peer_device.clone(),
                port: link.peer_port.clone(),
                kind: peer_kind.resource_kind(),
            })?;

        debug!(
            local = format!("{}:{} ({})", device_name, port_name, local_kind.object_type()),
            peer = format!("{}:{} ({})", link.peer_device, link.peer_port, peer_kind.object_type()),
            "resolved terminations"
        );

        // Local-side idempotency check.
        if let Some(cable_id) = local_port.cable_id() {
            match self.client.get_by_id(ResourceKind::Cables, cable_id).await? {
                None => {
                    info!(cable_id, "existing cable vanished during fetch, skipping idempotency check");
                }
                Some(existing) => {
                    if existing.connects_to(peer_port.id()) {
                        debug!(cable_id, "correct cable already exists");
                        return Ok(());
                    }
                    warn!(cable_id, "local port carries a cable to a different peer");
                    self.remove_managed_cable(&existing, "wrong peer connection")
                        .await?;
                }
            }
        }

        // Peer-side stray check on a fresh fetch.
        match self
            .client
            .get_by_id(peer_kind.resource_kind(), peer_port.id())
            .await
        {
            Ok(Some(fresh_peer)) => {
                if let Some(peer_cable_id) = fresh_peer.cable_id() {
                    if let Some(peer_cable) =
                        self.client.get_by_id(ResourceKind::Cables, peer_cable_id).await?
                    {
                        if peer_kind == TerminationKind::RearPort && peer_is_panel {
                            if peer_cable.connects_to(local_port.id()) {
                                debug!(cable = peer_cable_id, "backbone cable correct, keeping");
                                return Ok(());
                            }
                            warn!(cable = peer_cable_id, "wrong backbone cable on peer rear port");
                            self.remove_managed_cable(&peer_cable, "wrong backbone").await?;
                        } else {
                            warn!(cable = peer_cable_id, "peer port blocked by stray cable");
                            self.remove_managed_cable(&peer_cable, "blocking target port")
                                .await?;
                        }
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "peer port re-fetch failed, proceeding to create");
            }
        }

        self.create_cable(device_name, port_name, local_kind, local_port, peer_kind, &peer_port, link)
            .await;
        Ok(())
    }

    /// Delete a conflicting cable -- but only one we own.
    ///
    /// Unmanaged cables block the link; the caller abandons it for this
    /// pass and a re-run picks it up once an operator intervenes.
    async fn remove_managed_cable(&self, cable: &Record, reason: &str) -> Result<(), Error> {
        if !is_managed(cable, self.tag_id) {
            warn!(cable = cable.id(), reason, "conflicting cable is unmanaged, leaving in place");
            return Err(Error::UnmanagedCable { id: cable.id() });
        }

        if self.dry_run {
            info!(cable = cable.id(), reason, "[dry-run] would delete cable");
            return Ok(());
        }

        self.client.delete(ResourceKind::Cables, cable.id()).await?;
        info!(cable = cable.id(), reason, "deleted cable");
        tokio::time::sleep(WAIT_AFTER_CABLE_DELETE).await;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_cable(
        &self,
        device_name: &str,
        port_name: &str,
        local_kind: TerminationKind,
        local_port: &Record,
        peer_kind: TerminationKind,
        peer_port: &Record,
        link: &LinkSpec,
    ) {
        let mut payload = Map::new();
        payload.insert(
            "a_terminations".into(),
            json!([{ "object_type": local_kind.object_type(), "object_id": local_port.id() }]),
        );
        payload.insert(
            "b_terminations".into(),
            json!([{ "object_type": peer_kind.object_type(), "object_id": peer_port.id() }]),
        );
        payload.insert("status".into(), Value::from("connected"));
        payload.insert(
            "type".into(),
            Value::from(link.cable_type.as_deref().unwrap_or(DEFAULT_CABLE_TYPE)),
        );
        if self.tag_id != 0 {
            payload.insert("tags".into(), Value::from(vec![self.tag_id]));
        }

        let color = normalize_color(link.color.as_deref());
        if !color.is_empty() {
            payload.insert("color".into(), Value::from(color));
        }
        if let Some(length) = link.length {
            payload.insert("length".into(), Value::from(length));
            payload.insert(
                "length_unit".into(),
                Value::from(link.length_unit.as_deref().unwrap_or(DEFAULT_LENGTH_UNIT)),
            );
        }

        if self.dry_run {
            info!(
                local = format!("{device_name}:{port_name}"),
                peer = format!("{}:{}", link.peer_device, link.peer_port),
                "[dry-run] would create cable"
            );
            return;
        }

        match self.client.create(ResourceKind::Cables, &payload).await {
            Ok(cable) => info!(
                cable = cable.id(),
                local = format!("{device_name}:{port_name}"),
                peer = format!("{}:{}", link.peer_device, link.peer_port),
                "cable created"
            ),
            Err(e) => error!(
                local = format!("{device_name}:{port_name}"),
                peer = format!("{}:{}", link.peer_device, link.peer_port),
                error = %e,
                payload = ?payload,
                "failed to create cable"
            ),
        }
    }
}
