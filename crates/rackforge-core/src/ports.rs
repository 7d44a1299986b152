// ── Port, interface, and address reconciliation ──────────────────────
//
// All three port kinds go through the apply primitive keyed by
// (device, name). Front ports resolve their rear-port back-reference
// first; interfaces resolve VLAN names through the reference cache and
// may promote their address to the device's primary IP.

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use rackforge_api::{Record, ResourceKind};

use crate::device::{DeviceReconciler, tag_values};
use crate::model::{AddressRole, DeviceSpec, InterfaceSpec};

impl DeviceReconciler<'_> {
    // ── Rear ports ───────────────────────────────────────────────────

    pub(crate) async fn reconcile_rear_ports(&self, device_id: i64, spec: &DeviceSpec) {
        for port in &spec.rear_ports {
            let mut payload = Map::new();
            payload.insert("device".into(), Value::from(device_id));
            payload.insert("name".into(), Value::from(port.name.clone()));
            payload.insert("type".into(), Value::from(port.r#type.clone()));
            payload.insert("positions".into(), Value::from(port.positions));
            if let Some(label) = &port.label {
                payload.insert("label".into(), Value::from(label.clone()));
            }
            if let Some(description) = &port.description {
                payload.insert("description".into(), Value::from(description.clone()));
            }
            payload.insert("tags".into(), tag_values(&port.tags));

            let lookup = [
                ("device_id", device_id.to_string()),
                ("name", port.name.clone()),
            ];
            self.applier
                .apply(ResourceKind::RearPorts, &lookup, payload)
                .await;
        }
    }

    // ── Front ports ──────────────────────────────────────────────────

    pub(crate) async fn reconcile_front_ports(&self, device_id: i64, spec: &DeviceSpec) {
        for port in &spec.front_ports {
            let mut payload = Map::new();
            payload.insert("device".into(), Value::from(device_id));
            payload.insert("name".into(), Value::from(port.name.clone()));
            payload.insert("type".into(), Value::from(port.r#type.clone()));
            if let Some(label) = &port.label {
                payload.insert("label".into(), Value::from(label.clone()));
            }
            if let Some(description) = &port.description {
                payload.insert("description".into(), Value::from(description.clone()));
            }
            payload.insert("tags".into(), tag_values(&port.tags));

            // The rear-port reference is resolved by name on this device;
            // a miss is a definition problem, not a reason to drop the port.
            match self
                .client
                .get(
                    ResourceKind::RearPorts,
                    &[
                        ("device_id", device_id.to_string()),
                        ("name", port.rear_port.clone()),
                    ],
                )
                .await
            {
                Ok(Some(rear)) => {
                    payload.insert("rear_port".into(), Value::from(rear.id()));
                    payload.insert(
                        "rear_port_position".into(),
                        Value::from(port.rear_port_position),
                    );
                }
                Ok(None) => {
                    warn!(
                        device = spec.name,
                        front_port = port.name,
                        rear_port = port.rear_port,
                        "rear port not found, applying front port without back-reference"
                    );
                }
                Err(e) => {
                    warn!(device = spec.name, front_port = port.name, error = %e, "rear port lookup failed");
                }
            }

            let lookup = [
                ("device_id", device_id.to_string()),
                ("name", port.name.clone()),
            ];
            self.applier
                .apply(ResourceKind::FrontPorts, &lookup, payload)
                .await;
        }
    }

    // ── Interfaces ───────────────────────────────────────────────────

    pub(crate) async fn reconcile_interfaces(&self, device_id: i64, spec: &DeviceSpec) {
        for iface in &spec.interfaces {
            let mut payload = Map::new();
            payload.insert("device".into(), Value::from(device_id));
            payload.insert("name".into(), Value::from(iface.name.clone()));
            payload.insert("type".into(), Value::from(iface.r#type.clone()));
            payload.insert("enabled".into(), Value::from(iface.enabled));
            if let Some(label) = &iface.label {
                payload.insert("label".into(), Value::from(label.clone()));
            }
            if let Some(description) = &iface.description {
                payload.insert("description".into(), Value::from(description.clone()));
            }
            if let Some(mtu) = iface.mtu {
                payload.insert("mtu".into(), Value::from(mtu));
            }
            if let Some(mode) = iface.mode {
                payload.insert("mode".into(), Value::from(mode.as_str()));
            }

            // VLAN names that fail to resolve are silently omitted.
            if let Some(vlan) = &iface.untagged_vlan {
                if let Some(vlan_id) = self.cache.resolve(ResourceKind::Vlans, vlan) {
                    payload.insert("untagged_vlan".into(), Value::from(vlan_id));
                }
            }
            let tagged: Vec<i64> = iface
                .tagged_vlans
                .iter()
                .filter_map(|name| self.cache.resolve(ResourceKind::Vlans, name))
                .collect();
            if !tagged.is_empty() {
                payload.insert("tagged_vlans".into(), Value::from(tagged));
            }

            payload.insert("tags".into(), tag_values(&iface.tags));

            let lookup = [
                ("device_id", device_id.to_string()),
                ("name", iface.name.clone()),
            ];
            let applied = self
                .applier
                .apply(ResourceKind::Interfaces, &lookup, payload)
                .await;

            if let Some(applied) = applied {
                if iface.ip.is_some() && !applied.is_placeholder() {
                    self.reconcile_ip(device_id, &applied, iface).await;
                }
            }
        }
    }

    // ── IP addresses ─────────────────────────────────────────────────

    async fn reconcile_ip(&self, device_id: i64, iface: &Record, iface_spec: &InterfaceSpec) {
        let Some(ip_spec) = &iface_spec.ip else { return };

        let vrf_id = ip_spec
            .vrf
            .as_deref()
            .and_then(|vrf| self.cache.resolve(ResourceKind::Vrfs, vrf));

        let mut payload = Map::new();
        payload.insert("address".into(), Value::from(ip_spec.address.clone()));
        payload.insert("status".into(), Value::from(ip_spec.status.clone()));
        if let Some(dns_name) = &ip_spec.dns_name {
            payload.insert("dns_name".into(), Value::from(dns_name.clone()));
        }
        if let Some(description) = &ip_spec.description {
            payload.insert("description".into(), Value::from(description.clone()));
        }
        if let Some(vrf_id) = vrf_id {
            payload.insert("vrf".into(), Value::from(vrf_id));
        }
        payload.insert("assigned_object_type".into(), Value::from("dcim.interface"));
        payload.insert("assigned_object_id".into(), Value::from(iface.id()));
        payload.insert("tags".into(), tag_values(&ip_spec.tags));

        let mut lookup = vec![("address", ip_spec.address.clone())];
        if let Some(vrf_id) = vrf_id {
            lookup.push(("vrf_id", vrf_id.to_string()));
        }

        let applied = self
            .applier
            .apply(ResourceKind::IpAddresses, &lookup, payload)
            .await;

        if let Some(ip) = applied {
            if iface_spec.address_role == AddressRole::Primary && !ip.is_placeholder() {
                self.set_primary_ip(device_id, ip.id()).await;
            }
        }
    }

    /// Point the device's primary-IP field (v4 or v6, by address family)
    /// at this address, skipping the write when already current.
    async fn set_primary_ip(&self, device_id: i64, ip_id: i64) {
        let ip = match self.client.get_by_id(ResourceKind::IpAddresses, ip_id).await {
            Ok(Some(ip)) => ip,
            Ok(None) => {
                warn!(ip_id, "address vanished before primary-IP assignment");
                return;
            }
            Err(e) => {
                error!(ip_id, error = %e, "address fetch failed");
                return;
            }
        };
        let family = ip
            .choice_value("family")
            .and_then(|v| v.as_i64())
            .unwrap_or(4);
        let field = if family == 6 { "primary_ip6" } else { "primary_ip4" };

        let device = match self.client.get_by_id(ResourceKind::Devices, device_id).await {
            Ok(Some(device)) => device,
            Ok(None) => return,
            Err(e) => {
                error!(device_id, error = %e, "device fetch failed");
                return;
            }
        };

        if device.relation(field).map(|r| r.id()) == Some(ip_id) {
            debug!(device = device.identity(), field, "primary IP already current");
            return;
        }

        if self.dry_run {
            info!(device = device.identity(), field, ip_id, "[dry-run] would set primary IP");
            return;
        }

        let mut partial = Map::new();
        partial.insert(field.into(), Value::from(ip_id));
        match self
            .client
            .update(ResourceKind::Devices, device_id, &partial)
            .await
        {
            Ok(_) => info!(device = device.identity(), field, ip_id, "set primary IP"),
            Err(e) => error!(device = device.identity(), error = %e, "failed to set primary IP"),
        }
    }
}
