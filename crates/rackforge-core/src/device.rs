// ── Device reconciliation ────────────────────────────────────────────
//
// Placement state machine (UNPLACED → RACKED | BAYED), device-bay
// self-healing from type templates, and module reconciliation. The
// bay-centric install is two-phase by backend decree: a device cannot
// hold rack coordinates while occupying a bay, so it is floated first
// and the *bay* object is updated to point at it.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use rackforge_api::{NetBoxClient, Record, ResourceKind};

use crate::apply::Applier;
use crate::cable::CableReconciler;
use crate::cache::ReferenceCache;
use crate::error::Error;
use crate::model::{DeviceSpec, ModuleSpec, Placement, TagEntry};

/// Settling delay after a module deletion, for backend-side cleanup.
const WAIT_AFTER_MODULE_DELETE: Duration = Duration::from_millis(100);

/// Reconciles one device and everything hanging off it.
pub struct DeviceReconciler<'a> {
    pub(crate) client: &'a NetBoxClient,
    pub(crate) cache: &'a ReferenceCache,
    pub(crate) applier: Applier<'a>,
    pub(crate) dry_run: bool,
}

/// Convert desired tag entries into a JSON tag list.
///
/// Slugs survive into the payload but the apply primitive keeps only
/// numeric ids; unresolved slugs never reach the backend.
pub(crate) fn tag_values(tags: &[TagEntry]) -> Value {
    Value::Array(
        tags.iter()
            .map(|t| match t {
                TagEntry::Id(id) => Value::from(*id),
                TagEntry::Slug(slug) => Value::from(slug.clone()),
            })
            .collect(),
    )
}

impl<'a> DeviceReconciler<'a> {
    pub fn new(
        client: &'a NetBoxClient,
        cache: &'a ReferenceCache,
        tag_id: i64,
        dry_run: bool,
    ) -> Self {
        Self {
            client,
            cache,
            applier: Applier::new(client, tag_id, dry_run),
            dry_run,
        }
    }

    /// Reconcile one device: placement, bays, ports, addresses, modules,
    /// then cables. Any error aborts the rest of *this* device only.
    pub async fn reconcile(&self, spec: &DeviceSpec) -> Result<(), Error> {
        let site_id = self.resolve(ResourceKind::Sites, &spec.site_slug)?;
        let role_id = self.resolve(ResourceKind::DeviceRoles, &spec.role_slug)?;
        let type_id = self.resolve(ResourceKind::DeviceTypes, &spec.device_type_slug)?;

        if spec.placement_conflict() {
            warn!(
                device = spec.name,
                rack = spec.rack_slug.as_deref().unwrap_or(""),
                parent = spec.parent_device.as_deref().unwrap_or(""),
                "both rack and chassis placement declared; chassis placement wins"
            );
        }
        let placement = spec.placement();

        // Resolve the target bay up front; a missing parent or bay fails
        // the whole device before anything is written.
        let target_bay = match placement {
            Placement::Bayed { parent, bay } => Some(self.resolve_bay(parent, bay).await?),
            _ => None,
        };

        let mut payload = Map::new();
        payload.insert("name".into(), Value::from(spec.name.clone()));
        payload.insert("site".into(), Value::from(site_id));
        payload.insert("role".into(), Value::from(role_id));
        payload.insert("device_type".into(), Value::from(type_id));
        payload.insert("status".into(), Value::from(spec.status.clone()));
        if let Some(serial) = &spec.serial {
            payload.insert("serial".into(), Value::from(serial.clone()));
        }
        if let Some(asset_tag) = &spec.asset_tag {
            payload.insert("asset_tag".into(), Value::from(asset_tag.clone()));
        }
        payload.insert("tags".into(), tag_values(&spec.tags));

        // Rack coordinates only for racked devices; a bayed device is
        // created floating so the row is valid independent of bay state.
        if let Placement::Racked { rack_slug } = placement {
            match self.cache.resolve(ResourceKind::Racks, rack_slug) {
                Some(rack_id) => {
                    payload.insert("rack".into(), Value::from(rack_id));
                    if let Some(position) = spec.position {
                        payload.insert("position".into(), Value::from(position));
                    }
                    payload.insert("face".into(), Value::from(spec.face.as_str()));
                }
                None => {
                    warn!(device = spec.name, rack = rack_slug, "rack not found, creating without placement");
                }
            }
        }

        let lookup = [
            ("name", spec.name.clone()),
            ("site_id", site_id.to_string()),
        ];
        let device = self
            .applier
            .apply(ResourceKind::Devices, &lookup, payload)
            .await
            .ok_or(Error::ApplyFailed {
                kind: ResourceKind::Devices,
                name: spec.name.clone(),
            })?;

        if device.is_placeholder() {
            debug!(device = spec.name, "simulated creation, skipping component reconciliation");
            return Ok(());
        }

        match (&target_bay, placement) {
            (Some(bay), _) => self.install_into_bay(&device, bay, spec).await?,
            (None, Placement::Floating) => self.clear_rack_placement(&device).await?,
            _ => {}
        }

        self.heal_device_bays(&device).await;
        self.reconcile_rear_ports(device.id(), spec).await;
        self.reconcile_front_ports(device.id(), spec).await;
        self.reconcile_interfaces(device.id(), spec).await;
        self.reconcile_modules(device.id(), spec).await;

        CableReconciler::new(self.client, self.applier.tag_id(), self.dry_run)
            .reconcile_device_cables(&device, spec)
            .await;

        Ok(())
    }

    fn resolve(&self, kind: ResourceKind, key: &str) -> Result<i64, Error> {
        self.cache
            .resolve(kind, key)
            .ok_or_else(|| Error::MissingReference {
                kind,
                key: key.to_owned(),
            })
    }

    async fn resolve_bay(&self, parent: &str, bay: &str) -> Result<Record, Error> {
        let parent_device = self
            .client
            .get(ResourceKind::Devices, &[("name", parent.to_owned())])
            .await?
            .ok_or_else(|| Error::ParentNotFound {
                name: parent.to_owned(),
            })?;

        self.client
            .get(
                ResourceKind::DeviceBays,
                &[
                    ("device_id", parent_device.id().to_string()),
                    ("name", bay.to_owned()),
                ],
            )
            .await?
            .ok_or_else(|| Error::BayNotFound {
                parent: parent.to_owned(),
                bay: bay.to_owned(),
            })
    }

    // ── Bay-centric installation ─────────────────────────────────────

    /// Two-phase install: float the device (clear its own rack fields),
    /// then point the bay's occupant reference at it. Setting the bay
    /// while the device still carries rack coordinates is rejected by
    /// backend validation, so the order is mandatory.
    async fn install_into_bay(
        &self,
        device: &Record,
        bay: &Record,
        spec: &DeviceSpec,
    ) -> Result<(), Error> {
        let occupant = bay.relation("installed_device").map(|r| r.id());
        if occupant == Some(device.id()) {
            debug!(device = spec.name, bay = bay.identity(), "already in correct device bay");
            return Ok(());
        }
        if let Some(other) = occupant {
            warn!(
                device = spec.name,
                bay = bay.identity(),
                occupant = other,
                "target bay occupied by another device"
            );
        }

        if self.dry_run {
            info!(device = spec.name, bay = bay.identity(), "[dry-run] would install into device bay");
            return Ok(());
        }

        let mut float = Map::new();
        float.insert("rack".into(), Value::Null);
        float.insert("position".into(), Value::Null);
        float.insert("face".into(), Value::Null);
        self.client
            .update(ResourceKind::Devices, device.id(), &float)
            .await?;

        let mut install = Map::new();
        install.insert("installed_device".into(), Value::from(device.id()));
        self.client
            .update(ResourceKind::DeviceBays, bay.id(), &install)
            .await?;

        info!(device = spec.name, bay = bay.identity(), "installed into device bay");
        Ok(())
    }

    /// A placement-less device must not keep stale rack coordinates.
    async fn clear_rack_placement(&self, device: &Record) -> Result<(), Error> {
        let has_rack = device.relation("rack").is_some();
        let has_position = device.get("position").is_some_and(|v| !v.is_null());
        if !has_rack && !has_position {
            return Ok(());
        }

        if self.dry_run {
            info!(device = device.identity(), "[dry-run] would clear rack placement");
            return Ok(());
        }

        let mut clear = Map::new();
        clear.insert("rack".into(), Value::Null);
        clear.insert("position".into(), Value::Null);
        clear.insert("face".into(), Value::Null);
        self.client
            .update(ResourceKind::Devices, device.id(), &clear)
            .await?;
        info!(device = device.identity(), "cleared stale rack placement");
        Ok(())
    }

    // ── Device bay self-healing ──────────────────────────────────────

    /// Create any bay the device's type template mandates but the device
    /// lacks. Devices without bay templates are a silent no-op.
    async fn heal_device_bays(&self, device: &Record) {
        let Some(device_type) = device.relation("device_type") else {
            return;
        };

        let templates = match self
            .client
            .filter(
                ResourceKind::DeviceBayTemplates,
                &[("device_type_id", device_type.id().to_string())],
            )
            .await
        {
            Ok(templates) => templates,
            Err(e) => {
                error!(device = device.identity(), error = %e, "bay template lookup failed");
                return;
            }
        };
        if templates.is_empty() {
            return;
        }

        debug!(
            device = device.identity(),
            templates = templates.len(),
            "checking device bay templates"
        );

        let existing: HashSet<String> = match self
            .client
            .filter(ResourceKind::DeviceBays, &[("device_id", device.id().to_string())])
            .await
        {
            Ok(bays) => bays
                .iter()
                .filter_map(|b| b.name().map(str::to_owned))
                .collect(),
            Err(e) => {
                error!(device = device.identity(), error = %e, "device bay lookup failed");
                return;
            }
        };

        for template in &templates {
            let Some(name) = template.name() else { continue };
            if existing.contains(name) {
                continue;
            }

            warn!(device = device.identity(), bay = name, "missing device bay, creating");
            if self.dry_run {
                info!(device = device.identity(), bay = name, "[dry-run] would create device bay");
                continue;
            }

            let mut payload = Map::new();
            payload.insert("device".into(), Value::from(device.id()));
            payload.insert("name".into(), Value::from(name));
            payload.insert(
                "label".into(),
                Value::from(template.str_field("label").unwrap_or("")),
            );
            match self.client.create(ResourceKind::DeviceBays, &payload).await {
                Ok(_) => info!(device = device.identity(), bay = name, "created device bay"),
                Err(e) => error!(device = device.identity(), bay = name, error = %e, "failed to create device bay"),
            }
        }
    }

    // ── Modules ──────────────────────────────────────────────────────

    /// Reconcile installed modules against bay occupancy.
    ///
    /// Correct installs are adopted (tag added, nothing else touched);
    /// wrong-type modules are replaced; failures abort only their bay.
    async fn reconcile_modules(&self, device_id: i64, spec: &DeviceSpec) {
        if spec.modules.is_empty() {
            return;
        }
        info!(device = spec.name, modules = spec.modules.len(), "reconciling modules");

        let bays = match self
            .client
            .filter(ResourceKind::ModuleBays, &[("device_id", device_id.to_string())])
            .await
        {
            Ok(bays) => bays,
            Err(e) => {
                error!(device = spec.name, error = %e, "module bay lookup failed");
                return;
            }
        };
        let bay_ids: std::collections::HashMap<&str, i64> = bays
            .iter()
            .filter_map(|b| b.name().map(|n| (n, b.id())))
            .collect();

        let installed = match self
            .client
            .filter(ResourceKind::Modules, &[("device_id", device_id.to_string())])
            .await
        {
            Ok(modules) => modules,
            Err(e) => {
                error!(device = spec.name, error = %e, "module lookup failed");
                return;
            }
        };
        let by_bay: std::collections::HashMap<i64, &Record> = installed
            .iter()
            .filter_map(|m| m.relation("module_bay").map(|b| (b.id(), m)))
            .collect();

        for module in &spec.modules {
            let Some(&bay_id) = bay_ids.get(module.name.as_str()) else {
                warn!(device = spec.name, bay = module.name, "module bay not found on device, skipping");
                continue;
            };
            let Some(type_id) = self.cache.resolve(ResourceKind::ModuleTypes, &module.module_type_slug)
            else {
                warn!(
                    device = spec.name,
                    module_type = module.module_type_slug,
                    "module type not found, skipping"
                );
                continue;
            };

            if let Some(existing) = by_bay.get(&bay_id) {
                let existing_type = existing.relation("module_type").map(|t| t.id());
                if existing_type == Some(type_id) {
                    debug!(device = spec.name, bay = module.name, "correct module already installed");
                    self.adopt_module(existing, &module.name).await;
                    continue;
                }

                warn!(device = spec.name, bay = module.name, "wrong module type installed, replacing");
                if self.dry_run {
                    info!(device = spec.name, bay = module.name, "[dry-run] would delete module");
                    continue;
                }
                if let Err(e) = self.client.delete(ResourceKind::Modules, existing.id()).await {
                    error!(device = spec.name, bay = module.name, error = %e, "module deletion failed, skipping bay");
                    continue;
                }
                tokio::time::sleep(WAIT_AFTER_MODULE_DELETE).await;
            }

            self.install_module(device_id, bay_id, type_id, module, &spec.name)
                .await;
        }
    }

    /// Add the ownership tag to a correct install that lacks it; every
    /// other field stays untouched.
    async fn adopt_module(&self, existing: &Record, bay_name: &str) {
        let tag_id = self.applier.tag_id();
        if tag_id == 0 || existing.tag_ids().contains(&tag_id) {
            return;
        }

        warn!(bay = bay_name, "existing module missing ownership tag, adopting");
        if self.dry_run {
            info!(bay = bay_name, "[dry-run] would tag existing module");
            return;
        }

        let mut tags: Vec<i64> = existing.tag_ids().into_iter().collect();
        tags.push(tag_id);
        let mut partial = Map::new();
        partial.insert("tags".into(), Value::from(tags));
        match self
            .client
            .update(ResourceKind::Modules, existing.id(), &partial)
            .await
        {
            Ok(_) => info!(bay = bay_name, "adopted existing module"),
            Err(e) => error!(bay = bay_name, error = %e, "failed to tag existing module"),
        }
    }

    async fn install_module(
        &self,
        device_id: i64,
        bay_id: i64,
        type_id: i64,
        module: &ModuleSpec,
        device_name: &str,
    ) {
        // Description falls back to the module type's own.
        let description = match &module.description {
            Some(description) => description.clone(),
            None => self
                .client
                .get_by_id(ResourceKind::ModuleTypes, type_id)
                .await
                .ok()
                .flatten()
                .and_then(|mt| mt.str_field("description").map(str::to_owned))
                .unwrap_or_default(),
        };

        let mut payload = Map::new();
        payload.insert("device".into(), Value::from(device_id));
        payload.insert("module_bay".into(), Value::from(bay_id));
        payload.insert("module_type".into(), Value::from(type_id));
        payload.insert("status".into(), Value::from(module.status.clone()));
        payload.insert("description".into(), Value::from(description));
        payload.insert(
            "serial".into(),
            Value::from(module.serial.clone().unwrap_or_default()),
        );
        if let Some(asset_tag) = &module.asset_tag {
            payload.insert("asset_tag".into(), Value::from(asset_tag.clone()));
        }
        if self.applier.tag_id() != 0 {
            payload.insert("tags".into(), Value::from(vec![self.applier.tag_id()]));
        }

        if self.dry_run {
            info!(
                device = device_name,
                bay = module.name,
                module_type = module.module_type_slug,
                "[dry-run] would install module"
            );
            return;
        }

        match self.client.create(ResourceKind::Modules, &payload).await {
            Ok(_) => info!(
                device = device_name,
                bay = module.name,
                module_type = module.module_type_slug,
                "module installed"
            ),
            Err(e) => error!(
                device = device_name,
                bay = module.name,
                error = %e,
                payload = ?payload,
                "failed to install module"
            ),
        }
    }
}
