// ── Reference cache ──────────────────────────────────────────────────
//
// Eager, load-once lookup of reference resources to backend ids.
// `load_global`/`load_site` take `&mut self`; everything afterwards reads
// through `&self`, so the borrow checker enforces the frozen-after-load
// contract -- no interior mutability, no invalidation mid-run.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use rackforge_api::{NetBoxClient, Record, ResourceKind};

/// How many known keys to include in a lookup-miss diagnostic.
const MISS_SAMPLE: usize = 5;

/// Slug/name/model → id maps for reference resources.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    maps: HashMap<ResourceKind, IndexMap<String, i64>>,
}

impl ReferenceCache {
    /// Load all global (non-site-scoped) reference kinds.
    ///
    /// A kind that fails to load yields an empty map and future misses;
    /// it never aborts the load as a whole.
    pub async fn load_global(&mut self, client: &NetBoxClient) {
        info!("loading global reference caches");
        for kind in [
            ResourceKind::DeviceTypes,
            ResourceKind::ModuleTypes,
            ResourceKind::DeviceRoles,
            ResourceKind::Manufacturers,
            ResourceKind::Sites,
            ResourceKind::Vrfs,
        ] {
            self.load_kind(client, kind, &[]).await;
        }
    }

    /// Load site-scoped reference kinds (VLANs, racks) for one site.
    ///
    /// The site itself is resolved by slug first, then by name.
    pub async fn load_site(&mut self, client: &NetBoxClient, site_key: &str) {
        info!(site = site_key, "loading site reference caches");

        let site = match client
            .get(ResourceKind::Sites, &[("slug", site_key.to_owned())])
            .await
        {
            Ok(Some(site)) => Some(site),
            Ok(None) => {
                debug!(site = site_key, "site slug not found, trying name");
                client
                    .get(ResourceKind::Sites, &[("name", site_key.to_owned())])
                    .await
                    .ok()
                    .flatten()
            }
            Err(e) => {
                warn!(site = site_key, error = %e, "site lookup failed");
                None
            }
        };

        let Some(site) = site else {
            warn!(site = site_key, "site not found, skipping site caches");
            return;
        };

        let site_id = site.id().to_string();
        self.load_kind(client, ResourceKind::Vlans, &[("site_id", site_id.clone())])
            .await;
        self.load_kind(client, ResourceKind::Racks, &[("site_id", site_id)])
            .await;

        if self.maps.get(&ResourceKind::Racks).is_none_or(IndexMap::is_empty) {
            warn!(site = site_key, "no racks found for site");
        }
    }

    async fn load_kind(
        &mut self,
        client: &NetBoxClient,
        kind: ResourceKind,
        params: &[(&str, String)],
    ) {
        let map = self.maps.entry(kind).or_default();
        match client.filter(kind, params).await {
            Ok(items) => {
                for item in &items {
                    index_record(map, item);
                }
                debug!(%kind, keys = map.len(), "reference kind loaded");
            }
            Err(e) => {
                warn!(%kind, error = %e, "failed to load reference kind, lookups will miss");
            }
        }
    }

    /// Resolve a key (slug, name, or model) to a backend id.
    ///
    /// Misses on device/module types get a diagnostic with a sample of
    /// known keys, since those misses usually mean a definition typo.
    pub fn resolve(&self, kind: ResourceKind, key: &str) -> Option<i64> {
        if key.is_empty() {
            return None;
        }

        let map = self.maps.get(&kind);
        let found = map.and_then(|m| m.get(key)).copied();

        if found.is_none()
            && matches!(kind, ResourceKind::ModuleTypes | ResourceKind::DeviceTypes)
        {
            warn!(%kind, key, "reference lookup miss");
            if let Some(map) = map {
                let sample: Vec<&str> = map.keys().take(MISS_SAMPLE).map(String::as_str).collect();
                debug!(%kind, ?sample, "known keys");
            }
        }

        found
    }
}

/// Index one object under every identity key it exposes.
///
/// A single object may be reachable by slug, name, model, label, and
/// display; ids only, never whole objects.
fn index_record(map: &mut IndexMap<String, i64>, record: &Record) {
    let id = record.id();
    for key_field in ["slug", "name", "model", "label", "display"] {
        if let Some(key) = record.str_field(key_field) {
            if !key.is_empty() {
                map.insert(key.to_owned(), id);
            }
        }
    }
}
