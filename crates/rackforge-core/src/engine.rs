// ── Run orchestration ────────────────────────────────────────────────
//
// Fixed phase order: ownership tag, then reference caches (global once,
// then per distinct site), then one device at a time in input order.
// A device failure skips the rest of that device only; re-running the
// batch is the recovery path, idempotence makes that safe.

use std::collections::BTreeSet;

use tracing::{error, info};

use rackforge_api::NetBoxClient;

use crate::cache::ReferenceCache;
use crate::device::DeviceReconciler;
use crate::model::DeviceSpec;
use crate::tag::ensure_managed_tag;

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub dry_run: bool,
}

/// Sequential reconciliation driver for a batch of devices.
pub struct Engine<'a> {
    client: &'a NetBoxClient,
    dry_run: bool,
}

impl<'a> Engine<'a> {
    pub fn new(client: &'a NetBoxClient, dry_run: bool) -> Self {
        Self { client, dry_run }
    }

    /// Reconcile the whole batch. Never aborts on per-device errors.
    pub async fn run(&self, devices: &[DeviceSpec]) -> RunSummary {
        let tag_id = ensure_managed_tag(self.client, self.dry_run).await;

        let mut cache = ReferenceCache::default();
        cache.load_global(self.client).await;

        let sites: BTreeSet<&str> = devices.iter().map(|d| d.site_slug.as_str()).collect();
        for site in sites {
            cache.load_site(self.client, site).await;
        }

        let reconciler = DeviceReconciler::new(self.client, &cache, tag_id, self.dry_run);
        let mut summary = RunSummary {
            total: devices.len(),
            succeeded: 0,
            failed: 0,
            dry_run: self.dry_run,
        };

        for (idx, spec) in devices.iter().enumerate() {
            info!(
                device = spec.name,
                progress = format!("{}/{}", idx + 1, devices.len()),
                "reconciling device"
            );
            match reconciler.reconcile(spec).await {
                Ok(()) => summary.succeeded += 1,
                Err(e) => {
                    error!(device = spec.name, error = %e, "device reconciliation failed");
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}
