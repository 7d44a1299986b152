// ── Ownership tag authority ──────────────────────────────────────────
//
// A single marker tag is the sole criterion for "do we own this object".
// Its id is handed to every downstream component; id 0 means tagging is
// unavailable (dry-run, or the backend refused) and callers must skip
// tag injection rather than fail.

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use rackforge_api::{NetBoxClient, Record, ResourceKind};

/// Slug of the marker tag; also honored when only the slug is visible.
pub const MANAGED_TAG_SLUG: &str = "gitops";
const MANAGED_TAG_NAME: &str = "GitOps Managed";
const MANAGED_TAG_COLOR: &str = "00bcd4";
const MANAGED_TAG_DESCRIPTION: &str = "Automatically managed by rackforge";

/// Ensure the marker tag exists and return its id.
///
/// Races with concurrent creators are tolerated: a uniqueness conflict on
/// create triggers exactly one re-fetch by slug. Any other failure yields
/// the sentinel id 0.
pub async fn ensure_managed_tag(client: &NetBoxClient, dry_run: bool) -> i64 {
    if dry_run {
        return 0;
    }

    let lookup = [("slug", MANAGED_TAG_SLUG.to_owned())];
    match client.get(ResourceKind::Tags, &lookup).await {
        Ok(Some(tag)) => return tag.id(),
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "managed tag lookup failed, tagging disabled for this run");
            return 0;
        }
    }

    let mut payload = Map::new();
    payload.insert("name".into(), Value::from(MANAGED_TAG_NAME));
    payload.insert("slug".into(), Value::from(MANAGED_TAG_SLUG));
    payload.insert("color".into(), Value::from(MANAGED_TAG_COLOR));
    payload.insert("description".into(), Value::from(MANAGED_TAG_DESCRIPTION));

    match client.create(ResourceKind::Tags, &payload).await {
        Ok(tag) => {
            info!(slug = MANAGED_TAG_SLUG, id = tag.id(), "created managed tag");
            tag.id()
        }
        Err(e) if e.is_conflict() => {
            // Another writer won the race; their tag is just as good.
            warn!(error = %e, "managed tag creation raced, re-fetching");
            match client.get(ResourceKind::Tags, &lookup).await {
                Ok(Some(tag)) => tag.id(),
                _ => 0,
            }
        }
        Err(e) => {
            error!(error = %e, "managed tag creation failed, tagging disabled for this run");
            0
        }
    }
}

/// Whether an object carries the marker tag (by id or by slug).
pub fn is_managed(record: &Record, tag_id: i64) -> bool {
    if tag_id != 0 && record.tag_ids().contains(&tag_id) {
        return true;
    }
    record.tag_slugs().contains(MANAGED_TAG_SLUG)
}
