// ── Idempotent apply primitive ───────────────────────────────────────
//
// find-or-create plus field-level diff. Every desired object in the
// system flows through `Applier::apply`; it owns tag injection, the
// dry-run trace, and the rule that backend errors degrade to the
// best-known object instead of aborting the run.

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use rackforge_api::{NetBoxClient, Record, ResourceKind};

/// Find-or-create-or-update executor bound to one backend and one run.
pub struct Applier<'a> {
    client: &'a NetBoxClient,
    tag_id: i64,
    dry_run: bool,
}

impl<'a> Applier<'a> {
    pub fn new(client: &'a NetBoxClient, tag_id: i64, dry_run: bool) -> Self {
        Self {
            client,
            tag_id,
            dry_run,
        }
    }

    pub fn client(&self) -> &'a NetBoxClient {
        self.client
    }

    pub fn tag_id(&self) -> i64 {
        self.tag_id
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Bring one object into the desired state.
    ///
    /// Returns the created/updated/existing object, or `None` when the
    /// object could not be found *or* created. Never propagates backend
    /// errors -- they are logged with context and absorbed here.
    pub async fn apply(
        &self,
        kind: ResourceKind,
        lookup: &[(&str, String)],
        mut payload: Map<String, Value>,
    ) -> Option<Record> {
        let matches = match self.client.filter(kind, lookup).await {
            Ok(matches) => matches,
            Err(e) => {
                error!(%kind, ?lookup, error = %e, "lookup failed");
                return None;
            }
        };

        if matches.len() > 1 {
            // Desired state assumes uniqueness; first match wins.
            warn!(%kind, ?lookup, count = matches.len(), "multiple matches for unique lookup");
        }
        let existing = matches.into_iter().next();

        self.normalize_tags(kind, &mut payload);

        let Some(existing) = existing else {
            return self.create(kind, lookup, payload).await;
        };

        let changes = diff_fields(&existing, &payload);
        if changes.is_empty() {
            debug!(%kind, ?lookup, "in sync");
            return Some(existing);
        }

        if self.dry_run {
            info!(
                %kind, ?lookup, fields = ?changes.keys().collect::<Vec<_>>(),
                "[dry-run] would update"
            );
            return Some(existing);
        }

        match self.client.update(kind, existing.id(), &changes).await {
            Ok(updated) => {
                info!(%kind, id = updated.id(), fields = ?changes.keys().collect::<Vec<_>>(), "updated");
                Some(updated)
            }
            Err(e) => {
                error!(%kind, id = existing.id(), error = %e, "update failed");
                Some(existing)
            }
        }
    }

    async fn create(
        &self,
        kind: ResourceKind,
        lookup: &[(&str, String)],
        payload: Map<String, Value>,
    ) -> Option<Record> {
        if self.dry_run {
            info!(%kind, ?lookup, "[dry-run] would create");
            let name = payload.get("name").and_then(Value::as_str);
            return Some(Record::placeholder(name));
        }

        match self.client.create(kind, &payload).await {
            Ok(created) => {
                info!(%kind, id = created.id(), name = created.identity(), "created");
                Some(created)
            }
            Err(e) => {
                error!(%kind, ?lookup, error = %e, payload = ?payload, "create failed");
                None
            }
        }
    }

    /// Keep only numeric tag ids and append the ownership tag.
    ///
    /// Kinds without tag support get the field stripped entirely; a tag
    /// id of 0 means tagging is unavailable and nothing is injected.
    fn normalize_tags(&self, kind: ResourceKind, payload: &mut Map<String, Value>) {
        if !kind.supports_tags() {
            payload.remove("tags");
            return;
        }

        let mut ids: Vec<i64> = payload
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();

        if self.tag_id != 0 && !ids.contains(&self.tag_id) {
            ids.push(self.tag_id);
        }

        if ids.is_empty() && !payload.contains_key("tags") {
            return;
        }
        payload.insert("tags".into(), Value::from(ids));
    }
}

// ── Field diff ──────────────────────────────────────────────────────

/// Compute the minimal update payload for an existing object.
///
/// Rules:
/// - `null` desired values are skipped (absence means "don't care")
/// - a `foo_id` key falls back to the live `foo` field
/// - tag lists compare as id-sets
/// - a desired integer against a live nested object compares by its id;
///   integer lists likewise compare as id-sets
/// - live `{value, label}` choice fields compare by `value`
/// - empty string and `null` are equivalent
/// - plain strings compare case-insensitively
pub fn diff_fields(existing: &Record, desired: &Map<String, Value>) -> Map<String, Value> {
    let mut changes = Map::new();

    for (key, desired_value) in desired {
        if desired_value.is_null() {
            continue;
        }

        // Filter-style keys (`site_id`) map onto the relation field.
        let live_key = if existing.get(key).is_none() && key.ends_with("_id") {
            key.trim_end_matches("_id")
        } else {
            key.as_str()
        };

        if key == "tags" {
            let current: std::collections::HashSet<i64> =
                existing.tag_ids().into_iter().collect();
            let wanted: std::collections::HashSet<i64> = desired_value
                .as_array()
                .map(|tags| tags.iter().filter_map(Value::as_i64).collect())
                .unwrap_or_default();
            if current != wanted {
                changes.insert(key.clone(), desired_value.clone());
            }
            continue;
        }

        let current = existing.get(live_key).cloned().unwrap_or(Value::Null);

        if !values_equal(&current, desired_value) {
            changes.insert(key.clone(), desired_value.clone());
        }
    }

    changes
}

fn values_equal(current: &Value, desired: &Value) -> bool {
    // Foreign key: desired id vs live nested object.
    if desired.is_number() {
        if let Some(id) = current.get("id") {
            return numbers_equal(id, desired);
        }
    }

    // Id list: desired [ids] vs live list of nested objects.
    if let (Value::Array(wanted), Value::Array(live)) = (desired, current) {
        if wanted.iter().all(Value::is_number) {
            let live_ids: Vec<Option<i64>> = live
                .iter()
                .map(|v| v.as_i64().or_else(|| v.get("id").and_then(Value::as_i64)))
                .collect();
            let wanted_ids: Vec<Option<i64>> = wanted.iter().map(Value::as_i64).collect();
            let to_set = |ids: &[Option<i64>]| {
                ids.iter()
                    .copied()
                    .collect::<std::collections::HashSet<_>>()
            };
            return to_set(&live_ids) == to_set(&wanted_ids);
        }
    }

    // Choice field: live {value, label} compares by value.
    let current = match current.get("value") {
        Some(value) if current.get("id").is_none() => value,
        _ => current,
    };

    // Empty string and null are the same absence.
    if current.is_null() && desired.as_str() == Some("") {
        return true;
    }

    match (current, desired) {
        (Value::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b),
        (a, b) if a.is_number() && b.is_number() => numbers_equal(a, b),
        // Decimal fields may come back as strings ("12.0").
        (Value::String(a), b) if b.is_number() => {
            a.parse::<f64>().is_ok_and(|a| Some(a) == b.as_f64())
        }
        (a, b) => a == b,
    }
}

fn numbers_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use serde_json::{Map, Value, json};

    use super::diff_fields;
    use rackforge_api::Record;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn identical_payload_yields_no_changes() {
        let existing = record(json!({
            "id": 1, "name": "sw-01",
            "status": {"value": "active", "label": "Active"},
            "site": {"id": 3, "slug": "fra1"},
            "tags": [{"id": 7, "slug": "gitops"}],
        }));
        let desired = payload(json!({
            "name": "sw-01", "status": "active", "site": 3, "tags": [7],
        }));
        assert_eq!(diff_fields(&existing, &desired), Map::new());
    }

    #[test]
    fn tag_sets_compare_by_id_not_order() {
        let existing = record(json!({"id": 1, "tags": [{"id": 2}, {"id": 7}]}));
        let same = payload(json!({"tags": [7, 2]}));
        assert!(diff_fields(&existing, &same).is_empty());

        let different = payload(json!({"tags": [7]}));
        assert_eq!(diff_fields(&existing, &different).len(), 1);
    }

    #[test]
    fn foreign_keys_resolve_against_live_relation() {
        let existing = record(json!({"id": 1, "rack": {"id": 42, "name": "R01"}}));
        assert!(diff_fields(&existing, &payload(json!({"rack": 42}))).is_empty());
        assert!(!diff_fields(&existing, &payload(json!({"rack": 43}))).is_empty());
    }

    #[test]
    fn id_suffixed_keys_fall_back_to_relation_field() {
        let existing = record(json!({"id": 1, "site": {"id": 3}}));
        assert!(diff_fields(&existing, &payload(json!({"site_id": 3}))).is_empty());
    }

    #[test]
    fn choice_fields_compare_by_value() {
        let existing = record(json!({"id": 1, "face": {"value": "front", "label": "Front"}}));
        assert!(diff_fields(&existing, &payload(json!({"face": "front"}))).is_empty());
        assert!(!diff_fields(&existing, &payload(json!({"face": "rear"}))).is_empty());
    }

    #[test]
    fn empty_string_equals_null() {
        let existing = record(json!({"id": 1, "serial": null}));
        assert!(diff_fields(&existing, &payload(json!({"serial": ""}))).is_empty());
    }

    #[test]
    fn text_compares_case_insensitively() {
        let existing = record(json!({"id": 1, "name": "SW-01"}));
        assert!(diff_fields(&existing, &payload(json!({"name": "sw-01"}))).is_empty());
    }

    #[test]
    fn vlan_id_lists_compare_as_sets() {
        let existing = record(json!({"id": 1, "tagged_vlans": [{"id": 10}, {"id": 20}]}));
        assert!(diff_fields(&existing, &payload(json!({"tagged_vlans": [20, 10]}))).is_empty());
        assert!(!diff_fields(&existing, &payload(json!({"tagged_vlans": [10]}))).is_empty());
    }

    #[test]
    fn decimal_positions_survive_string_serialization() {
        let existing = record(json!({"id": 1, "position": "12.0"}));
        assert!(diff_fields(&existing, &payload(json!({"position": 12}))).is_empty());
    }

    #[test]
    fn null_desired_values_are_ignored() {
        let existing = record(json!({"id": 1, "rack": {"id": 42}}));
        assert!(diff_fields(&existing, &payload(json!({"rack": null}))).is_empty());
    }
}
