// ── Backend object model ─────────────────────────────────────────────
//
// NetBox serializes relations three different ways depending on version
// and depth: a bare integer id, a nested object, or (for choice fields)
// a {value, label} pair. `RelationRef`, `TagRef`, and `ChoiceRef` make
// those shapes explicit variants instead of runtime shape-probing.
//
// `Record` itself is the raw object map with typed accessors on top --
// the reconciler reads relations and tags through the typed layer and
// the apply diff walks the raw fields directly.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Reference shapes ────────────────────────────────────────────────

/// A foreign-key reference: either a bare id or a nested object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationRef {
    Id(i64),
    Object {
        id: i64,
        #[serde(default)]
        slug: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        display: Option<String>,
    },
}

impl RelationRef {
    pub fn id(&self) -> i64 {
        match self {
            Self::Id(id) | Self::Object { id, .. } => *id,
        }
    }

    pub fn slug(&self) -> Option<&str> {
        match self {
            Self::Id(_) => None,
            Self::Object { slug, .. } => slug.as_deref(),
        }
    }
}

/// A tag reference: bare id, or an object that may carry id and/or slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagRef {
    Id(i64),
    Object {
        #[serde(default)]
        id: Option<i64>,
        #[serde(default)]
        slug: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
}

impl TagRef {
    pub fn id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Object { id, .. } => *id,
        }
    }

    pub fn slug(&self) -> Option<&str> {
        match self {
            Self::Id(_) => None,
            Self::Object { slug, .. } => slug.as_deref(),
        }
    }
}

/// An enumerated/choice field: bare value or a {value, label} pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceRef {
    Pair {
        value: Value,
        #[serde(default)]
        label: Option<String>,
    },
    Bare(Value),
}

impl ChoiceRef {
    /// The underlying comparison value, ignoring any display label.
    pub fn value(&self) -> &Value {
        match self {
            Self::Pair { value, .. } | Self::Bare(value) => value,
        }
    }
}

/// One endpoint of a cable: (object kind, object id).
///
/// Older serializers emit `id` instead of `object_id`; both are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Termination {
    pub object_type: String,
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub id: Option<i64>,
}

impl Termination {
    pub fn target_id(&self) -> Option<i64> {
        self.object_id.or(self.id)
    }
}

// ── Record ──────────────────────────────────────────────────────────

/// A single backend object of any kind.
///
/// Identity is always the backend-assigned integer `id`; an id of 0
/// marks a dry-run placeholder that must never be written back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Placeholder returned for simulated creations (id 0).
    pub fn placeholder(name: Option<&str>) -> Self {
        let mut fields = Map::new();
        fields.insert("id".into(), Value::from(0));
        if let Some(name) = name {
            fields.insert("name".into(), Value::from(name));
        }
        Self(fields)
    }

    pub fn id(&self) -> i64 {
        self.0.get("id").and_then(Value::as_i64).unwrap_or(0)
    }

    /// True for dry-run placeholders that have no backend identity.
    pub fn is_placeholder(&self) -> bool {
        self.id() == 0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    pub fn slug(&self) -> Option<&str> {
        self.str_field("slug")
    }

    /// Best human-readable identity for log lines.
    pub fn identity(&self) -> &str {
        self.name()
            .or_else(|| self.str_field("model"))
            .or_else(|| self.str_field("display"))
            .unwrap_or("<unnamed>")
    }

    /// Parse a field as a foreign-key reference, whatever its shape.
    pub fn relation(&self, key: &str) -> Option<RelationRef> {
        let value = self.0.get(key)?;
        if value.is_null() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Device role, trying the `role` field first and falling back to the
    /// `device_role` name older serializers use.
    pub fn role(&self) -> Option<RelationRef> {
        self.relation("role").or_else(|| self.relation("device_role"))
    }

    pub fn role_slug(&self) -> Option<String> {
        self.role().and_then(|r| r.slug().map(str::to_owned))
    }

    pub fn tags(&self) -> Vec<TagRef> {
        self.0
            .get("tags")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn tag_ids(&self) -> HashSet<i64> {
        self.tags().iter().filter_map(TagRef::id).collect()
    }

    pub fn tag_slugs(&self) -> HashSet<String> {
        self.tags()
            .iter()
            .filter_map(|t| t.slug().map(str::to_owned))
            .collect()
    }

    /// Id of the cable occupying this port, if any.
    pub fn cable_id(&self) -> Option<i64> {
        self.relation("cable").map(|r| r.id())
    }

    /// All terminations of a cable object, A-side then B-side.
    pub fn terminations(&self) -> Vec<Termination> {
        let mut out = Vec::new();
        for side in ["a_terminations", "b_terminations"] {
            if let Some(list) = self.0.get(side) {
                if let Ok(mut terms) = serde_json::from_value::<Vec<Termination>>(list.clone()) {
                    out.append(&mut terms);
                }
            }
        }
        out
    }

    /// Whether any termination of this cable lands on `object_id`.
    pub fn connects_to(&self, object_id: i64) -> bool {
        self.terminations()
            .iter()
            .any(|t| t.target_id() == Some(object_id))
    }

    /// Unwrap a choice field to its underlying value.
    pub fn choice_value(&self, key: &str) -> Option<Value> {
        let value = self.0.get(key)?;
        if value.is_null() {
            return None;
        }
        serde_json::from_value::<ChoiceRef>(value.clone())
            .ok()
            .map(|c| c.value().clone())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use serde_json::json;

    use super::Record;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn relation_accepts_bare_id_and_object() {
        let rec = record(json!({"id": 1, "rack": 42, "site": {"id": 7, "slug": "fra1"}}));
        assert_eq!(rec.relation("rack").unwrap().id(), 42);
        let site = rec.relation("site").unwrap();
        assert_eq!(site.id(), 7);
        assert_eq!(site.slug(), Some("fra1"));
    }

    #[test]
    fn role_falls_back_to_device_role() {
        let rec = record(json!({"id": 1, "device_role": {"id": 3, "slug": "patch-panel"}}));
        assert_eq!(rec.role_slug().as_deref(), Some("patch-panel"));

        let rec = record(json!({"id": 1, "role": {"id": 4, "slug": "leaf"}}));
        assert_eq!(rec.role_slug().as_deref(), Some("leaf"));
    }

    #[test]
    fn tags_mix_ids_and_objects() {
        let rec = record(json!({"id": 1, "tags": [5, {"id": 9, "slug": "gitops"}]}));
        assert_eq!(rec.tag_ids(), [5, 9].into_iter().collect());
        assert!(rec.tag_slugs().contains("gitops"));
    }

    #[test]
    fn terminations_accept_legacy_id_key() {
        let rec = record(json!({
            "id": 10,
            "a_terminations": [{"object_type": "dcim.interface", "object_id": 100}],
            "b_terminations": [{"object_type": "dcim.rearport", "id": 200}],
        }));
        assert!(rec.connects_to(100));
        assert!(rec.connects_to(200));
        assert!(!rec.connects_to(300));
    }

    #[test]
    fn choice_value_unwraps_pairs() {
        let rec = record(json!({"id": 1, "status": {"value": "active", "label": "Active"}, "face": "front"}));
        assert_eq!(rec.choice_value("status"), Some(json!("active")));
        assert_eq!(rec.choice_value("face"), Some(json!("front")));
    }

    #[test]
    fn placeholder_has_zero_id() {
        let rec = Record::placeholder(Some("sw-01"));
        assert!(rec.is_placeholder());
        assert_eq!(rec.name(), Some("sw-01"));
    }
}
