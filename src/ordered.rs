//! Insertion-ordered id index
//!
//! JSON mappings do not guarantee order, so the by-id convention pairs
//! every id-indexed mapping with an explicit order list. [`OrderedIndex`]
//! is the one place both halves meet: it holds the entries in a
//! deterministic order and owns the single code path that reconciles a
//! stored order list against the id set.
//!
//! Reconciliation rules: an order list naming an id absent from the map is
//! corrupt (fatal); a list covering fewer ids than the map is stale and
//! the order is regenerated by lexical sort (a defined, deterministic
//! fallback, logged).

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use crate::error::{Error, Result};

/// An id-to-value mapping that remembers its order
#[derive(Debug, Clone, Default)]
pub struct OrderedIndex {
    entries: IndexMap<String, JsonValue>,
}

impl OrderedIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an entry, rejecting duplicate ids
    pub fn insert(&mut self, id: impl Into<String>, value: JsonValue) -> Result<()> {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return Err(Error::Structural(format!(
                "duplicate id {:?} in by-id collection",
                id
            )));
        }
        self.entries.insert(id, value);
        Ok(())
    }

    /// Build from an already-indexed JSON object, preserving its key order
    pub fn from_json_object(obj: Map<String, JsonValue>) -> Self {
        Self {
            entries: obj.into_iter().collect(),
        }
    }

    /// Reorder the entries to match a stored order list
    ///
    /// `context` names the collection in diagnostics (e.g. `otusById`).
    pub fn apply_order(&mut self, order: &[JsonValue], context: &str) -> Result<()> {
        let mut seen: Vec<&str> = Vec::with_capacity(order.len());
        for id in order {
            let id = id.as_str().ok_or_else(|| {
                Error::Structural(format!("non-string id in {} order list", context))
            })?;
            if !self.entries.contains_key(id) {
                return Err(Error::Structural(format!(
                    "{} order list references unknown id {:?}",
                    context, id
                )));
            }
            if !seen.contains(&id) {
                seen.push(id);
            }
        }

        if seen.len() < self.entries.len() {
            warn!(
                context,
                listed = seen.len(),
                present = self.entries.len(),
                "stale order list, regenerating by lexical sort"
            );
            self.entries.sort_keys();
            return Ok(());
        }

        let seen: Vec<String> = seen.into_iter().map(|s| s.to_string()).collect();
        for (position, id) in seen.iter().enumerate() {
            let current = self.entries.get_index_of(id.as_str());
            if let Some(current) = current {
                self.entries.move_index(current, position);
            }
        }
        Ok(())
    }

    /// The ids in current order, as a JSON array value
    pub fn order_json(&self) -> JsonValue {
        JsonValue::Array(
            self.entries
                .keys()
                .map(|id| JsonValue::String(id.clone()))
                .collect(),
        )
    }

    /// Consume the index into a JSON object preserving the current order
    pub fn into_json_object(self) -> Map<String, JsonValue> {
        self.entries.into_iter().collect()
    }

    /// Consume the index into ordered `(id, value)` pairs
    pub fn into_entries(self) -> impl Iterator<Item = (String, JsonValue)> {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index(ids: &[&str]) -> OrderedIndex {
        let mut idx = OrderedIndex::new();
        for id in ids {
            idx.insert(*id, json!({})).unwrap();
        }
        idx
    }

    fn ids(idx: &OrderedIndex) -> Vec<String> {
        idx.entries.keys().cloned().collect()
    }

    #[test]
    fn test_insert_rejects_duplicate() {
        let mut idx = index(&["a"]);
        let err = idx.insert("a", json!({})).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn test_apply_order_reorders() {
        let mut idx = index(&["a", "b", "c"]);
        idx.apply_order(&[json!("c"), json!("a"), json!("b")], "test")
            .unwrap();
        assert_eq!(ids(&idx), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_short_list_falls_back_to_lexical_sort() {
        let mut idx = index(&["b", "c", "a"]);
        idx.apply_order(&[json!("c")], "test").unwrap();
        assert_eq!(ids(&idx), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_list_falls_back_when_entries_exist() {
        let mut idx = index(&["z", "y"]);
        idx.apply_order(&[], "test").unwrap();
        assert_eq!(ids(&idx), vec!["y", "z"]);
    }

    #[test]
    fn test_unknown_id_is_fatal() {
        let mut idx = index(&["a", "b"]);
        let err = idx
            .apply_order(&[json!("a"), json!("ghost")], "test")
            .unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn test_non_string_id_is_fatal() {
        let mut idx = index(&["a"]);
        let err = idx.apply_order(&[json!(5)], "test").unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn test_order_json_reflects_current_order() {
        let idx = index(&["t1", "t0"]);
        assert_eq!(idx.order_json(), json!(["t1", "t0"]));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn unique_ids() -> impl Strategy<Value = Vec<String>> {
            proptest::collection::btree_set("[a-z]{1,6}", 1..12)
                .prop_map(|set| set.into_iter().collect())
        }

        proptest! {
            /// Replaying an index's own order list is the identity.
            #[test]
            fn apply_own_order_is_identity(mut order in unique_ids()) {
                // Shuffle deterministically so insertion order differs
                // from lexical order in most cases.
                let half = order.len() / 2;
                order.rotate_left(half);
                let mut idx = OrderedIndex::new();
                for id in &order {
                    idx.insert(id.clone(), json!({})).unwrap();
                }
                let stored = idx.order_json();
                let list = stored.as_array().unwrap().clone();
                idx.apply_order(&list, "prop").unwrap();
                prop_assert_eq!(idx.order_json(), stored);
            }

            /// The stale-list fallback is deterministic: always the
            /// lexical order, regardless of insertion order.
            #[test]
            fn stale_fallback_is_lexical(order in unique_ids()) {
                let mut reversed = order.clone();
                reversed.reverse();
                let mut idx = OrderedIndex::new();
                for id in &reversed {
                    idx.insert(id.clone(), json!({})).unwrap();
                }
                idx.apply_order(&[], "prop").unwrap();
                let sorted: Vec<JsonValue> =
                    order.iter().map(|id| json!(id)).collect();
                prop_assert_eq!(idx.order_json(), JsonValue::Array(sorted));
            }
        }
    }
}
