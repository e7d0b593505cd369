//! Direct ⇄ by-id HoneyBadgerFish conversion
//!
//! Compaction re-indexes the `otus`/`trees` collections by identifier for
//! O(1) random access and pairs every by-id mapping with an explicit
//! order list, since mapping iteration order cannot be trusted once the
//! document leaves this process. Tree edges get a two-level index (outer
//! key the `@source` node, inner key the edge id) so children-of-node
//! lookups are O(1) downstream; edge `@target` ids must be unique across
//! the tree because consumers use them as reverse lookup keys.
//!
//! Expansion replays the order lists back into ordered sequences and
//! discards the by-id indices. A one-entry collection expands to a single
//! nested object, a multi-entry one to an array; the structural builder
//! never produces one-element arrays, so multiplicity survives the round
//! trip exactly.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use crate::error::{Error, Result};
use crate::formats::{BY_ID_VERSION, DIRECT_VERSION, NEXML2JSON_KEY};
use crate::ordered::OrderedIndex;

const OTUS_ORDER: &str = "^ot:otusElementOrder";
const OTU_ORDER: &str = "^ot:otuElementOrder";
const TREES_ORDER: &str = "^ot:treesElementOrder";
const TREE_ORDER: &str = "^ot:treeElementOrder";
const NODE_ORDER: &str = "^ot:nodeElementOrder";
const EDGE_ORDER: &str = "^ot:edgeElementOrder";
const ROOT_NODE_ID: &str = "^ot:rootNodeId";

/// Compact a direct HoneyBadgerFish document into the by-id form
///
/// `remove_old` false is the "fat" migration mode: the nested-by-tag
/// collections stay in place beside the new indices. Compacting an
/// already-compact document is a no-op apart from the version tag.
pub fn compact(doc: &mut JsonValue, remove_old: bool) -> Result<()> {
    let root = root_object_mut(doc)?;

    if root.contains_key("otus") {
        let groups = take_elements(root, "otus", remove_old)?;
        let mut index = OrderedIndex::new();
        for mut group in groups {
            {
                let obj = as_object_mut(&mut group, "otus")?;
                index_children(obj, "otu", "otuById", OTU_ORDER, remove_old, |_| Ok(()))?;
            }
            let id = require_id(&group, "otus")?;
            index.insert(id, group)?;
        }
        root.insert(OTUS_ORDER.to_string(), index.order_json());
        root.insert(
            "otusById".to_string(),
            JsonValue::Object(index.into_json_object()),
        );
    }

    if root.contains_key("trees") {
        let groups = take_elements(root, "trees", remove_old)?;
        let mut index = OrderedIndex::new();
        for mut group in groups {
            {
                let obj = as_object_mut(&mut group, "trees")?;
                index_children(obj, "tree", "treeById", TREE_ORDER, remove_old, |tree| {
                    compact_tree(tree, remove_old)
                })?;
            }
            let id = require_id(&group, "trees")?;
            index.insert(id, group)?;
        }
        root.insert(TREES_ORDER.to_string(), index.order_json());
        root.insert(
            "treesById".to_string(),
            JsonValue::Object(index.into_json_object()),
        );
    }

    root.insert(
        NEXML2JSON_KEY.to_string(),
        JsonValue::String(BY_ID_VERSION.to_string()),
    );
    Ok(())
}

/// Expand a by-id HoneyBadgerFish document back into the direct form
pub fn expand(doc: &mut JsonValue, remove_old: bool) -> Result<()> {
    let root = root_object_mut(doc)?;

    if root.contains_key("otusById") {
        let by_id = take_object(root, "otusById", remove_old)?;
        let order = take_order(root, OTUS_ORDER, remove_old)?;
        let mut index = OrderedIndex::from_json_object(by_id);
        index.apply_order(&order, "otusById")?;

        let mut groups = Vec::with_capacity(index.len());
        for (id, mut group) in index.into_entries() {
            {
                let obj = as_object_mut(&mut group, "otus")?;
                reinstate_id(obj, &id);
                expand_children(obj, "otu", "otuById", OTU_ORDER, remove_old, |_| Ok(()))?;
            }
            groups.push(group);
        }
        insert_collapsed(root, "otus", groups);
    }

    if root.contains_key("treesById") {
        let by_id = take_object(root, "treesById", remove_old)?;
        let order = take_order(root, TREES_ORDER, remove_old)?;
        let mut index = OrderedIndex::from_json_object(by_id);
        index.apply_order(&order, "treesById")?;

        let mut groups = Vec::with_capacity(index.len());
        for (id, mut group) in index.into_entries() {
            {
                let obj = as_object_mut(&mut group, "trees")?;
                reinstate_id(obj, &id);
                expand_children(obj, "tree", "treeById", TREE_ORDER, remove_old, |tree| {
                    expand_tree(tree, remove_old)
                })?;
            }
            groups.push(group);
        }
        insert_collapsed(root, "trees", groups);
    }

    root.insert(
        NEXML2JSON_KEY.to_string(),
        JsonValue::String(DIRECT_VERSION.to_string()),
    );
    Ok(())
}

/// Re-index one tree: nodes by id, edges by source then edge id
fn compact_tree(tree: &mut Map<String, JsonValue>, remove_old: bool) -> Result<()> {
    // Nodes
    let nodes = take_elements(tree, "node", remove_old)?;
    let mut node_index = OrderedIndex::new();
    let mut root_node: Option<String> = None;
    for node in nodes {
        let id = require_id(&node, "node")?;
        if is_truthy(node.get("@root")) {
            if let Some(first) = &root_node {
                warn!(first, second = %id, "tree flags more than one root node");
            } else {
                root_node = Some(id.clone());
            }
        }
        node_index.insert(id, node)?;
    }
    tree.insert(NODE_ORDER.to_string(), node_index.order_json());
    tree.insert(
        "nodeById".to_string(),
        JsonValue::Object(node_index.into_json_object()),
    );
    if let Some(id) = root_node {
        tree.insert(ROOT_NODE_ID.to_string(), JsonValue::String(id));
    }

    // Edges
    let edges = take_elements(tree, "edge", remove_old)?;
    let mut by_source: IndexMap<String, Map<String, JsonValue>> = IndexMap::new();
    let mut order = Vec::with_capacity(edges.len());
    let mut edge_ids: HashSet<String> = HashSet::new();
    let mut targets: HashSet<String> = HashSet::new();
    for edge in edges {
        let id = require_id(&edge, "edge")?;
        let source = require_attr(&edge, "@source", "edge")?;
        let target = require_attr(&edge, "@target", "edge")?;
        // Uniqueness is tree-wide, not per source group: the order list
        // enumerates edge ids across all groups.
        if !edge_ids.insert(id.clone()) {
            return Err(Error::Structural(format!(
                "edge id {:?} is not unique within its tree",
                id
            )));
        }
        if !targets.insert(target.clone()) {
            return Err(Error::Structural(format!(
                "edge target id {:?} is not unique within its tree; \
                 target ids are reverse lookup keys",
                target
            )));
        }
        by_source.entry(source).or_default().insert(id.clone(), edge);
        order.push(JsonValue::String(id));
    }
    tree.insert(EDGE_ORDER.to_string(), JsonValue::Array(order));
    tree.insert(
        "edgeBySourceId".to_string(),
        JsonValue::Object(
            by_source
                .into_iter()
                .map(|(source, group)| (source, JsonValue::Object(group)))
                .collect(),
        ),
    );
    Ok(())
}

/// Rebuild one tree's ordered node and edge sequences
fn expand_tree(tree: &mut Map<String, JsonValue>, remove_old: bool) -> Result<()> {
    if tree.contains_key("nodeById") {
        expand_children(tree, "node", "nodeById", NODE_ORDER, remove_old, |_| Ok(()))?;
    }
    if tree.contains_key("edgeBySourceId") {
        let by_source = take_object(tree, "edgeBySourceId", remove_old)?;
        let order = take_order(tree, EDGE_ORDER, remove_old)?;

        let mut index = OrderedIndex::new();
        for (source, group) in by_source {
            let group = match group {
                JsonValue::Object(group) => group,
                _ => {
                    return Err(Error::Structural(format!(
                        "edgeBySourceId entry {:?} is not an object",
                        source
                    )))
                }
            };
            for (edge_id, mut edge) in group {
                if let JsonValue::Object(obj) = &mut edge {
                    reinstate_id(obj, &edge_id);
                    obj.entry("@source".to_string())
                        .or_insert_with(|| JsonValue::String(source.clone()));
                }
                index.insert(edge_id, edge)?;
            }
        }
        index.apply_order(&order, "edgeBySourceId")?;
        let edges: Vec<JsonValue> = index.into_entries().map(|(_, edge)| edge).collect();
        insert_collapsed(tree, "edge", edges);
    }
    if remove_old {
        tree.remove(ROOT_NODE_ID);
    }
    Ok(())
}

/// Index the `tag` children of `obj` into `by_id_key` plus an order list
fn index_children<F>(
    obj: &mut Map<String, JsonValue>,
    tag: &str,
    by_id_key: &str,
    order_key: &str,
    remove_old: bool,
    transform: F,
) -> Result<()>
where
    F: Fn(&mut Map<String, JsonValue>) -> Result<()>,
{
    let items = take_elements(obj, tag, remove_old)?;
    let mut index = OrderedIndex::new();
    for mut item in items {
        {
            let item_obj = as_object_mut(&mut item, tag)?;
            transform(item_obj)?;
        }
        let id = require_id(&item, tag)?;
        index.insert(id, item)?;
    }
    obj.insert(order_key.to_string(), index.order_json());
    obj.insert(
        by_id_key.to_string(),
        JsonValue::Object(index.into_json_object()),
    );
    Ok(())
}

/// Inverse of [`index_children`]: replay the order list into a sequence
fn expand_children<F>(
    obj: &mut Map<String, JsonValue>,
    tag: &str,
    by_id_key: &str,
    order_key: &str,
    remove_old: bool,
    transform: F,
) -> Result<()>
where
    F: Fn(&mut Map<String, JsonValue>) -> Result<()>,
{
    let by_id = take_object(obj, by_id_key, remove_old)?;
    let order = take_order(obj, order_key, remove_old)?;
    let mut index = OrderedIndex::from_json_object(by_id);
    index.apply_order(&order, by_id_key)?;

    let mut items = Vec::with_capacity(index.len());
    for (id, mut item) in index.into_entries() {
        if let JsonValue::Object(item_obj) = &mut item {
            reinstate_id(item_obj, &id);
            transform(item_obj)?;
        }
        items.push(item);
    }
    insert_collapsed(obj, tag, items);
    Ok(())
}

/// The single root mapping of a document
fn root_object_mut(doc: &mut JsonValue) -> Result<&mut Map<String, JsonValue>> {
    let obj = doc
        .as_object_mut()
        .ok_or_else(|| Error::Structural("document is not a JSON object".to_string()))?;
    if obj.len() != 1 {
        return Err(Error::Structural(format!(
            "document must have exactly one root key, found {}",
            obj.len()
        )));
    }
    obj.values_mut()
        .next()
        .and_then(|v| v.as_object_mut())
        .ok_or_else(|| Error::Structural("root element is not a JSON object".to_string()))
}

/// Remove (or clone, in fat mode) a nested-by-tag collection as a list
///
/// A single nested object yields a one-element list; absence yields an
/// empty list.
fn take_elements(
    map: &mut Map<String, JsonValue>,
    tag: &str,
    remove_old: bool,
) -> Result<Vec<JsonValue>> {
    let value = if remove_old {
        map.remove(tag)
    } else {
        map.get(tag).cloned()
    };
    match value {
        None => Ok(Vec::new()),
        Some(JsonValue::Array(items)) => Ok(items),
        Some(value @ JsonValue::Object(_)) => Ok(vec![value]),
        Some(_) => Err(Error::Structural(format!(
            "collection {:?} is neither an object nor an array",
            tag
        ))),
    }
}

/// Remove (or clone, in fat mode) a by-id mapping
fn take_object(
    map: &mut Map<String, JsonValue>,
    key: &str,
    remove_old: bool,
) -> Result<Map<String, JsonValue>> {
    let value = if remove_old {
        map.remove(key)
    } else {
        map.get(key).cloned()
    };
    match value {
        Some(JsonValue::Object(obj)) => Ok(obj),
        Some(_) => Err(Error::Structural(format!("{:?} is not an object", key))),
        None => Ok(Map::new()),
    }
}

/// Remove (or clone, in fat mode) an order list
fn take_order(
    map: &mut Map<String, JsonValue>,
    key: &str,
    remove_old: bool,
) -> Result<Vec<JsonValue>> {
    let value = if remove_old {
        map.remove(key)
    } else {
        map.get(key).cloned()
    };
    match value {
        None => Ok(Vec::new()),
        Some(JsonValue::Array(ids)) => Ok(ids),
        Some(_) => Err(Error::Structural(format!(
            "order list {:?} is not an array",
            key
        ))),
    }
}

fn as_object_mut<'a>(
    value: &'a mut JsonValue,
    what: &str,
) -> Result<&'a mut Map<String, JsonValue>> {
    value
        .as_object_mut()
        .ok_or_else(|| Error::Structural(format!("{} element is not a JSON object", what)))
}

fn require_id(value: &JsonValue, what: &str) -> Result<String> {
    require_attr(value, "@id", what)
}

fn require_attr(value: &JsonValue, key: &str, what: &str) -> Result<String> {
    value
        .get(key)
        .and_then(JsonValue::as_str)
        .map(|s| s.to_string())
        .ok_or_else(|| {
            Error::Structural(format!("{} element lacks a string {} attribute", what, key))
        })
}

/// Put an element's id attribute back if a hand-authored document omitted
/// it (the by-id key is the source of truth)
fn reinstate_id(obj: &mut Map<String, JsonValue>, id: &str) {
    obj.entry("@id".to_string())
        .or_insert_with(|| JsonValue::String(id.to_string()));
}

fn is_truthy(value: Option<&JsonValue>) -> bool {
    match value {
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::String(s)) => s.eq_ignore_ascii_case("true") || s == "1",
        _ => false,
    }
}

/// Insert a sequence under `tag`, collapsing one element to a bare object
///
/// Empty sequences insert nothing, so a container that never had the tag
/// round-trips without gaining an empty list.
fn insert_collapsed(map: &mut Map<String, JsonValue>, tag: &str, mut items: Vec<JsonValue>) {
    if items.len() == 1 {
        if let Some(item) = items.pop() {
            map.insert(tag.to_string(), item);
        }
    } else if !items.is_empty() {
        map.insert(tag.to_string(), JsonValue::Array(items));
    }
}
