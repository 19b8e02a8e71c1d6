//! # Identity resolution
//!
//! Every entity is addressed by `(origin document tag, local id)`. Entity
//! ids survive cloning, so the merged document can hold entities coming from
//! any of the three inputs side by side.
//!
//! `clone_*_to_target` is the only way entities enter the merged document.
//! It returns the existing entity when the target already holds one with the
//! same identity and otherwise deep-clones it, keeping ids and recording the
//! mapping. Cloning into the document the entity came from is the identity.

use crate::errors::{MergeError, MergeResult};
use serde::{Deserialize, Serialize};
use sitediff_model::{Document, Uid, Variant, VariantSetting};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub origin: String,
    pub uid: Uid,
}

impl Identity {
    pub fn new(origin: impl Into<String>, uid: &Uid) -> Self {
        Self {
            origin: origin.into(),
            uid: uid.clone(),
        }
    }
}

/// Maps source identities to the id they were given in the target document
#[derive(Debug, Clone, Default)]
pub struct IdentityTable {
    entries: BTreeMap<Identity, Uid>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stable identity of `local` as seen from `document_id`
    pub fn resolve(&self, document_id: &str, local: &Uid) -> Identity {
        Identity::new(document_id, local)
    }

    pub fn record(&mut self, origin: &str, local: &Uid, target: Uid) {
        self.entries.insert(Identity::new(origin, local), target);
    }

    pub fn lookup(&self, origin: &str, local: &Uid) -> Option<&Uid> {
        self.entries.get(&Identity::new(origin, local))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find or deep-clone node `uid` of `source` into `target`.
///
/// Newly created ids are appended to `created`. The returned node keeps the
/// parent id it had in `source`; callers attach it.
pub fn clone_node_to_target(
    table: &mut IdentityTable,
    source: &Document,
    uid: &Uid,
    target: &mut Document,
    created: &mut Vec<Uid>,
) -> MergeResult<Uid> {
    if source.uuid == target.uuid {
        return Ok(uid.clone());
    }
    if let Some(mapped) = table.lookup(&source.uuid, uid) {
        if target.contains_node(mapped) {
            return Ok(mapped.clone());
        }
    }
    if target.contains_node(uid) {
        table.record(&source.uuid, uid, uid.clone());
        return Ok(uid.clone());
    }

    let node = source
        .node(uid)
        .ok_or_else(|| MergeError::MissingNode {
            document: source.name.clone(),
            uid: uid.clone(),
        })?
        .clone();
    let owned: Vec<Uid> = owned_ids(&node);

    // Registered before recursing so back-references resolve to this clone
    target.nodes.insert(uid.clone(), node);
    table.record(&source.uuid, uid, uid.clone());
    created.push(uid.clone());

    for child in owned {
        clone_node_to_target(table, source, &child, target, created)?;
    }
    Ok(uid.clone())
}

/// Find or clone component `uid` of `source` into `target`, root tree included
pub fn clone_component_to_target(
    table: &mut IdentityTable,
    source: &Document,
    uid: &Uid,
    target: &mut Document,
    created: &mut Vec<Uid>,
) -> MergeResult<Uid> {
    if source.uuid == target.uuid || target.has_component(uid) {
        return Ok(uid.clone());
    }
    let component = source
        .component(uid)
        .ok_or_else(|| MergeError::MissingComponent {
            document: source.name.clone(),
            uid: uid.clone(),
        })?
        .clone();
    let root = component.root.clone();
    target.components.push(component);
    table.record(&source.uuid, uid, uid.clone());

    clone_node_to_target(table, source, &root, target, created)?;
    if let Some(root) = target.node_mut(&root) {
        root.parent = None;
    }
    Ok(uid.clone())
}

/// Find or clone a variant declaration into `into`
pub fn clone_variant_to_target(
    table: &mut IdentityTable,
    origin: &str,
    variant: &Variant,
    into: &mut Vec<Variant>,
) -> Uid {
    if !into.iter().any(|existing| existing.uid == variant.uid) {
        into.push(variant.clone());
    }
    table.record(origin, &variant.uid, variant.uid.clone());
    variant.uid.clone()
}

/// Copy a variant setting, cloning any render content it owns into `target`
pub fn clone_vsetting_to_target(
    table: &mut IdentityTable,
    source: &Document,
    vs: &VariantSetting,
    target: &mut Document,
    created: &mut Vec<Uid>,
) -> MergeResult<VariantSetting> {
    for arg in &vs.args {
        for uid in arg.expr.nodes() {
            clone_node_to_target(table, source, uid, target, created)?;
        }
    }
    Ok(vs.clone())
}

/// Every id a node owns, including render args outside the base setting
fn owned_ids(node: &sitediff_model::Node) -> Vec<Uid> {
    let mut owned = node.child_list().cloned().unwrap_or_default();
    for vs in &node.vsettings {
        for arg in &vs.args {
            owned.extend(arg.expr.nodes().iter().cloned());
        }
    }
    owned
}
