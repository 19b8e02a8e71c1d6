//! # Tree reparenting
//!
//! Per matched component:
//!
//! 1. Re-rooting. A one-sided root replacement is adopted; two different
//!    replacements are a structural conflict.
//! 2. Reparenting. Every node present in all four views whose parent
//!    changed on exactly one side (or identically on both) is moved; two
//!    different moves are a structural conflict and the node stays put.
//!    Under an instance the slot param is part of the parent.
//! 3. Cycle repair. Independent moves can leave nodes unreachable from any
//!    component root, typically two nodes each moved under the other. Such
//!    nodes are walked up to the first one whose parent differs from the
//!    ancestor and, if its parent chain loops or dangles, that move is
//!    undone, until nothing is left to repair.
//! 4. Node merge, top-down over the merged tree.
//! 5. Nodes deleted in either branch are unlinked.

use crate::children::{self, insert_after_preceding};
use crate::conflicts::{diff_field, CanonicalPath, ConflictKind, ConflictRecord, FieldDiff, FieldPolicy, Resolution};
use crate::errors::{MergeError, MergeResult};
use crate::session::{MergeSession, Source};
use crate::vsettings;
use serde_json::json;
use sitediff_model::visitor::{flatten_component, reachable_nodes};
use sitediff_model::{Document, NodeKind, ParentSlot, Uid};
use std::collections::BTreeSet;
use std::mem::discriminant;
use tracing::{debug, info, instrument, warn};

#[instrument(skip(session))]
pub(crate) fn merge_tree(session: &mut MergeSession<'_>, component: &Uid) -> MergeResult<()> {
    merge_root(session, component)?;
    reparent_nodes(session, component)?;
    repair_cycles(session, component)?;
    merge_nodes(session, component)?;
    unlink_deleted(session, component);

    if let Some(root) = session.merged.component(component).map(|c| c.root.clone()) {
        if let Some(node) = session.merged.node_mut(&root) {
            node.parent = None;
        }
    }
    Ok(())
}

fn root_of(doc: &Document, component: &Uid) -> MergeResult<Uid> {
    doc.component(component)
        .map(|c| c.root.clone())
        .ok_or_else(|| MergeError::MissingComponent {
            document: doc.name.clone(),
            uid: component.clone(),
        })
}

fn merge_root(session: &mut MergeSession<'_>, component: &Uid) -> MergeResult<()> {
    let ancestor = root_of(session.ancestor, component)?;
    let left = root_of(session.left, component)?;
    let right = root_of(session.right, component)?;

    match diff_field(FieldPolicy::Scalar, &ancestor, &left, &right) {
        FieldDiff::Auto(root) => {
            let source = if root == left { Source::Left } else { Source::Right };
            info!(component = %component, root = %root, "Adopting new root");
            adopt_root(session, component, source)
        }
        FieldDiff::Conflict { left, right } => {
            let record = ConflictRecord {
                path: CanonicalPath::component(component).child("root").to_string(),
                kind: ConflictKind::Structural,
                left_value: json!(left),
                right_value: json!(right),
            };
            session.raise(
                record,
                Resolution::Reroot {
                    component: component.clone(),
                },
            )
        }
        FieldDiff::Unchanged | FieldDiff::Delegate(_) => Ok(()),
    }
}

/// Make `source`'s root the merged component root
pub(crate) fn adopt_root(
    session: &mut MergeSession<'_>,
    component: &Uid,
    source: Source,
) -> MergeResult<()> {
    let root = root_of(session.doc(source), component)?;
    session.clone_node(source, &root)?;
    session.merged.detach(&root);
    if let Some(merged) = session.merged.component_mut(component) {
        merged.root = root;
    }
    Ok(())
}

fn reparent_nodes(session: &mut MergeSession<'_>, component: &Uid) -> MergeResult<()> {
    let Some(ancestor_component) = session.ancestor.component(component) else {
        return Ok(());
    };
    let candidates: Vec<Uid> = flatten_component(session.ancestor, ancestor_component)
        .into_iter()
        .filter(|uid| session.in_all_inputs(uid) && session.merged.contains_node(uid))
        .collect();

    for uid in candidates {
        let ancestor = session.ancestor.parent_slot(&uid);
        if ancestor.parent.is_none() {
            continue;
        }
        let left = session.left.parent_slot(&uid);
        let right = session.right.parent_slot(&uid);

        let source = match diff_field(FieldPolicy::Scalar, &ancestor, &left, &right) {
            FieldDiff::Unchanged | FieldDiff::Delegate(_) => continue,
            FieldDiff::Conflict { left, right } => {
                let record = ConflictRecord {
                    path: CanonicalPath::node(component, &uid).child("parent").to_string(),
                    kind: ConflictKind::Structural,
                    left_value: slot_json(&left),
                    right_value: slot_json(&right),
                };
                session.raise(
                    record,
                    Resolution::Reparent {
                        component: component.clone(),
                        node: uid.clone(),
                    },
                )?;
                continue;
            }
            FieldDiff::Auto(target) => {
                if target == left {
                    Source::Left
                } else {
                    Source::Right
                }
            }
        };

        if session.merged.parent_slot(&uid) != session.doc(source).parent_slot(&uid) {
            update_parent(session, &uid, source)?;
        }
    }
    Ok(())
}

fn slot_json(slot: &ParentSlot) -> serde_json::Value {
    json!({ "parent": slot.parent, "param": slot.param })
}

/// Move `uid` in the merged tree to where it hangs in `source`
pub(crate) fn update_parent(
    session: &mut MergeSession<'_>,
    uid: &Uid,
    source: Source,
) -> MergeResult<()> {
    let branch = session.doc(source);
    let branch_node = branch.node(uid).ok_or_else(|| MergeError::MissingNode {
        document: branch.name.clone(),
        uid: uid.clone(),
    })?;

    session.merged.detach(uid);
    let Some(branch_parent_id) = branch_node.parent.clone() else {
        return Ok(());
    };
    let branch_parent = branch
        .node(&branch_parent_id)
        .ok_or_else(|| MergeError::MissingNode {
            document: branch.name.clone(),
            uid: branch_parent_id.clone(),
        })?;

    let parent = session.clone_node(source, &branch_parent_id)?;
    // A parent the branch created hangs where the branch put it
    if !session.ancestor.contains_node(&parent) && !is_linked(&session.merged, &parent) {
        update_parent(session, &parent, source)?;
    }
    let merged_parent = session
        .merged
        .node(&parent)
        .ok_or_else(|| MergeError::MissingNode {
            document: session.merged.name.clone(),
            uid: parent.clone(),
        })?;
    if discriminant(&merged_parent.kind) != discriminant(&branch_parent.kind) {
        return Err(MergeError::KindMismatch(parent));
    }

    // Cloning a new parent brings its children along
    if merged_parent.contains_child(uid) {
        set_parent(&mut session.merged, uid, &parent);
        return Ok(());
    }

    let (branch_list, param) = match &branch_parent.kind {
        NodeKind::Instance { .. } => {
            let Some(param) = branch_parent.param_holding(uid).cloned() else {
                return Ok(());
            };
            let list = branch_parent
                .slot_arg(&param)
                .map(|arg| arg.expr.nodes().to_vec())
                .unwrap_or_default();
            (list, Some(param))
        }
        _ => (branch_parent.children(), None),
    };

    if let Some(param) = &param {
        let declared = merged_parent
            .instance_of()
            .and_then(|target| session.merged.component(target))
            .map(|target| target.has_slot_param(param))
            .unwrap_or(false);
        if !declared {
            warn!(node = %uid, param = %param, "Slot param no longer declared, leaving node detached");
            return Ok(());
        }
    }

    let Some(merged_parent) = session.merged.node_mut(&parent) else {
        return Ok(());
    };
    let list = match &param {
        Some(param) => merged_parent.ensure_render_arg(param),
        None => merged_parent.child_list_mut(),
    };
    if let Some(list) = list {
        insert_after_preceding(list, &branch_list, uid);
        set_parent(&mut session.merged, uid, &parent);
        debug!(node = %uid, parent = %parent, "Reparented");
    }
    Ok(())
}

fn set_parent(doc: &mut Document, uid: &Uid, parent: &Uid) {
    if let Some(node) = doc.node_mut(uid) {
        node.parent = Some(parent.clone());
    }
}

/// Whether `uid` is listed by its parent, or is a component root
fn is_linked(doc: &Document, uid: &Uid) -> bool {
    match doc.node(uid).and_then(|n| n.parent.as_ref()) {
        Some(parent) => doc.node(parent).is_some_and(|p| p.contains_child(uid)),
        None => doc.components.iter().any(|c| &c.root == uid),
    }
}

/// Whether merged parent pointers from `uid` loop, or end at a node that is
/// not a component root
fn parent_chain_broken(doc: &Document, uid: &Uid) -> bool {
    let mut seen = BTreeSet::new();
    let mut current = uid.clone();
    loop {
        if !seen.insert(current.clone()) {
            return true;
        }
        match doc.node(&current).and_then(|n| n.parent.clone()) {
            Some(parent) => current = parent,
            None => return !doc.components.iter().any(|c| c.root == current),
        }
    }
}

/// Restore ancestor parenting for nodes that independent moves cut off from the root
pub(crate) fn repair_cycles(session: &mut MergeSession<'_>, component: &Uid) -> MergeResult<()> {
    let Some(ancestor_component) = session.ancestor.component(component) else {
        return Ok(());
    };
    let ancestor_nodes: Vec<Uid> = flatten_component(session.ancestor, ancestor_component)
        .into_iter()
        .filter(|uid| session.left.contains_node(uid) && session.right.contains_node(uid))
        .collect();
    let cap = session.merged.nodes.len() + 1;

    for iteration in 0.. {
        if iteration > cap {
            return Err(MergeError::CycleRepairDiverged {
                component: component.clone(),
                iterations: iteration,
            });
        }
        if !session.merged.has_component(component) {
            return Ok(());
        }
        // Nodes moved into another component's tree are reachable from its root
        let reachable = reachable_nodes(&session.merged);

        let mut repaired = false;
        for uid in ancestor_nodes.iter().filter(|uid| !reachable.contains(*uid)) {
            let mut current = uid.clone();
            let mut steps = 0;
            loop {
                let merged_parent = session.merged.node(&current).and_then(|n| n.parent.clone());
                let ancestor_parent = session.ancestor.node(&current).and_then(|n| n.parent.clone());
                match merged_parent {
                    Some(parent) if Some(&parent) == ancestor_parent.as_ref() && steps < cap => {
                        current = parent;
                        steps += 1;
                    }
                    _ => break,
                }
            }

            let stranded = !reachable.contains(&current)
                && session.ancestor.node(&current).and_then(|n| n.parent.as_ref()).is_some()
                && session.in_all_inputs(&current)
                && parent_chain_broken(&session.merged, &current);
            if stranded {
                warn!(node = %current, "Restoring ancestor parent of unreachable node");
                update_parent(session, &current, Source::Ancestor)?;
                repaired = true;
                break;
            }
        }

        if !repaired {
            return Ok(());
        }
    }
    Ok(())
}

/// Field-level merge of every node present in all inputs, parents first
fn merge_nodes(session: &mut MergeSession<'_>, component: &Uid) -> MergeResult<()> {
    let root = root_of(&session.merged, component)?;
    let mut seen = BTreeSet::new();
    let mut stack = vec![root];
    while let Some(uid) = stack.pop() {
        if !seen.insert(uid.clone()) {
            continue;
        }
        if session.in_all_inputs(&uid) {
            merge_node(session, component, &uid)?;
        }
        if let Some(node) = session.merged.node(&uid) {
            stack.extend(node.children().into_iter().rev());
        }
    }
    Ok(())
}

fn merge_node(session: &mut MergeSession<'_>, component: &Uid, uid: &Uid) -> MergeResult<()> {
    let (Some(ancestor), Some(left), Some(right)) = (
        session.ancestor.node(uid),
        session.left.node(uid),
        session.right.node(uid),
    ) else {
        return Ok(());
    };
    let kind = discriminant(&ancestor.kind);
    if discriminant(&left.kind) != kind || discriminant(&right.kind) != kind {
        return Err(MergeError::KindMismatch(uid.clone()));
    }
    let path = CanonicalPath::node(component, uid);

    session.merge_scalar(
        "Node",
        "name",
        path.child("name"),
        crate::conflicts::FieldTarget::NodeName { node: uid.clone() },
        ancestor.name.clone(),
        left.name.clone(),
        right.name.clone(),
    )?;

    match &ancestor.kind {
        NodeKind::Container { .. } => {
            session.merge_scalar(
                "Node",
                "tag",
                path.child("tag"),
                crate::conflicts::FieldTarget::NodeTag { node: uid.clone() },
                ancestor.tag().map(str::to_string),
                left.tag().map(str::to_string),
                right.tag().map(str::to_string),
            )?;
            children::merge_child_list(session, component, uid)?;
        }
        NodeKind::Slot { .. } => {
            children::merge_child_list(session, component, uid)?;
        }
        NodeKind::Instance { .. } => {
            session.merge_scalar(
                "Node",
                "component",
                path.child("component"),
                crate::conflicts::FieldTarget::InstanceComponent { node: uid.clone() },
                ancestor.instance_of().map(Uid::to_string),
                left.instance_of().map(Uid::to_string),
                right.instance_of().map(Uid::to_string),
            )?;
            children::merge_slot_args(session, component, uid)?;
        }
    }

    vsettings::merge_vsettings(session, component, uid)
}

/// Unlink nodes that one branch deleted
fn unlink_deleted(session: &mut MergeSession<'_>, component: &Uid) {
    let Some(merged_component) = session.merged.component(component) else {
        return;
    };
    let deleted: Vec<Uid> = flatten_component(&session.merged, merged_component)
        .into_iter()
        .filter(|uid| {
            session.ancestor.contains_node(uid)
                && (!session.left.contains_node(uid) || !session.right.contains_node(uid))
        })
        .collect();
    for uid in deleted {
        debug!(node = %uid, "Unlinking deleted node");
        session.merged.detach(&uid);
    }
}
