//! # Ordered child lists
//!
//! Three-way merge of the lists a node owns: container children, slot
//! default contents and, for instances, the render content of each slot
//! argument.
//!
//! 1. Restrict every view to the ids present in all four lists and decide
//!    the order of those: identical branch orders or a one-sided reorder are
//!    adopted, two different reorders are an ordered-list conflict.
//! 2. Drop ancestor entries that no longer exist in either branch.
//! 3. Insert entries new to a branch right after the last entry that
//!    precedes them in that branch and is already in the merged list.
//!
//! Entries that exist elsewhere in the ancestor were moved, not created, and
//! are placed by the reparenting pass instead.

use crate::conflicts::{diff_field, CanonicalPath, ConflictKind, ConflictRecord, FieldDiff, FieldPolicy, Resolution};
use crate::errors::MergeResult;
use crate::session::{MergeSession, Source};
use serde::{Deserialize, Serialize};
use sitediff_model::{ArgExpr, Document, Node, Uid};
use std::collections::BTreeSet;
use tracing::debug;

/// Content of one slot argument, restricted to the common ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SlotContent {
    Virtual,
    Nodes { nodes: Vec<Uid> },
}

/// Per-param slot contents of an instance, sorted by param id
pub type SlotOrder = Vec<(Uid, SlotContent)>;

#[derive(Debug, Clone, PartialEq)]
pub enum OrderDecision<T> {
    Adopt(T),
    Conflict { left: T, right: T },
}

/// Decide the order of the common entries
pub fn decide_order<T: PartialEq + Clone>(ancestor: &T, left: &T, right: &T) -> OrderDecision<T> {
    match diff_field(FieldPolicy::Scalar, ancestor, left, right) {
        FieldDiff::Auto(order) => OrderDecision::Adopt(order),
        FieldDiff::Conflict { left, right } => OrderDecision::Conflict { left, right },
        FieldDiff::Unchanged | FieldDiff::Delegate(_) => OrderDecision::Adopt(ancestor.clone()),
    }
}

pub fn restrict<T: Ord + Clone>(list: &[T], common: &BTreeSet<T>) -> Vec<T> {
    list.iter().filter(|item| common.contains(*item)).cloned().collect()
}

/// Rewrite the positions of `anchors` in `list` with `order`, keeping every
/// other entry where it is. Leftover `order` entries are appended.
pub fn resplice(list: &[Uid], anchors: &BTreeSet<Uid>, order: &[Uid]) -> Vec<Uid> {
    let mut next = order.iter();
    let mut out = Vec::with_capacity(list.len().max(order.len()));
    for uid in list {
        if anchors.contains(uid) {
            if let Some(replacement) = next.next() {
                out.push(replacement.clone());
            }
        } else {
            out.push(uid.clone());
        }
    }
    out.extend(next.cloned());
    out
}

/// Insert `item` right after the last entry of `list` that precedes it in `branch`
pub fn insert_after_preceding<T: Ord + Clone>(list: &mut Vec<T>, branch: &[T], item: &T) {
    let position = branch
        .iter()
        .position(|entry| entry == item)
        .unwrap_or(branch.len());
    let preceding: BTreeSet<&T> = branch[..position].iter().collect();
    let index = list
        .iter()
        .rposition(|entry| preceding.contains(entry))
        .map_or(0, |index| index + 1);
    list.insert(index, item.clone());
}

/// Order of a keyed set: entries kept by both branches in the agreed order
/// (left wins a divergent reorder), then branch additions after their
/// preceding branch sibling
pub fn merge_order<T: Ord + Clone>(ancestor: &[T], left: &[T], right: &[T]) -> Vec<T> {
    let kept: BTreeSet<T> = ancestor
        .iter()
        .filter(|item| left.contains(*item) && right.contains(*item))
        .cloned()
        .collect();
    let ancestor_order = restrict(ancestor, &kept);
    let mut order = match diff_field(
        FieldPolicy::Harmless,
        &ancestor_order,
        &restrict(left, &kept),
        &restrict(right, &kept),
    ) {
        FieldDiff::Auto(order) => order,
        _ => ancestor_order,
    };

    for branch in [left, right] {
        for item in branch {
            if !ancestor.contains(item) && !order.contains(item) {
                insert_after_preceding(&mut order, branch, item);
            }
        }
    }
    order
}

fn owned_list(doc: &Document, uid: &Uid) -> Vec<Uid> {
    doc.node(uid)
        .and_then(Node::child_list)
        .cloned()
        .unwrap_or_default()
}

fn intersect(lists: &[&[Uid]]) -> BTreeSet<Uid> {
    let Some((first, rest)) = lists.split_first() else {
        return BTreeSet::new();
    };
    first
        .iter()
        .filter(|uid| rest.iter().all(|list| list.contains(*uid)))
        .cloned()
        .collect()
}

/// Merge the children of a container or the default contents of a slot
pub(crate) fn merge_child_list(
    session: &mut MergeSession<'_>,
    component: &Uid,
    uid: &Uid,
) -> MergeResult<()> {
    let ancestor = owned_list(session.ancestor, uid);
    let left = owned_list(session.left, uid);
    let right = owned_list(session.right, uid);
    let merged = owned_list(&session.merged, uid);

    let common = intersect(&[&ancestor[..], &left[..], &right[..], &merged[..]]);
    match decide_order(
        &restrict(&ancestor, &common),
        &restrict(&left, &common),
        &restrict(&right, &common),
    ) {
        OrderDecision::Adopt(order) => apply_container_order(&mut session.merged, uid, &order),
        OrderDecision::Conflict { left, right } => {
            let record = ConflictRecord {
                path: CanonicalPath::node(component, uid).child("children").to_string(),
                kind: ConflictKind::OrderedList,
                left_value: serde_json::to_value(&left).unwrap_or_default(),
                right_value: serde_json::to_value(&right).unwrap_or_default(),
            };
            session.raise(
                record,
                Resolution::ChildOrder {
                    node: uid.clone(),
                    left,
                    right,
                },
            )?;
        }
    }

    for child in &ancestor {
        if !session.left.contains_node(child) || !session.right.contains_node(child) {
            if let Some(node) = session.merged.node_mut(uid) {
                if node.remove_child(child) {
                    debug!(parent = %uid, child = %child, "dropped deleted child");
                }
            }
            unlink_parent(&mut session.merged, child, uid);
        }
    }

    for (source, branch) in [(Source::Left, &left), (Source::Right, &right)] {
        for child in branch.iter() {
            if session.ancestor.contains_node(child) {
                continue;
            }
            let already_listed = session
                .merged
                .node(uid)
                .map(|node| node.contains_child(child))
                .unwrap_or(true);
            if already_listed {
                continue;
            }
            session.clone_node(source, child)?;
            if let Some(list) = session.merged.node_mut(uid).and_then(Node::child_list_mut) {
                insert_after_preceding(list, branch, child);
            }
            set_parent(&mut session.merged, child, uid);
        }
    }
    Ok(())
}

/// Put the common entries of a container or slot list in `order`
pub(crate) fn apply_container_order(doc: &mut Document, uid: &Uid, order: &[Uid]) {
    let anchors: BTreeSet<Uid> = order.iter().cloned().collect();
    if let Some(list) = doc.node_mut(uid).and_then(Node::child_list_mut) {
        *list = resplice(list, &anchors, order);
    }
    for child in order {
        set_parent(doc, child, uid);
    }
}

/// Slot params of `instance`'s target in `doc`
fn declared_slot_params(doc: &Document, instance: &Uid) -> BTreeSet<Uid> {
    doc.node(instance)
        .and_then(Node::instance_of)
        .and_then(|component| doc.component(component))
        .map(|component| component.slot_params().map(|p| p.uid.clone()).collect())
        .unwrap_or_default()
}

/// Slot order of an instance in `doc`, restricted to `allowed` params and `common` ids
pub fn slot_order(
    doc: &Document,
    instance: &Uid,
    allowed: &BTreeSet<Uid>,
    common: &BTreeSet<Uid>,
) -> SlotOrder {
    let Some(node) = doc.node(instance) else {
        return Vec::new();
    };
    let mut order: SlotOrder = node
        .slot_args()
        .filter(|arg| allowed.contains(&arg.param))
        .filter_map(|arg| match &arg.expr {
            ArgExpr::Virtual => Some((arg.param.clone(), SlotContent::Virtual)),
            ArgExpr::Render { nodes } => {
                let nodes = restrict(nodes, common);
                (!nodes.is_empty()).then(|| (arg.param.clone(), SlotContent::Nodes { nodes }))
            }
            ArgExpr::Value { .. } => None,
        })
        .collect();
    order.sort_by(|a, b| a.0.cmp(&b.0));
    order
}

/// Merge the render content of an instance's slot arguments
pub(crate) fn merge_slot_args(
    session: &mut MergeSession<'_>,
    component: &Uid,
    uid: &Uid,
) -> MergeResult<()> {
    let allowed = declared_slot_params(&session.merged, uid);
    let children_of = |doc: &Document| doc.node(uid).map(Node::children).unwrap_or_default();
    let ancestor_children = children_of(session.ancestor);
    let left_children = children_of(session.left);
    let right_children = children_of(session.right);
    let merged_children = children_of(&session.merged);
    let common = intersect(&[
        &ancestor_children[..],
        &left_children[..],
        &right_children[..],
        &merged_children[..],
    ]);

    let ancestor_order = slot_order(session.ancestor, uid, &allowed, &common);
    let left_order = slot_order(session.left, uid, &allowed, &common);
    let right_order = slot_order(session.right, uid, &allowed, &common);

    match decide_order(&ancestor_order, &left_order, &right_order) {
        OrderDecision::Adopt(order) => apply_slot_order(&mut session.merged, uid, &order),
        OrderDecision::Conflict { left, right } => {
            let record = ConflictRecord {
                path: CanonicalPath::node(component, uid).child("args").to_string(),
                kind: ConflictKind::OrderedList,
                left_value: serde_json::to_value(&left).unwrap_or_default(),
                right_value: serde_json::to_value(&right).unwrap_or_default(),
            };
            session.raise(
                record,
                Resolution::SlotOrder {
                    node: uid.clone(),
                    left,
                    right,
                },
            )?;
        }
    }

    for child in &ancestor_children {
        if !session.left.contains_node(child) || !session.right.contains_node(child) {
            if let Some(node) = session.merged.node_mut(uid) {
                node.remove_child(child);
            }
            unlink_parent(&mut session.merged, child, uid);
        }
    }

    for source in [Source::Left, Source::Right] {
        let branch = session.doc(source);
        let Some(branch_node) = branch.node(uid) else {
            continue;
        };
        for arg in branch_node.slot_args() {
            if !allowed.contains(&arg.param) {
                continue;
            }
            let branch_list = arg.expr.nodes();
            for child in branch_list {
                if session.ancestor.contains_node(child) {
                    continue;
                }
                let already_listed = session
                    .merged
                    .node(uid)
                    .map(|node| node.contains_child(child))
                    .unwrap_or(true);
                if already_listed {
                    continue;
                }
                session.clone_node(source, child)?;
                if let Some(list) = session
                    .merged
                    .node_mut(uid)
                    .and_then(|node| node.ensure_render_arg(&arg.param))
                {
                    insert_after_preceding(list, branch_list, child);
                }
                set_parent(&mut session.merged, child, uid);
            }
        }
    }
    Ok(())
}

/// Lay out an instance's slot arguments according to `order`
pub(crate) fn apply_slot_order(doc: &mut Document, uid: &Uid, order: &SlotOrder) {
    let anchors: BTreeSet<Uid> = order
        .iter()
        .flat_map(|(_, content)| match content {
            SlotContent::Nodes { nodes } => nodes.clone(),
            SlotContent::Virtual => Vec::new(),
        })
        .collect();

    let Some(node) = doc.node_mut(uid) else {
        return;
    };
    let Some(base) = node.base_vsetting_mut() else {
        return;
    };

    for arg in base.args.iter_mut() {
        if let ArgExpr::Render { nodes } = &mut arg.expr {
            let wanted = order
                .iter()
                .find(|(param, _)| param == &arg.param)
                .and_then(|(_, content)| match content {
                    SlotContent::Nodes { nodes } => Some(nodes.as_slice()),
                    SlotContent::Virtual => None,
                })
                .unwrap_or(&[]);
            *nodes = resplice(nodes, &anchors, wanted);
        }
    }

    for (param, content) in order {
        let exists = base.args.iter().any(|arg| &arg.param == param);
        match content {
            SlotContent::Virtual => match base.args.iter_mut().find(|arg| &arg.param == param) {
                Some(arg) => arg.expr = ArgExpr::Virtual,
                None => base.args.push(sitediff_model::Arg {
                    param: param.clone(),
                    expr: ArgExpr::Virtual,
                }),
            },
            SlotContent::Nodes { nodes } => {
                let is_render = base
                    .args
                    .iter()
                    .any(|arg| &arg.param == param && matches!(arg.expr, ArgExpr::Render { .. }));
                if !exists || !is_render {
                    base.args.retain(|arg| &arg.param != param);
                    base.args.push(sitediff_model::Arg {
                        param: param.clone(),
                        expr: ArgExpr::Render {
                            nodes: nodes.clone(),
                        },
                    });
                }
            }
        }
    }

    for child in anchors {
        set_parent(doc, &child, uid);
    }
}

fn set_parent(doc: &mut Document, child: &Uid, parent: &Uid) {
    if let Some(node) = doc.node_mut(child) {
        node.parent = Some(parent.clone());
    }
}

fn unlink_parent(doc: &mut Document, child: &Uid, parent: &Uid) {
    if let Some(node) = doc.node_mut(child) {
        if node.parent.as_ref() == Some(parent) {
            node.parent = None;
        }
    }
}
