//! # Component sets
//!
//! Components are matched by id. The merged set is the ancestor set minus
//! what either branch deleted, plus what either branch added (left first).
//! Components present in all three inputs are then merged field by field
//! and their trees handed to the reparenting pass.
//!
//! A registered component deleted in a branch that re-registered the same
//! widget under a new id is kept as a trailing duplicate, so the folding
//! pass can move its instances over to the surviving registration.

use crate::children::merge_order;
use crate::conflicts::{diff_field, CanonicalPath, FieldDiff, FieldPolicy, FieldTarget};
use crate::errors::MergeResult;
use crate::identity::clone_variant_to_target;
use crate::session::{MergeSession, Source};
use crate::tree;
use sitediff_model::{Component, Document, Param, State, Uid, Variant};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

#[instrument(skip(session))]
pub(crate) fn merge_document(session: &mut MergeSession<'_>) -> MergeResult<()> {
    session.merge_scalar(
        "Document",
        "name",
        CanonicalPath::root().child("name"),
        FieldTarget::DocumentName,
        Some(session.ancestor.name.clone()),
        Some(session.left.name.clone()),
        Some(session.right.name.clone()),
    )?;

    merge_variant_set(session, None)?;
    reconcile_components(session)?;

    let matched: Vec<Uid> = session
        .merged
        .components
        .iter()
        .map(|c| c.uid.clone())
        .filter(|uid| {
            session.ancestor.has_component(uid)
                && session.left.has_component(uid)
                && session.right.has_component(uid)
        })
        .collect();
    for uid in matched {
        merge_component(session, &uid)?;
    }
    Ok(())
}

fn component_order(doc: &Document) -> Vec<Uid> {
    doc.components.iter().map(|c| c.uid.clone()).collect()
}

fn deleted_in(branch: &Document, ancestor: &Document) -> BTreeSet<Uid> {
    ancestor
        .component_uids()
        .difference(&branch.component_uids())
        .cloned()
        .collect()
}

/// Add and remove whole components
pub(crate) fn reconcile_components(session: &mut MergeSession<'_>) -> MergeResult<()> {
    for source in [Source::Left, Source::Right] {
        let branch = session.doc(source);
        for component in &branch.components {
            if session.ancestor.has_component(&component.uid)
                || session.merged.has_component(&component.uid)
            {
                continue;
            }
            info!(component = %component.uid, name = %component.name, "Adding component");
            session.clone_component(source, &component.uid)?;
            session.new_components.insert(component.uid.clone());
        }
    }

    let order = merge_order(
        &component_order(session.ancestor),
        &component_order(session.left),
        &component_order(session.right),
    );
    sort_by_order(&mut session.merged.components, &order, |c| c.uid.clone());

    let deleted: BTreeSet<Uid> = deleted_in(session.left, session.ancestor)
        .union(&deleted_in(session.right, session.ancestor))
        .cloned()
        .collect();

    for uid in deleted {
        let Some(index) = session.merged.components.iter().position(|c| c.uid == uid) else {
            continue;
        };
        let component = &session.merged.components[index];
        let reregistered = component.is_registered()
            && session
                .merged
                .components
                .iter()
                .any(|other| other.uid != uid && other.is_registered() && other.name == component.name);

        let component = session.merged.components.remove(index);
        if reregistered {
            debug!(component = %uid, name = %component.name, "Keeping re-registered component for folding");
            session.merged.components.push(component);
        } else {
            info!(component = %uid, name = %component.name, "Removing component");
            session.merged.remove_subtree(&component.root);
        }
    }
    Ok(())
}

#[instrument(skip(session))]
fn merge_component(session: &mut MergeSession<'_>, uid: &Uid) -> MergeResult<()> {
    let (Some(ancestor), Some(left), Some(right)) = (
        session.ancestor.component(uid),
        session.left.component(uid),
        session.right.component(uid),
    ) else {
        return Ok(());
    };
    let path = CanonicalPath::component(uid);

    session.merge_scalar(
        "Component",
        "name",
        path.child("name"),
        FieldTarget::ComponentName {
            component: uid.clone(),
        },
        Some(ancestor.name.clone()),
        Some(left.name.clone()),
        Some(right.name.clone()),
    )?;

    if !ancestor.is_registered() {
        let page_path = |c: &Component| c.page_path().map(str::to_string);
        session.merge_scalar(
            "Component",
            "pagePath",
            path.child("pagePath"),
            FieldTarget::PagePath {
                component: uid.clone(),
            },
            page_path(ancestor),
            page_path(left),
            page_path(right),
        )?;
    }

    merge_params(session, uid, ancestor, left, right)?;
    merge_states(session, uid, ancestor, left, right)?;
    merge_variant_set(session, Some(uid))?;
    tree::merge_tree(session, uid)
}

/// Three-way merge of a list of entities matched by id.
///
/// Entries deleted in either branch are dropped, additions are placed after
/// their preceding branch sibling. Divergent reorders keep the left order.
fn merge_keyed<T: Clone>(
    ancestor: &[T],
    left: &[T],
    right: &[T],
    key: impl Fn(&T) -> &Uid,
) -> Vec<T> {
    let ids = |items: &[T]| items.iter().map(&key).cloned().collect::<Vec<Uid>>();
    merge_order(&ids(ancestor), &ids(left), &ids(right))
        .iter()
        .filter_map(|uid| {
            [ancestor, left, right]
                .iter()
                .find_map(|items| items.iter().find(|item| key(*item) == uid))
                .cloned()
        })
        .collect()
}

/// Sort `items` by the position of their key in `order`; unknown keys go last
fn sort_by_order<T, K: PartialEq>(items: &mut [T], order: &[K], key: impl Fn(&T) -> K) {
    items.sort_by_key(|item| {
        let key = key(item);
        order.iter().position(|k| *k == key).unwrap_or(order.len())
    });
}

fn merge_params(
    session: &mut MergeSession<'_>,
    uid: &Uid,
    ancestor: &Component,
    left: &Component,
    right: &Component,
) -> MergeResult<()> {
    let params = merge_keyed(&ancestor.params, &left.params, &right.params, |p: &Param| &p.uid);
    if let Some(component) = session.merged.component_mut(uid) {
        component.params = params;
    }

    for param in &ancestor.params {
        let (Some(l), Some(r)) = (left.param(&param.uid), right.param(&param.uid)) else {
            continue;
        };
        session.merge_scalar(
            "Param",
            "name",
            CanonicalPath::component(uid)
                .child("params")
                .child(&param.uid)
                .child("name"),
            FieldTarget::ParamName {
                component: uid.clone(),
                param: param.uid.clone(),
            },
            Some(param.name.clone()),
            Some(l.name.clone()),
            Some(r.name.clone()),
        )?;
    }
    Ok(())
}

fn merge_states(
    session: &mut MergeSession<'_>,
    uid: &Uid,
    ancestor: &Component,
    left: &Component,
    right: &Component,
) -> MergeResult<()> {
    let mut states = merge_keyed(&ancestor.states, &left.states, &right.states, |s: &State| &s.uid);

    for state in states.iter_mut() {
        let find = |c: &Component| c.states.iter().find(|s| s.uid == state.uid).cloned();
        let (Some(a), Some(l), Some(r)) = (find(ancestor), find(left), find(right)) else {
            continue;
        };
        if let FieldDiff::Auto(binding) = diff_field(
            FieldPolicy::Harmless,
            &(a.node.clone(), a.implicit_state.clone()),
            &(l.node, l.implicit_state),
            &(r.node, r.implicit_state),
        ) {
            (state.node, state.implicit_state) = binding;
        }
    }
    if let Some(component) = session.merged.component_mut(uid) {
        component.states = states;
    }

    for state in &ancestor.states {
        let find = |c: &Component| c.states.iter().find(|s| s.uid == state.uid).map(|s| s.name.clone());
        let (Some(l), Some(r)) = (find(left), find(right)) else {
            continue;
        };
        session.merge_scalar(
            "State",
            "name",
            CanonicalPath::component(uid)
                .child("states")
                .child(&state.uid)
                .child("name"),
            FieldTarget::StateName {
                component: uid.clone(),
                state: state.uid.clone(),
            },
            Some(state.name.clone()),
            Some(l),
            Some(r),
        )?;
    }
    Ok(())
}

fn variants_of(doc: &Document, component: Option<&Uid>) -> Vec<Variant> {
    match component {
        Some(uid) => doc
            .component(uid)
            .map(|c| c.variants.clone())
            .unwrap_or_default(),
        None => doc.global_variants.clone(),
    }
}

/// Merge a variant declaration set by canonical key; `None` is the global set
pub(crate) fn merge_variant_set(
    session: &mut MergeSession<'_>,
    component: Option<&Uid>,
) -> MergeResult<()> {
    let ancestor = variants_of(session.ancestor, component);
    let left = variants_of(session.left, component);
    let right = variants_of(session.right, component);

    let keys = |variants: &[Variant]| -> BTreeSet<String> {
        variants.iter().map(Variant::canonical_key).collect()
    };
    let (ancestor_keys, left_keys, right_keys) = (keys(&ancestor), keys(&left), keys(&right));

    let mut merged = variants_of(&session.merged, component);
    merged.retain(|variant| {
        let key = variant.canonical_key();
        !ancestor_keys.contains(&key) || (left_keys.contains(&key) && right_keys.contains(&key))
    });

    for (source, branch) in [(Source::Left, &left), (Source::Right, &right)] {
        let origin = session.doc(source).uuid.clone();
        for variant in branch.iter() {
            let key = variant.canonical_key();
            match merged.iter().find(|existing| existing.canonical_key() == key) {
                Some(existing) if existing.uid != variant.uid => {
                    session
                        .variant_aliases
                        .insert(variant.uid.clone(), existing.uid.clone());
                }
                Some(_) => {}
                None if !ancestor_keys.contains(&key) => {
                    debug!(variant = %variant.uid, key = %key, "Adding variant");
                    clone_variant_to_target(&mut session.identities, &origin, variant, &mut merged);
                }
                None => {}
            }
        }
    }

    let key_order = |variants: &[Variant]| -> Vec<String> {
        variants.iter().map(Variant::canonical_key).collect()
    };
    let order = merge_order(&key_order(&ancestor), &key_order(&left), &key_order(&right));
    sort_by_order(&mut merged, &order, Variant::canonical_key);

    match component {
        Some(uid) => {
            if let Some(target) = session.merged.component_mut(uid) {
                target.variants = merged.clone();
            }
        }
        None => session.merged.global_variants = merged.clone(),
    }

    let base_path = match component {
        Some(uid) => CanonicalPath::component(uid).child("variants"),
        None => CanonicalPath::root().child("globalVariants"),
    };
    let name_by_key = |variants: &[Variant], key: &str| {
        variants
            .iter()
            .find(|v| v.canonical_key() == key)
            .map(|v| v.name.clone())
    };
    for variant in &merged {
        let key = variant.canonical_key();
        if !ancestor_keys.contains(&key) {
            continue;
        }
        session.merge_scalar(
            "Variant",
            "name",
            base_path.child(&key).child("name"),
            FieldTarget::VariantName {
                component: component.cloned(),
                variant: variant.uid.clone(),
            },
            name_by_key(&ancestor, &key),
            name_by_key(&left, &key),
            name_by_key(&right, &key),
        )?;
    }
    Ok(())
}
