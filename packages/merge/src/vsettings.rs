//! # Variant settings
//!
//! Settings of a node are matched across the inputs by their condition key
//! (the sorted canonical keys of their variants), never by position, so a
//! style variant re-created under a new id in one branch still lines up.
//!
//! Matched settings are merged property by property. The base setting's
//! slot arguments are merged as ordered lists by the child-list merger; prop
//! arguments go through the scalar rules here.

use crate::conflicts::{CanonicalPath, FieldTarget, SettingRef};
use crate::errors::MergeResult;
use crate::identity::clone_vsetting_to_target;
use crate::session::{MergeSession, Source};
use sitediff_model::{ArgExpr, Document, Uid, VariantSetting, BASE_VARIANT_KEY};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

fn keyed<'d>(doc: &'d Document, component: &Uid, node: &Uid) -> BTreeMap<String, &'d VariantSetting> {
    let owner = doc.component(component);
    let mut settings = BTreeMap::new();
    if let Some(node) = doc.node(node) {
        for vs in &node.vsettings {
            settings.entry(doc.vsetting_key(owner, vs)).or_insert(vs);
        }
    }
    settings
}

fn base_key() -> String {
    serde_json::to_string(&[BASE_VARIANT_KEY]).unwrap_or_default()
}

fn same_content(a: &VariantSetting, b: &VariantSetting) -> bool {
    a.attrs == b.attrs && a.styles == b.styles && a.text == b.text && a.args == b.args
}

pub(crate) fn merge_vsettings(
    session: &mut MergeSession<'_>,
    component: &Uid,
    node: &Uid,
) -> MergeResult<()> {
    let ancestor = keyed(session.ancestor, component, node);
    let left = keyed(session.left, component, node);
    let right = keyed(session.right, component, node);

    let keys: BTreeSet<String> = ancestor
        .keys()
        .chain(left.keys())
        .chain(right.keys())
        .cloned()
        .collect();

    for key in keys {
        let setting = SettingRef {
            component: component.clone(),
            node: node.clone(),
            key: key.clone(),
        };
        match (ancestor.get(&key), left.get(&key), right.get(&key)) {
            (Some(a), Some(l), Some(r)) => merge_fields(session, &setting, a, l, r)?,
            (Some(_), None, None) => remove_setting(session, &setting),
            (Some(a), Some(kept), None) | (Some(a), None, Some(kept)) => {
                if same_content(a, kept) {
                    remove_setting(session, &setting);
                } else {
                    debug!(node = %node, key = %key, "Keeping edited setting deleted on the other side");
                    merge_fields(session, &setting, a, a, kept)?;
                }
            }
            (None, Some(added), None) => add_setting(session, Source::Left, &setting, added)?,
            (None, None, Some(added)) => add_setting(session, Source::Right, &setting, added)?,
            (None, Some(l), Some(r)) => {
                let empty = remap_variants(session, component, Source::Left, &VariantSetting::new(l.variants.clone()));
                if let Some(merged) = session.merged.node_mut(node) {
                    merged.vsettings.push(empty.clone());
                }
                merge_fields(session, &setting, &empty, l, r)?;
            }
            (None, None, None) => {}
        }
    }
    Ok(())
}

/// Property-level merge of one matched setting
fn merge_fields(
    session: &mut MergeSession<'_>,
    setting: &SettingRef,
    ancestor: &VariantSetting,
    left: &VariantSetting,
    right: &VariantSetting,
) -> MergeResult<()> {
    let path = CanonicalPath::node(&setting.component, &setting.node)
        .child("vsettings")
        .child(&setting.key);

    let names: BTreeSet<&String> = ancestor
        .attrs
        .keys()
        .chain(left.attrs.keys())
        .chain(right.attrs.keys())
        .collect();
    for name in names {
        session.merge_scalar(
            "VariantSetting",
            "attrs",
            path.child("attrs").child(name),
            FieldTarget::Attr {
                setting: setting.clone(),
                name: name.clone(),
            },
            ancestor.attrs.get(name).cloned(),
            left.attrs.get(name).cloned(),
            right.attrs.get(name).cloned(),
        )?;
    }

    let names: BTreeSet<&String> = ancestor
        .styles
        .keys()
        .chain(left.styles.keys())
        .chain(right.styles.keys())
        .collect();
    for name in names {
        session.merge_scalar(
            "VariantSetting",
            "styles",
            path.child("styles").child(name),
            FieldTarget::Style {
                setting: setting.clone(),
                name: name.clone(),
            },
            ancestor.styles.get(name).cloned(),
            left.styles.get(name).cloned(),
            right.styles.get(name).cloned(),
        )?;
    }

    session.merge_scalar(
        "VariantSetting",
        "text",
        path.child("text"),
        FieldTarget::Text {
            setting: setting.clone(),
        },
        ancestor.text.clone(),
        left.text.clone(),
        right.text.clone(),
    )?;

    let value_of = |vs: &VariantSetting, param: &Uid| {
        vs.arg(param)
            .and_then(|arg| arg.expr.value())
            .map(str::to_string)
    };
    let params: BTreeSet<&Uid> = [ancestor, left, right]
        .into_iter()
        .flat_map(|vs| vs.args.iter())
        .filter(|arg| matches!(arg.expr, ArgExpr::Value { .. }))
        .map(|arg| &arg.param)
        .collect();
    for param in params {
        session.merge_scalar(
            "VariantSetting",
            "args",
            path.child("args").child(param),
            FieldTarget::PropArg {
                setting: setting.clone(),
                param: param.clone(),
            },
            value_of(ancestor, param),
            value_of(left, param),
            value_of(right, param),
        )?;
    }
    Ok(())
}

fn remove_setting(session: &mut MergeSession<'_>, setting: &SettingRef) {
    if setting.key == base_key() {
        return;
    }
    let owner = session.merged.component(&setting.component);
    let Some(index) = session.merged.node(&setting.node).and_then(|node| {
        node.vsettings
            .iter()
            .position(|vs| session.merged.vsetting_key(owner, vs) == setting.key)
    }) else {
        return;
    };
    if index == 0 {
        return;
    }
    if let Some(node) = session.merged.node_mut(&setting.node) {
        node.vsettings.remove(index);
        debug!(node = %setting.node, key = %setting.key, "Removed deleted setting");
    }
}

fn add_setting(
    session: &mut MergeSession<'_>,
    source: Source,
    setting: &SettingRef,
    added: &VariantSetting,
) -> MergeResult<()> {
    let source_doc = session.doc(source);
    let mut created = Vec::new();
    let cloned = clone_vsetting_to_target(
        &mut session.identities,
        source_doc,
        added,
        &mut session.merged,
        &mut created,
    )?;
    session.created.extend(created);
    let cloned = remap_variants(session, &setting.component, source, &cloned);
    if let Some(node) = session.merged.node_mut(&setting.node) {
        node.vsettings.push(cloned);
    }
    Ok(())
}

/// Point the variants of a branch setting at the merged declarations with
/// the same canonical key
pub(crate) fn remap_variants(
    session: &MergeSession<'_>,
    component: &Uid,
    source: Source,
    vs: &VariantSetting,
) -> VariantSetting {
    let source_doc = session.doc(source);
    let source_owner = source_doc.component(component);
    let merged_owner = session.merged.component(component);

    let merged_by_key: BTreeMap<String, &Uid> = merged_owner
        .into_iter()
        .flat_map(|c| c.variants.iter())
        .chain(session.merged.global_variants.iter())
        .map(|v| (v.canonical_key(), &v.uid))
        .collect();

    let mut remapped = vs.clone();
    for uid in remapped.variants.iter_mut() {
        let target = source_doc
            .find_variant(source_owner, uid)
            .and_then(|variant| merged_by_key.get(&variant.canonical_key()).copied())
            .or_else(|| session.variant_aliases.get(&*uid))
            .cloned();
        if let Some(target) = target {
            *uid = target;
        }
    }
    remapped
}
