//! # Post-merge repairs
//!
//! The per-component merge only looks at one field at a time, so the merged
//! document can come out with dangling references, doubly-owned nodes or
//! clashing names. Repair passes run after every component has been merged
//! (and again after each [`MergeSession::pick_side`]) to bring the document
//! back to a state that passes the model invariants.
//!
//! ## Design
//!
//! Every pass is:
//! - **Deterministic**: Iterates ids in sorted or document order only
//! - **Idempotent**: Re-running on a repaired document changes nothing
//! - **Logged**: Fixes a user might care about are recorded as [`AutoFix`]
//!
//! Passes run in registration order; [`RepairEngine::new`] registers them in
//! the order they depend on each other.

use crate::errors::MergeResult;
use crate::session::MergeSession;
use serde::{Deserialize, Serialize};
use sitediff_model::visitor::{component_dependencies, flatten_component, reachable_nodes};
use sitediff_model::{ArgExpr, Component, ComponentKind, Document, Node, NodeKind, Uid, VariantSetting};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// A change made to the merged document without asking the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fix", rename_all = "kebab-case")]
pub enum AutoFix {
    FoldedComponent {
        duplicate: Uid,
        canonical: Uid,
        name: String,
    },
    FoldedParam {
        component: Uid,
        duplicate: Uid,
        canonical: Uid,
    },
    DroppedArg {
        node: Uid,
        param: Uid,
    },
    DroppedImplicitState {
        component: Uid,
        state: Uid,
    },
    DetachedInstance {
        node: Uid,
        component: Uid,
    },
    DroppedSetting {
        node: Uid,
        variants: Vec<Uid>,
    },
    DroppedDuplicateChild {
        parent: Uid,
        child: Uid,
    },
    MaterializedSlot {
        node: Uid,
        param: Uid,
        nodes: Vec<Uid>,
    },
    PrunedNodes {
        count: usize,
    },
    RenamedComponent {
        component: Uid,
        from: String,
        to: String,
    },
    RenamedPagePath {
        component: Uid,
        from: String,
        to: String,
    },
}

fn record(session: &mut MergeSession<'_>, fix: AutoFix) {
    info!(fix = ?fix, "Auto-fix applied");
    session.auto_fixes.push(fix);
}

/// Repair applied to the merged document once the merge passes are done
pub trait RepairPass: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn run(&self, session: &mut MergeSession<'_>) -> MergeResult<()>;
}

/// Registered components sharing a name collapse onto the first one
#[derive(Debug)]
pub struct FoldDuplicateComponents;

impl RepairPass for FoldDuplicateComponents {
    fn name(&self) -> &'static str {
        "fold-duplicate-components"
    }

    fn run(&self, session: &mut MergeSession<'_>) -> MergeResult<()> {
        let mut groups: BTreeMap<String, Vec<Uid>> = BTreeMap::new();
        for component in session.merged.components.iter().filter(|c| c.is_registered()) {
            groups
                .entry(component.name.clone())
                .or_default()
                .push(component.uid.clone());
        }

        for (name, uids) in groups {
            let Some((canonical, duplicates)) = uids.split_first() else {
                continue;
            };
            for duplicate in duplicates {
                fold_component(session, duplicate, canonical, &name);
            }
        }

        let registered: Vec<Uid> = session
            .merged
            .components
            .iter()
            .filter(|c| c.is_registered())
            .map(|c| c.uid.clone())
            .collect();
        for uid in registered {
            fold_params(session, &uid);
        }
        Ok(())
    }
}

fn fold_component(session: &mut MergeSession<'_>, duplicate: &Uid, canonical: &Uid, name: &str) {
    let (Some(from), Some(to)) = (
        session.merged.component(duplicate),
        session.merged.component(canonical),
    ) else {
        return;
    };
    let params: BTreeMap<Uid, Uid> = from
        .params
        .iter()
        .filter_map(|param| {
            to.param_by_name(&param.name)
                .map(|target| (param.uid.clone(), target.uid.clone()))
        })
        .collect();
    let root = from.root.clone();

    let dropped = retarget_instances(&mut session.merged, duplicate, canonical, |param| {
        params.get(param).cloned()
    });
    for (node, param) in dropped {
        record(session, AutoFix::DroppedArg { node, param });
    }

    session.merged.remove_subtree(&root);
    session.merged.components.retain(|c| &c.uid != duplicate);
    record(
        session,
        AutoFix::FoldedComponent {
            duplicate: duplicate.clone(),
            canonical: canonical.clone(),
            name: name.to_string(),
        },
    );
}

fn fold_params(session: &mut MergeSession<'_>, uid: &Uid) {
    let Some(component) = session.merged.component(uid) else {
        return;
    };
    let mut first_by_name: BTreeMap<&str, &Uid> = BTreeMap::new();
    let mut duplicates: BTreeMap<Uid, Uid> = BTreeMap::new();
    for param in &component.params {
        match first_by_name.get(param.name.as_str()) {
            Some(first) => {
                duplicates.insert(param.uid.clone(), (*first).clone());
            }
            None => {
                first_by_name.insert(&param.name, &param.uid);
            }
        }
    }
    if duplicates.is_empty() {
        return;
    }

    if let Some(component) = session.merged.component_mut(uid) {
        component.params.retain(|p| !duplicates.contains_key(&p.uid));
    }
    for node in session.merged.nodes.values_mut() {
        if let NodeKind::Slot { param, .. } = &mut node.kind {
            if let Some(canonical) = duplicates.get(param) {
                *param = canonical.clone();
            }
        }
    }
    let dropped = retarget_instances(&mut session.merged, uid, uid, |param| {
        Some(duplicates.get(param).unwrap_or(param).clone())
    });
    for (node, param) in dropped {
        record(session, AutoFix::DroppedArg { node, param });
    }
    for (duplicate, canonical) in duplicates {
        record(
            session,
            AutoFix::FoldedParam {
                component: uid.clone(),
                duplicate,
                canonical,
            },
        );
    }
}

/// Point instances of `from` at `to`, renaming argument params through
/// `map`. Arguments without a counterpart, or mapped onto a param already
/// bound, are dropped and returned.
fn retarget_instances(
    doc: &mut Document,
    from: &Uid,
    to: &Uid,
    map: impl Fn(&Uid) -> Option<Uid>,
) -> Vec<(Uid, Uid)> {
    let mut dropped = Vec::new();
    for node in doc.nodes.values_mut() {
        match &mut node.kind {
            NodeKind::Instance { component } if component == from => *component = to.clone(),
            _ => continue,
        }
        for vs in node.vsettings.iter_mut() {
            let mut bound = BTreeSet::new();
            let args = std::mem::take(&mut vs.args);
            for mut arg in args {
                match map(&arg.param) {
                    Some(param) if bound.insert(param.clone()) => {
                        arg.param = param;
                        vs.args.push(arg);
                    }
                    _ => dropped.push((node.uid.clone(), arg.param)),
                }
            }
        }
    }
    dropped
}

/// Instances pointed at another component drop what the new target does not know
#[derive(Debug)]
pub struct CleanupSwappedInstances;

impl RepairPass for CleanupSwappedInstances {
    fn name(&self) -> &'static str {
        "cleanup-swapped-instances"
    }

    fn run(&self, session: &mut MergeSession<'_>) -> MergeResult<()> {
        let swapped: Vec<(Uid, Uid)> = session
            .merged
            .nodes
            .values()
            .filter_map(|node| {
                let target = node.instance_of()?;
                let targets: BTreeSet<&Uid> = [session.ancestor, session.left, session.right]
                    .iter()
                    .filter_map(|doc| doc.node(&node.uid).and_then(Node::instance_of))
                    .collect();
                (targets.len() > 1).then(|| (node.uid.clone(), target.clone()))
            })
            .collect();

        for (uid, target) in swapped {
            let Some(component) = session.merged.component(&target) else {
                continue;
            };
            let params: BTreeSet<Uid> = component.params.iter().map(|p| p.uid.clone()).collect();
            let states: BTreeSet<Uid> = component.states.iter().map(|s| s.uid.clone()).collect();
            debug!(node = %uid, target = %target, "Cleaning up swapped instance");

            for param in drop_args(&mut session.merged, &uid, |param| params.contains(param)) {
                record(session, AutoFix::DroppedArg { node: uid.clone(), param });
            }

            let mut dropped_states = Vec::new();
            for component in session.merged.components.iter_mut() {
                component.states.retain(|state| {
                    let stale = state.node.as_ref() == Some(&uid)
                        && state
                            .implicit_state
                            .as_ref()
                            .is_some_and(|implicit| !states.contains(implicit));
                    if stale {
                        dropped_states.push((component.uid.clone(), state.uid.clone()));
                    }
                    !stale
                });
            }
            for (component, state) in dropped_states {
                record(session, AutoFix::DroppedImplicitState { component, state });
            }
        }
        Ok(())
    }
}

/// Remove arguments of `node` whose param fails `keep`, in every setting
fn drop_args(doc: &mut Document, node: &Uid, keep: impl Fn(&Uid) -> bool) -> Vec<Uid> {
    let mut dropped = Vec::new();
    if let Some(node) = doc.node_mut(node) {
        for vs in node.vsettings.iter_mut() {
            vs.args.retain(|arg| {
                let kept = keep(&arg.param);
                if !kept {
                    dropped.push(arg.param.clone());
                }
                kept
            });
        }
    }
    dropped
}

/// Instances of deleted components, arguments for deleted params and
/// settings for deleted variants
#[derive(Debug)]
pub struct CleanupDanglingReferences;

impl RepairPass for CleanupDanglingReferences {
    fn name(&self) -> &'static str {
        "cleanup-dangling-references"
    }

    fn run(&self, session: &mut MergeSession<'_>) -> MergeResult<()> {
        let instances: Vec<(Uid, Uid)> = session
            .merged
            .nodes
            .values()
            .filter_map(|node| Some((node.uid.clone(), node.instance_of()?.clone())))
            .collect();

        for (uid, target) in instances {
            let Some(component) = session.merged.component(&target) else {
                if session.merged.node(&uid).is_some_and(|n| n.parent.is_some()) {
                    warn!(node = %uid, component = %target, "Detaching instance of deleted component");
                    session.merged.detach(&uid);
                    record(
                        session,
                        AutoFix::DetachedInstance {
                            node: uid,
                            component: target,
                        },
                    );
                }
                continue;
            };
            let params: BTreeSet<Uid> = component.params.iter().map(|p| p.uid.clone()).collect();
            for param in drop_args(&mut session.merged, &uid, |param| params.contains(param)) {
                debug!(node = %uid, param = %param, "Dropped argument for undeclared param");
                record(session, AutoFix::DroppedArg { node: uid.clone(), param });
            }
        }

        let components: Vec<Uid> = session.merged.components.iter().map(|c| c.uid.clone()).collect();
        for component in components {
            clean_settings(session, &component);
        }
        Ok(())
    }
}

/// Follow variant aliases, then drop settings on undeclared variants and
/// duplicate conditions. The base setting always stays.
fn clean_settings(session: &mut MergeSession<'_>, uid: &Uid) {
    let Some(component) = session.merged.component(uid) else {
        return;
    };
    let declared: BTreeSet<Uid> = component
        .variants
        .iter()
        .chain(session.merged.global_variants.iter())
        .map(|v| v.uid.clone())
        .collect();
    let nodes = flatten_component(&session.merged, component);

    for node in nodes {
        let Some(settings) = session
            .merged
            .node_mut(&node)
            .map(|n| std::mem::take(&mut n.vsettings))
        else {
            continue;
        };

        let owner = session.merged.component(uid);
        let mut keys = BTreeSet::new();
        let mut kept: Vec<VariantSetting> = Vec::with_capacity(settings.len());
        let mut dropped = Vec::new();
        for (index, mut vs) in settings.into_iter().enumerate() {
            for variant in vs.variants.iter_mut() {
                if let Some(alias) = session.variant_aliases.get(&*variant) {
                    *variant = alias.clone();
                }
            }
            let declared_here = vs.variants.iter().all(|v| declared.contains(v));
            let fresh_key = keys.insert(session.merged.vsetting_key(owner, &vs));
            if index == 0 || (declared_here && fresh_key) {
                kept.push(vs);
            } else {
                dropped.push(vs.variants);
            }
        }

        if let Some(target) = session.merged.node_mut(&node) {
            target.vsettings = kept;
        }
        for variants in dropped {
            record(
                session,
                AutoFix::DroppedSetting {
                    node: node.clone(),
                    variants,
                },
            );
        }
    }
}

/// Rewrite parent pointers from the owning lists
#[derive(Debug)]
pub struct NormalizeTree;

impl RepairPass for NormalizeTree {
    fn name(&self) -> &'static str {
        "normalize-tree"
    }

    fn run(&self, session: &mut MergeSession<'_>) -> MergeResult<()> {
        let doc = &mut session.merged;
        let roots: BTreeSet<Uid> = doc.components.iter().map(|c| c.root.clone()).collect();
        let existing: BTreeSet<Uid> = doc.nodes.keys().cloned().collect();

        let mut order: Vec<Uid> = doc
            .components
            .iter()
            .flat_map(|component| flatten_component(doc, component))
            .collect();
        let listed: BTreeSet<Uid> = order.iter().cloned().collect();
        order.extend(existing.iter().filter(|uid| !listed.contains(*uid)).cloned());

        let mut owners: BTreeMap<Uid, Uid> = BTreeMap::new();
        let mut duplicates = Vec::new();
        for uid in &order {
            let Some(node) = doc.node_mut(uid) else {
                continue;
            };

            for vs in node.vsettings.iter_mut().skip(1) {
                vs.args.retain(|arg| !matches!(arg.expr, ArgExpr::Render { .. }));
            }

            let mut claim = |child: &Uid| {
                if child == uid || !existing.contains(child) || roots.contains(child) {
                    return false;
                }
                if owners.contains_key(child) {
                    duplicates.push((uid.clone(), child.clone()));
                    return false;
                }
                owners.insert(child.clone(), uid.clone());
                true
            };
            if let Some(list) = node.child_list_mut() {
                list.retain(|child| claim(child));
            }
            if let Some(base) = node.base_vsetting_mut() {
                for arg in base.args.iter_mut() {
                    if let ArgExpr::Render { nodes } = &mut arg.expr {
                        nodes.retain(|child| claim(child));
                    }
                }
            }
        }

        for (uid, node) in doc.nodes.iter_mut() {
            let parent = owners.get(uid).cloned();
            if node.parent != parent {
                debug!(node = %uid, parent = ?parent, "Rewrote parent pointer");
                node.parent = parent;
            }
        }

        for (parent, child) in duplicates {
            record(session, AutoFix::DroppedDuplicateChild { parent, child });
        }
        Ok(())
    }
}

/// Replace virtual slot arguments the merge touched with a concrete copy of
/// the target's default content
#[derive(Debug)]
pub struct MaterializeVirtualSlots;

impl RepairPass for MaterializeVirtualSlots {
    fn name(&self) -> &'static str {
        "materialize-virtual-slots"
    }

    fn run(&self, session: &mut MergeSession<'_>) -> MergeResult<()> {
        // A merge with an untouched side reproduces the other side as is
        if same_content(session.ancestor, session.left) || same_content(session.ancestor, session.right) {
            return Ok(());
        }

        for component in callees_first(&session.merged) {
            let Some(owner) = session.merged.component(&component) else {
                continue;
            };
            let instances: Vec<(Uid, Uid)> = flatten_component(&session.merged, owner)
                .into_iter()
                .filter_map(|uid| {
                    let target = session.merged.node(&uid)?.instance_of()?.clone();
                    Some((uid, target))
                })
                .collect();

            for (instance, target) in instances {
                let virtual_params: Vec<Uid> = session
                    .merged
                    .node(&instance)
                    .map(|node| {
                        node.slot_args()
                            .filter(|arg| matches!(arg.expr, ArgExpr::Virtual))
                            .map(|arg| arg.param.clone())
                            .collect()
                    })
                    .unwrap_or_default();

                for param in virtual_params {
                    let touched = session.new_components.contains(&target)
                        || session.created.contains(&instance)
                        || default_content(&session.merged, &target, &param)
                            != default_content(session.ancestor, &target, &param);
                    if touched {
                        materialize(session, &component, &instance, &target, &param);
                    }
                }
            }
        }
        Ok(())
    }
}

fn same_content(a: &Document, b: &Document) -> bool {
    a.name == b.name
        && a.global_variants == b.global_variants
        && a.components == b.components
        && a.nodes == b.nodes
}

/// Component ids ordered so every component comes after the ones it instantiates
fn callees_first(doc: &Document) -> Vec<Uid> {
    fn visit(doc: &Document, component: &Component, seen: &mut BTreeSet<Uid>, out: &mut Vec<Uid>) {
        if !seen.insert(component.uid.clone()) {
            return;
        }
        for dependency in component_dependencies(doc, component) {
            if let Some(dependency) = doc.component(&dependency) {
                visit(doc, dependency, seen, out);
            }
        }
        out.push(component.uid.clone());
    }

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for component in &doc.components {
        visit(doc, component, &mut seen, &mut out);
    }
    out
}

/// The slot node of `component` that renders `param`
fn slot_node<'d>(doc: &'d Document, component: &Uid, param: &Uid) -> Option<&'d Node> {
    let component = doc.component(component)?;
    flatten_component(doc, component)
        .into_iter()
        .filter_map(|uid| doc.node(&uid))
        .find(|node| matches!(&node.kind, NodeKind::Slot { param: p, .. } if p == param))
}

fn default_content(doc: &Document, component: &Uid, param: &Uid) -> Option<Vec<Node>> {
    let slot = slot_node(doc, component, param)?;
    Some(
        slot.children()
            .iter()
            .flat_map(|root| doc.subtree(root))
            .filter_map(|uid| doc.node(&uid).cloned())
            .collect(),
    )
}

fn materialize(session: &mut MergeSession<'_>, owner: &Uid, instance: &Uid, target: &Uid, param: &Uid) {
    let roots = slot_node(&session.merged, target, param)
        .map(Node::children)
        .unwrap_or_default();

    let mut fresh: BTreeMap<Uid, Uid> = BTreeMap::new();
    let mut copied = Vec::new();
    for root in &roots {
        for uid in session.merged.subtree(root) {
            if let Some(node) = session.merged.node(&uid) {
                fresh.insert(uid.clone(), session.ids.new_id());
                copied.push(node.clone());
            }
        }
    }

    let target_variants: BTreeMap<Uid, bool> = session
        .merged
        .component(target)
        .map(|c| {
            c.variants
                .iter()
                .map(|v| (v.uid.clone(), matches!(v.kind, sitediff_model::VariantKind::Base)))
                .collect()
        })
        .unwrap_or_default();
    let owner_base = session
        .merged
        .component(owner)
        .and_then(Component::base_variant)
        .map(|v| v.uid.clone());

    let remap = |uid: &Uid| fresh.get(uid).cloned().unwrap_or_else(|| uid.clone());
    let mut nodes = Vec::new();
    for mut node in copied {
        node.uid = remap(&node.uid);
        node.parent = match &node.parent {
            Some(parent) if fresh.contains_key(parent) => Some(remap(parent)),
            _ => Some(instance.clone()),
        };
        if let Some(list) = node.child_list_mut() {
            *list = list.iter().map(&remap).collect();
        }
        node.vsettings.retain(|vs| {
            vs.variants
                .iter()
                .all(|v| target_variants.get(v).map_or(true, |is_base| *is_base))
        });
        for vs in node.vsettings.iter_mut() {
            for variant in vs.variants.iter_mut() {
                if let (Some(true), Some(base)) = (target_variants.get(&*variant), &owner_base) {
                    *variant = base.clone();
                }
            }
            for arg in vs.args.iter_mut() {
                if let ArgExpr::Render { nodes } = &mut arg.expr {
                    *nodes = nodes.iter().map(&remap).collect();
                }
            }
        }
        nodes.push(node);
    }

    let rendered: Vec<Uid> = roots.iter().map(&remap).collect();
    for node in nodes {
        session.created.insert(node.uid.clone());
        session.merged.nodes.insert(node.uid.clone(), node);
    }
    if let Some(list) = session
        .merged
        .node_mut(instance)
        .and_then(|node| node.ensure_render_arg(param))
    {
        *list = rendered.clone();
    }
    record(
        session,
        AutoFix::MaterializedSlot {
            node: instance.clone(),
            param: param.clone(),
            nodes: rendered,
        },
    );
}

/// Drop arena entries no component reaches
#[derive(Debug)]
pub struct PruneUnreachable;

impl RepairPass for PruneUnreachable {
    fn name(&self) -> &'static str {
        "prune-unreachable"
    }

    fn run(&self, session: &mut MergeSession<'_>) -> MergeResult<()> {
        let reachable = reachable_nodes(&session.merged);
        let before = session.merged.nodes.len();
        session.merged.nodes.retain(|uid, _| reachable.contains(uid));
        let count = before - session.merged.nodes.len();
        if count > 0 {
            record(session, AutoFix::PrunedNodes { count });
        }
        Ok(())
    }
}

/// Component names and page paths must be unique document-wide
#[derive(Debug)]
pub struct RepairUniqueness;

impl RepairPass for RepairUniqueness {
    fn name(&self) -> &'static str {
        "repair-uniqueness"
    }

    fn run(&self, session: &mut MergeSession<'_>) -> MergeResult<()> {
        let mut taken: BTreeSet<String> =
            session.merged.components.iter().map(|c| c.name.clone()).collect();
        let mut seen = BTreeSet::new();
        let mut renames = Vec::new();
        for component in session.merged.components.iter_mut() {
            if seen.insert(component.name.clone()) {
                continue;
            }
            let renamed = unique_name(&component.name, &taken, |n| format!("{} {}", component.name, n));
            taken.insert(renamed.clone());
            seen.insert(renamed.clone());
            renames.push(AutoFix::RenamedComponent {
                component: component.uid.clone(),
                from: std::mem::replace(&mut component.name, renamed.clone()),
                to: renamed,
            });
        }

        let mut taken: BTreeSet<String> = session
            .merged
            .components
            .iter()
            .filter_map(|c| c.page_path().map(str::to_string))
            .collect();
        let mut seen = BTreeSet::new();
        for component in session.merged.components.iter_mut() {
            let ComponentKind::Page { path } = &mut component.kind else {
                continue;
            };
            if seen.insert(path.clone()) {
                continue;
            }
            let renamed = unique_name(path, &taken, |n| format!("{}-{}", path, n));
            taken.insert(renamed.clone());
            seen.insert(renamed.clone());
            renames.push(AutoFix::RenamedPagePath {
                component: component.uid.clone(),
                from: std::mem::replace(path, renamed.clone()),
                to: renamed,
            });
        }

        for fix in renames {
            record(session, fix);
        }
        Ok(())
    }
}

fn unique_name(base: &str, taken: &BTreeSet<String>, candidate: impl Fn(usize) -> String) -> String {
    (2..)
        .map(candidate)
        .find(|name| !taken.contains(name))
        .unwrap_or_else(|| base.to_string())
}

/// Runs every registered repair pass in order
#[derive(Debug)]
pub struct RepairEngine {
    passes: Vec<Box<dyn RepairPass>>,
}

impl RepairEngine {
    /// Engine with the default passes
    pub fn new() -> Self {
        Self {
            passes: vec![
                Box::new(FoldDuplicateComponents),
                Box::new(CleanupSwappedInstances),
                Box::new(CleanupDanglingReferences),
                Box::new(NormalizeTree),
                Box::new(MaterializeVirtualSlots),
                Box::new(PruneUnreachable),
                Box::new(RepairUniqueness),
            ],
        }
    }

    /// Engine without any pass; add passes with [`RepairEngine::with_pass`]
    pub fn empty() -> Self {
        Self { passes: Vec::new() }
    }

    pub fn with_pass(mut self, pass: impl RepairPass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn run(&self, session: &mut MergeSession<'_>) -> MergeResult<()> {
        for pass in &self.passes {
            debug!(pass = pass.name(), "Running repair pass");
            pass.run(session)?;
        }
        Ok(())
    }
}

impl Default for RepairEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitediff_model::{Mutation, Param, ParamKind};

    fn registered(uid: &str, root: &str) -> Mutation {
        let mut component = Component::new(uid, "Widget", root);
        component.kind = ComponentKind::Registered;
        component.params.push(Param {
            uid: Uid::new(format!("{uid}.label")),
            name: "label".to_string(),
            kind: ParamKind::Prop,
        });
        Mutation::AddComponent {
            component,
            root: Node::container(root, "div"),
        }
    }

    #[test]
    fn test_engine_registers_passes_in_order() {
        let engine = RepairEngine::new();
        let names: Vec<&str> = engine.passes.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "fold-duplicate-components",
                "cleanup-swapped-instances",
                "cleanup-dangling-references",
                "normalize-tree",
                "materialize-virtual-slots",
                "prune-unreachable",
                "repair-uniqueness",
            ]
        );
    }

    #[test]
    fn test_retarget_remaps_params_and_drops_unmatched() {
        let mut doc = Document::new("doc");
        registered("w1", "w1root").apply(&mut doc).unwrap();
        registered("w2", "w2root").apply(&mut doc).unwrap();
        Mutation::AddComponent {
            component: Component::new("page", "Page", "root"),
            root: Node::container("root", "div"),
        }
        .apply(&mut doc)
        .unwrap();
        Mutation::InsertNode {
            parent: Uid::new("root"),
            param: None,
            index: 0,
            node: Node::instance("inst", "w2"),
        }
        .apply(&mut doc)
        .unwrap();
        for (param, value) in [("w2.label", "Hi"), ("w2.gone", "x")] {
            Mutation::SetArg {
                node: Uid::new("inst"),
                param: Uid::new(param),
                expr: ArgExpr::Value {
                    value: value.to_string(),
                },
            }
            .apply(&mut doc)
            .unwrap();
        }

        let map: BTreeMap<Uid, Uid> =
            [(Uid::new("w2.label"), Uid::new("w1.label"))].into_iter().collect();
        let dropped = retarget_instances(&mut doc, &Uid::new("w2"), &Uid::new("w1"), |p| {
            map.get(p).cloned()
        });

        let inst = doc.node(&Uid::new("inst")).unwrap();
        assert_eq!(inst.instance_of(), Some(&Uid::new("w1")));
        assert_eq!(inst.vsettings[0].args.len(), 1);
        assert_eq!(inst.vsettings[0].args[0].param, Uid::new("w1.label"));
        assert_eq!(dropped, vec![(Uid::new("inst"), Uid::new("w2.gone"))]);
    }

    #[test]
    fn test_callees_come_first() {
        let mut doc = Document::new("doc");
        for (uid, root) in [("page", "p0"), ("card", "c0")] {
            Mutation::AddComponent {
                component: Component::new(uid, uid, root),
                root: Node::container(root, "div"),
            }
            .apply(&mut doc)
            .unwrap();
        }
        Mutation::InsertNode {
            parent: Uid::new("p0"),
            param: None,
            index: 0,
            node: Node::instance("p1", "card"),
        }
        .apply(&mut doc)
        .unwrap();

        assert_eq!(callees_first(&doc), vec![Uid::new("card"), Uid::new("page")]);
    }

    #[test]
    fn test_unique_name_skips_taken() {
        let taken: BTreeSet<String> = ["Card".to_string(), "Card 2".to_string()].into_iter().collect();
        assert_eq!(unique_name("Card", &taken, |n| format!("Card {n}")), "Card 3");
    }
}
