//! # Documents
//!
//! A [`Document`] is the unit being merged: components, global variant
//! declarations and the node arena every component tree lives in.

use crate::ids::{get_document_id, hash_parts, Uid};
use crate::node::{Node, ParentSlot, VariantSetting};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Canonical key of the base variant, shared by every component
pub const BASE_VARIANT_KEY: &str = "base";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document tag, the origin half of every identity
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub global_variants: Vec<Variant>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub nodes: BTreeMap<Uid, Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub uid: Uid,
    pub name: String,
    #[serde(default)]
    pub kind: ComponentKind,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub states: Vec<State>,
    pub root: Uid,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ComponentKind {
    #[default]
    Plain,
    Page {
        path: String,
    },
    /// Registered from an external widget catalog, matched by name
    Registered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub uid: Uid,
    pub name: String,
    pub kind: ParamKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Slot,
    Prop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub uid: Uid,
    pub name: String,
    /// Instance node this state is exposed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<Uid>,
    /// State of the instantiated component this one mirrors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implicit_state: Option<Uid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub uid: Uid,
    pub name: String,
    pub kind: VariantKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VariantKind {
    Base,
    Global,
    Local,
    Style {
        selectors: Vec<String>,
        #[serde(default, rename = "forNode")]
        for_node: Option<Uid>,
    },
}

impl Variant {
    pub fn base(uid: impl Into<Uid>) -> Self {
        Self {
            uid: uid.into(),
            name: "base".to_string(),
            kind: VariantKind::Base,
        }
    }

    /// Identity of this variant that survives re-creation in another branch
    pub fn canonical_key(&self) -> String {
        match &self.kind {
            VariantKind::Base => BASE_VARIANT_KEY.to_string(),
            VariantKind::Global | VariantKind::Local => self.uid.to_string(),
            VariantKind::Style {
                selectors,
                for_node,
            } => {
                let mut parts: Vec<&str> = selectors.iter().map(String::as_str).collect();
                parts.sort_unstable();
                parts.push(for_node.as_ref().map(Uid::as_str).unwrap_or(""));
                format!("style:{}", hash_parts(&parts))
            }
        }
    }
}

impl Component {
    pub fn new(uid: impl Into<Uid>, name: impl Into<String>, root: impl Into<Uid>) -> Self {
        let uid = uid.into();
        let base = Variant::base(format!("{}.base", uid));
        Self {
            uid,
            name: name.into(),
            kind: ComponentKind::Plain,
            params: Vec::new(),
            variants: vec![base],
            states: Vec::new(),
            root: root.into(),
        }
    }

    pub fn base_variant(&self) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|variant| variant.kind == VariantKind::Base)
    }

    pub fn param(&self, uid: &Uid) -> Option<&Param> {
        self.params.iter().find(|param| &param.uid == uid)
    }

    pub fn param_by_name(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|param| param.name == name)
    }

    pub fn has_slot_param(&self, uid: &Uid) -> bool {
        self.param(uid)
            .map(|param| param.kind == ParamKind::Slot)
            .unwrap_or(false)
    }

    pub fn slot_params(&self) -> impl Iterator<Item = &Param> {
        self.params
            .iter()
            .filter(|param| param.kind == ParamKind::Slot)
    }

    pub fn page_path(&self) -> Option<&str> {
        match &self.kind {
            ComponentKind::Page { path } => Some(path),
            _ => None,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.kind == ComponentKind::Registered
    }
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            uuid: get_document_id(&name),
            name,
            global_variants: Vec::new(),
            components: Vec::new(),
            nodes: BTreeMap::new(),
        }
    }

    /// Copy under a new document tag. Entity ids are kept.
    pub fn fork(&self, name: &str) -> Self {
        let mut forked = self.clone();
        forked.uuid = get_document_id(name);
        forked
    }

    pub fn component(&self, uid: &Uid) -> Option<&Component> {
        self.components.iter().find(|component| &component.uid == uid)
    }

    pub fn component_mut(&mut self, uid: &Uid) -> Option<&mut Component> {
        self.components
            .iter_mut()
            .find(|component| &component.uid == uid)
    }

    pub fn has_component(&self, uid: &Uid) -> bool {
        self.component(uid).is_some()
    }

    pub fn component_uids(&self) -> BTreeSet<Uid> {
        self.components.iter().map(|c| c.uid.clone()).collect()
    }

    pub fn node(&self, uid: &Uid) -> Option<&Node> {
        self.nodes.get(uid)
    }

    pub fn node_mut(&mut self, uid: &Uid) -> Option<&mut Node> {
        self.nodes.get_mut(uid)
    }

    pub fn contains_node(&self, uid: &Uid) -> bool {
        self.nodes.contains_key(uid)
    }

    pub fn parent_slot(&self, uid: &Uid) -> ParentSlot {
        let parent = self.node(uid).and_then(|node| node.parent.clone());
        let param = parent
            .as_ref()
            .and_then(|parent| self.node(parent))
            .and_then(|parent| parent.param_holding(uid))
            .cloned();
        ParentSlot { parent, param }
    }

    /// Component whose tree contains `uid`, found by walking parent pointers
    pub fn owning_component(&self, uid: &Uid) -> Option<&Component> {
        let mut current = uid.clone();
        for _ in 0..=self.nodes.len() {
            match self.node(&current)?.parent.clone() {
                Some(parent) => current = parent,
                None => {
                    return self
                        .components
                        .iter()
                        .find(|component| component.root == current)
                }
            }
        }
        None
    }

    /// Look up a variant declared on `component` or globally
    pub fn find_variant<'a>(
        &'a self,
        component: Option<&'a Component>,
        uid: &Uid,
    ) -> Option<&'a Variant> {
        component
            .and_then(|component| component.variants.iter().find(|v| &v.uid == uid))
            .or_else(|| self.global_variants.iter().find(|v| &v.uid == uid))
    }

    /// Canonical key of a variant setting's condition set.
    /// Unknown variant ids fall back to the raw id.
    pub fn vsetting_key(&self, component: Option<&Component>, vs: &VariantSetting) -> String {
        let mut keys: Vec<String> = vs
            .variants
            .iter()
            .map(|uid| match self.find_variant(component, uid) {
                Some(variant) => variant.canonical_key(),
                None => uid.to_string(),
            })
            .collect();
        keys.sort();
        keys.dedup();
        serde_json::to_string(&keys).unwrap_or_default()
    }

    /// Base variant setting for a new node owned by `component`
    pub fn base_vsetting_for(&self, component: &Uid) -> Option<VariantSetting> {
        let base = self.component(component)?.base_variant()?;
        Some(VariantSetting::new(vec![base.uid.clone()]))
    }

    /// Unlink a node from its parent. The node stays in the arena.
    pub fn detach(&mut self, uid: &Uid) {
        let parent = match self.node_mut(uid) {
            Some(node) => node.parent.take(),
            None => return,
        };
        if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            parent.remove_child(uid);
        }
    }

    /// Ids of `uid` and everything below it
    pub fn subtree(&self, uid: &Uid) -> Vec<Uid> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![uid.clone()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.node(&current) {
                for child in node.children().into_iter().rev() {
                    stack.push(child);
                }
            }
            out.push(current);
        }
        out
    }

    /// Detach `uid` and drop it with its descendants from the arena
    pub fn remove_subtree(&mut self, uid: &Uid) {
        self.detach(uid);
        for removed in self.subtree(uid) {
            self.nodes.remove(&removed);
        }
    }
}
