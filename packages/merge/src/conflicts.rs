//! # Conflict descriptors
//!
//! Every mergeable field has a policy. Scalar fields are decided here by
//! comparing the ancestor with both branches; ordered lists and structural
//! fields are delegated to dedicated handlers in the other modules.
//!
//! ## Scalar decision table
//!
//! | left vs right | left vs ancestor | right vs ancestor | outcome          |
//! |---------------|------------------|-------------------|------------------|
//! | equal         | equal            | -                 | unchanged        |
//! | equal         | differs          | -                 | take the value   |
//! | differ        | equal            | -                 | take right       |
//! | differ        | -                | equal             | take left        |
//! | differ        | differs          | differs           | conflict         |
//!
//! `Harmless` fields resolve the last row to left instead of conflicting.
//!
//! ## Paths
//!
//! A conflict is addressed by a [`CanonicalPath`]: the JSON array of keys
//! from the document root to the field. Keys are entity ids and canonical
//! variant keys, never positions, so the same conflict gets the same path
//! on every run and callers can pre-resolve it through [`Picks`].

use crate::children::SlotOrder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sitediff_model::{ComponentKind, Document, NodeKind, Uid, VariantSetting};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchSide {
    Left,
    Right,
}

/// Pre-made conflict decisions keyed by canonical path
pub type Picks = BTreeMap<String, BranchSide>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    Scalar,
    OrderedList,
    Structural,
}

/// A divergence the engine could not settle on its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub path: String,
    pub kind: ConflictKind,
    pub left_value: Value,
    pub right_value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CanonicalPath(Vec<String>);

impl CanonicalPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, key: impl fmt::Display) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        Self(segments)
    }

    pub fn component(component: &Uid) -> Self {
        Self::root().child("components").child(component)
    }

    pub fn node(component: &Uid, node: &Uid) -> Self {
        Self::component(component).child("nodes").child(node)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

/// Handlers that own a non-scalar field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomHandler {
    ComponentSet,
    VariantSet,
    TreeRoot,
    TreeParent,
    VariantSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    Scalar,
    /// Divergent edits resolve to left
    Harmless,
    OrderedList,
    Custom(CustomHandler),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldDiff<T> {
    Unchanged,
    Auto(T),
    Conflict { left: T, right: T },
    /// Not decidable here; the named policy's handler owns the field
    Delegate(FieldPolicy),
}

pub fn diff_field<T: PartialEq + Clone>(
    policy: FieldPolicy,
    ancestor: &T,
    left: &T,
    right: &T,
) -> FieldDiff<T> {
    if matches!(policy, FieldPolicy::OrderedList | FieldPolicy::Custom(_)) {
        return FieldDiff::Delegate(policy);
    }

    if left == right {
        if left == ancestor {
            FieldDiff::Unchanged
        } else {
            FieldDiff::Auto(left.clone())
        }
    } else if left == ancestor {
        FieldDiff::Auto(right.clone())
    } else if right == ancestor {
        FieldDiff::Auto(left.clone())
    } else if policy == FieldPolicy::Harmless {
        FieldDiff::Auto(left.clone())
    } else {
        FieldDiff::Conflict {
            left: left.clone(),
            right: right.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub class: &'static str,
    pub field: &'static str,
    pub policy: FieldPolicy,
}

const fn entry(class: &'static str, field: &'static str, policy: FieldPolicy) -> FieldSpec {
    FieldSpec {
        class,
        field,
        policy,
    }
}

pub const FIELD_POLICIES: &[FieldSpec] = &[
    entry("Document", "name", FieldPolicy::Scalar),
    entry("Document", "components", FieldPolicy::Custom(CustomHandler::ComponentSet)),
    entry("Document", "globalVariants", FieldPolicy::Custom(CustomHandler::VariantSet)),
    entry("Component", "name", FieldPolicy::Scalar),
    entry("Component", "pagePath", FieldPolicy::Scalar),
    entry("Component", "params", FieldPolicy::OrderedList),
    entry("Component", "states", FieldPolicy::OrderedList),
    entry("Component", "variants", FieldPolicy::Custom(CustomHandler::VariantSet)),
    entry("Component", "root", FieldPolicy::Custom(CustomHandler::TreeRoot)),
    entry("Param", "name", FieldPolicy::Scalar),
    entry("State", "name", FieldPolicy::Scalar),
    entry("Variant", "name", FieldPolicy::Harmless),
    entry("Node", "name", FieldPolicy::Scalar),
    entry("Node", "tag", FieldPolicy::Scalar),
    entry("Node", "component", FieldPolicy::Scalar),
    entry("Node", "parent", FieldPolicy::Custom(CustomHandler::TreeParent)),
    entry("Node", "children", FieldPolicy::OrderedList),
    entry("Node", "vsettings", FieldPolicy::Custom(CustomHandler::VariantSettings)),
    entry("VariantSetting", "attrs", FieldPolicy::Scalar),
    entry("VariantSetting", "styles", FieldPolicy::Scalar),
    entry("VariantSetting", "text", FieldPolicy::Scalar),
    entry("VariantSetting", "args", FieldPolicy::Scalar),
];

/// Policy for `class.field`; unknown fields are scalar
pub fn field_policy(class: &str, field: &str) -> FieldPolicy {
    FIELD_POLICIES
        .iter()
        .find(|spec| spec.class == class && spec.field == field)
        .map(|spec| spec.policy)
        .unwrap_or(FieldPolicy::Scalar)
}

/// Location of a scalar value in the merged document
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldTarget {
    DocumentName,
    ComponentName { component: Uid },
    PagePath { component: Uid },
    ParamName { component: Uid, param: Uid },
    StateName { component: Uid, state: Uid },
    /// `component: None` addresses a global variant
    VariantName { component: Option<Uid>, variant: Uid },
    NodeName { node: Uid },
    NodeTag { node: Uid },
    InstanceComponent { node: Uid },
    Attr { setting: SettingRef, name: String },
    Style { setting: SettingRef, name: String },
    Text { setting: SettingRef },
    PropArg { setting: SettingRef, param: Uid },
}

/// A variant setting addressed by node and canonical condition key
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SettingRef {
    pub component: Uid,
    pub node: Uid,
    pub key: String,
}

impl SettingRef {
    fn resolve<'a>(&self, doc: &'a mut Document) -> Option<&'a mut VariantSetting> {
        let component = doc.component(&self.component);
        let index = doc
            .node(&self.node)?
            .vsettings
            .iter()
            .position(|vs| doc.vsetting_key(component, vs) == self.key)?;
        doc.node_mut(&self.node)?.vsettings.get_mut(index)
    }
}

impl FieldTarget {
    /// Store `value` in `doc`. `None` clears optional fields and map entries.
    pub(crate) fn write(&self, doc: &mut Document, value: Option<String>) {
        match self {
            FieldTarget::DocumentName => {
                if let Some(value) = value {
                    doc.name = value;
                }
            }
            FieldTarget::ComponentName { component } => {
                if let (Some(component), Some(value)) = (doc.component_mut(component), value) {
                    component.name = value;
                }
            }
            FieldTarget::PagePath { component } => {
                if let Some(component) = doc.component_mut(component) {
                    if component.kind != ComponentKind::Registered {
                        component.kind = match value {
                            Some(path) => ComponentKind::Page { path },
                            None => ComponentKind::Plain,
                        };
                    }
                }
            }
            FieldTarget::ParamName { component, param } => {
                let param = doc
                    .component_mut(component)
                    .and_then(|c| c.params.iter_mut().find(|p| &p.uid == param));
                if let (Some(param), Some(value)) = (param, value) {
                    param.name = value;
                }
            }
            FieldTarget::StateName { component, state } => {
                let state = doc
                    .component_mut(component)
                    .and_then(|c| c.states.iter_mut().find(|s| &s.uid == state));
                if let (Some(state), Some(value)) = (state, value) {
                    state.name = value;
                }
            }
            FieldTarget::VariantName { component, variant } => {
                let variants = match component {
                    Some(component) => doc.component_mut(component).map(|c| &mut c.variants),
                    None => Some(&mut doc.global_variants),
                };
                let variant = variants.and_then(|v| v.iter_mut().find(|v| &v.uid == variant));
                if let (Some(variant), Some(value)) = (variant, value) {
                    variant.name = value;
                }
            }
            FieldTarget::NodeName { node } => {
                if let Some(node) = doc.node_mut(node) {
                    node.name = value;
                }
            }
            FieldTarget::NodeTag { node } => {
                if let (Some(node), Some(value)) = (doc.node_mut(node), value) {
                    if let NodeKind::Container { tag, .. } = &mut node.kind {
                        *tag = value;
                    }
                }
            }
            FieldTarget::InstanceComponent { node } => {
                if let (Some(node), Some(value)) = (doc.node_mut(node), value) {
                    if let NodeKind::Instance { component } = &mut node.kind {
                        *component = Uid::new(value);
                    }
                }
            }
            FieldTarget::Attr { setting, name } => {
                if let Some(vs) = setting.resolve(doc) {
                    match value {
                        Some(value) => vs.attrs.insert(name.clone(), value),
                        None => vs.attrs.remove(name),
                    };
                }
            }
            FieldTarget::Style { setting, name } => {
                if let Some(vs) = setting.resolve(doc) {
                    match value {
                        Some(value) => vs.styles.insert(name.clone(), value),
                        None => vs.styles.remove(name),
                    };
                }
            }
            FieldTarget::Text { setting } => {
                if let Some(vs) = setting.resolve(doc) {
                    vs.text = value;
                }
            }
            FieldTarget::PropArg { setting, param } => {
                if let Some(vs) = setting.resolve(doc) {
                    vs.set_value_arg(param, value);
                }
            }
        }
    }
}

/// What picking a side of a pending conflict does to the merged document
#[derive(Debug, Clone)]
pub(crate) enum Resolution {
    Field {
        target: FieldTarget,
        left: Option<String>,
        right: Option<String>,
    },
    ChildOrder {
        node: Uid,
        left: Vec<Uid>,
        right: Vec<Uid>,
    },
    SlotOrder {
        node: Uid,
        left: SlotOrder,
        right: SlotOrder,
    },
    Reparent {
        component: Uid,
        node: Uid,
    },
    Reroot {
        component: Uid,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct PendingConflict {
    pub record: ConflictRecord,
    pub resolution: Resolution,
}
