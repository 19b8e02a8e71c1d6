//! # Template nodes
//!
//! Nodes live in a per-document arena keyed by [`Uid`]. Each node keeps a
//! parent back-reference and lists the ids it owns, so ownership can be
//! rewired without touching the rest of the tree.
//!
//! ## Ownership
//!
//! - `Container` owns its `children`
//! - `Slot` owns its `default_contents`
//! - `Instance` owns the nodes of its slot arguments, which live in the
//!   base variant setting (always the first entry of `vsettings`)

use crate::ids::Uid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub uid: Uid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub parent: Option<Uid>,

    pub kind: NodeKind,

    #[serde(default)]
    pub vsettings: Vec<VariantSetting>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    Container {
        tag: String,
        #[serde(default)]
        children: Vec<Uid>,
    },
    Slot {
        param: Uid,
        #[serde(default, rename = "defaultContents")]
        default_contents: Vec<Uid>,
    },
    Instance {
        component: Uid,
    },
}

/// Property bag that applies while every variant in `variants` is active
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VariantSetting {
    pub variants: Vec<Uid>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub styles: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arg {
    pub param: Uid,
    pub expr: ArgExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ArgExpr {
    /// Concrete slot content
    Render {
        #[serde(default)]
        nodes: Vec<Uid>,
    },
    /// Inherit the target component's default slot content
    Virtual,
    /// Prop binding
    Value { value: String },
}

impl ArgExpr {
    pub fn is_slot(&self) -> bool {
        matches!(self, ArgExpr::Render { .. } | ArgExpr::Virtual)
    }

    pub fn nodes(&self) -> &[Uid] {
        match self {
            ArgExpr::Render { nodes } => nodes,
            _ => &[],
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            ArgExpr::Value { value } => Some(value),
            _ => None,
        }
    }
}

/// Where a node hangs: its parent and, under an instance, the slot param
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParentSlot {
    pub parent: Option<Uid>,
    pub param: Option<Uid>,
}

impl VariantSetting {
    pub fn new(variants: Vec<Uid>) -> Self {
        Self {
            variants,
            ..Default::default()
        }
    }

    pub fn arg(&self, param: &Uid) -> Option<&Arg> {
        self.args.iter().find(|arg| &arg.param == param)
    }

    /// Set or clear a prop binding
    pub fn set_value_arg(&mut self, param: &Uid, value: Option<String>) {
        match value {
            Some(value) => match self.args.iter_mut().find(|arg| &arg.param == param) {
                Some(arg) => arg.expr = ArgExpr::Value { value },
                None => self.args.push(Arg {
                    param: param.clone(),
                    expr: ArgExpr::Value { value },
                }),
            },
            None => self
                .args
                .retain(|arg| !(&arg.param == param && matches!(arg.expr, ArgExpr::Value { .. }))),
        }
    }
}

impl Node {
    pub fn container(uid: impl Into<Uid>, tag: impl Into<String>) -> Self {
        Self::with_kind(
            uid,
            NodeKind::Container {
                tag: tag.into(),
                children: Vec::new(),
            },
        )
    }

    pub fn slot(uid: impl Into<Uid>, param: impl Into<Uid>) -> Self {
        Self::with_kind(
            uid,
            NodeKind::Slot {
                param: param.into(),
                default_contents: Vec::new(),
            },
        )
    }

    pub fn instance(uid: impl Into<Uid>, component: impl Into<Uid>) -> Self {
        Self::with_kind(
            uid,
            NodeKind::Instance {
                component: component.into(),
            },
        )
    }

    fn with_kind(uid: impl Into<Uid>, kind: NodeKind) -> Self {
        Self {
            uid: uid.into(),
            name: None,
            parent: None,
            kind,
            vsettings: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.kind, NodeKind::Instance { .. })
    }

    /// Component this node instantiates
    pub fn instance_of(&self) -> Option<&Uid> {
        match &self.kind {
            NodeKind::Instance { component } => Some(component),
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Container { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn base_vsetting(&self) -> Option<&VariantSetting> {
        self.vsettings.first()
    }

    pub fn base_vsetting_mut(&mut self) -> Option<&mut VariantSetting> {
        self.vsettings.first_mut()
    }

    /// The ordered list a container or slot owns directly
    pub fn child_list(&self) -> Option<&Vec<Uid>> {
        match &self.kind {
            NodeKind::Container { children, .. } => Some(children),
            NodeKind::Slot {
                default_contents, ..
            } => Some(default_contents),
            NodeKind::Instance { .. } => None,
        }
    }

    pub fn child_list_mut(&mut self) -> Option<&mut Vec<Uid>> {
        match &mut self.kind {
            NodeKind::Container { children, .. } => Some(children),
            NodeKind::Slot {
                default_contents, ..
            } => Some(default_contents),
            NodeKind::Instance { .. } => None,
        }
    }

    /// Slot arguments of an instance, in declaration order
    pub fn slot_args(&self) -> impl Iterator<Item = &Arg> {
        let is_instance = self.is_instance();
        self.vsettings
            .first()
            .into_iter()
            .flat_map(|vs| vs.args.iter())
            .filter(move |arg| is_instance && arg.expr.is_slot())
    }

    pub fn slot_arg(&self, param: &Uid) -> Option<&Arg> {
        self.slot_args().find(|arg| &arg.param == param)
    }

    /// Every node id this node owns, in order
    pub fn children(&self) -> Vec<Uid> {
        match self.child_list() {
            Some(list) => list.clone(),
            None => self
                .slot_args()
                .flat_map(|arg| arg.expr.nodes().iter().cloned())
                .collect(),
        }
    }

    pub fn contains_child(&self, uid: &Uid) -> bool {
        match self.child_list() {
            Some(list) => list.contains(uid),
            None => self.slot_args().any(|arg| arg.expr.nodes().contains(uid)),
        }
    }

    /// Slot param whose argument holds `uid`
    pub fn param_holding(&self, uid: &Uid) -> Option<&Uid> {
        self.slot_args()
            .find(|arg| arg.expr.nodes().contains(uid))
            .map(|arg| &arg.param)
    }

    /// Remove `uid` from every list this node owns. Returns whether it was found.
    pub fn remove_child(&mut self, uid: &Uid) -> bool {
        let mut found = false;
        if let Some(list) = self.child_list_mut() {
            let before = list.len();
            list.retain(|child| child != uid);
            found |= list.len() != before;
        }
        for vs in &mut self.vsettings {
            for arg in &mut vs.args {
                if let ArgExpr::Render { nodes } = &mut arg.expr {
                    let before = nodes.len();
                    nodes.retain(|child| child != uid);
                    found |= nodes.len() != before;
                }
            }
        }
        found
    }

    /// Render list of the base argument for `param`, created if missing.
    /// Virtual and value arguments are turned into an empty render list.
    pub fn ensure_render_arg(&mut self, param: &Uid) -> Option<&mut Vec<Uid>> {
        if !self.is_instance() {
            return None;
        }
        let base = self.vsettings.first_mut()?;
        let index = match base.args.iter().position(|arg| &arg.param == param) {
            Some(index) => index,
            None => {
                base.args.push(Arg {
                    param: param.clone(),
                    expr: ArgExpr::Render { nodes: Vec::new() },
                });
                base.args.len() - 1
            }
        };
        let arg = &mut base.args[index];
        if !matches!(arg.expr, ArgExpr::Render { .. }) {
            arg.expr = ArgExpr::Render { nodes: Vec::new() };
        }
        match &mut arg.expr {
            ArgExpr::Render { nodes } => Some(nodes),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance_with_args() -> Node {
        let mut node = Node::instance("i1", "button");
        let mut base = VariantSetting::new(vec![Uid::new("root.base")]);
        base.args.push(Arg {
            param: Uid::new("children"),
            expr: ArgExpr::Render {
                nodes: vec![Uid::new("a"), Uid::new("b")],
            },
        });
        base.args.push(Arg {
            param: Uid::new("label"),
            expr: ArgExpr::Value {
                value: "Go".to_string(),
            },
        });
        node.vsettings.push(base);
        node
    }

    #[test]
    fn test_instance_children_come_from_slot_args() {
        let node = instance_with_args();
        assert_eq!(node.children(), vec![Uid::new("a"), Uid::new("b")]);
        assert_eq!(node.param_holding(&Uid::new("b")), Some(&Uid::new("children")));
        assert!(node.slot_arg(&Uid::new("label")).is_none());
    }

    #[test]
    fn test_remove_child_from_instance() {
        let mut node = instance_with_args();
        assert!(node.remove_child(&Uid::new("a")));
        assert!(!node.remove_child(&Uid::new("a")));
        assert_eq!(node.children(), vec![Uid::new("b")]);
    }

    #[test]
    fn test_ensure_render_arg_replaces_virtual() {
        let mut node = Node::instance("i1", "card");
        let mut base = VariantSetting::new(vec![]);
        base.args.push(Arg {
            param: Uid::new("body"),
            expr: ArgExpr::Virtual,
        });
        node.vsettings.push(base);

        node.ensure_render_arg(&Uid::new("body"))
            .unwrap()
            .push(Uid::new("x"));

        assert_eq!(node.children(), vec![Uid::new("x")]);
    }

    #[test]
    fn test_containers_have_no_render_args() {
        let mut node = Node::container("div", "div");
        node.vsettings.push(VariantSetting::new(vec![]));
        assert!(node.ensure_render_arg(&Uid::new("p")).is_none());
    }

    #[test]
    fn test_node_kind_json_shape() {
        let node = Node::slot("s1", "children");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"]["type"], "Slot");
        assert_eq!(json["kind"]["param"], "children");
    }
}
