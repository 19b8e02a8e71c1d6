//! # Document Mutations
//!
//! Semantic edits on a [`Document`]. Branches handed to the merge engine are
//! produced by applying these to a fork of the ancestor.
//!
//! ## Semantics
//!
//! ### InsertNode / MoveNode
//! - `param` selects the slot argument when the parent is an instance
//! - Index is clamped to the list length
//! - Fails if the move would create a cycle
//!
//! ### RemoveNode
//! - Removes the node and all descendants from the arena
//!
//! ### Set*
//! - `variants` picks the variant setting; empty means the base one
//! - A missing setting is created, `None` values clear the entry

use crate::document::{Component, Document, Param, Variant};
use crate::ids::Uid;
use crate::node::{ArgExpr, Node, NodeKind, VariantSetting};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Mutation {
    AddComponent {
        component: Component,
        root: Node,
    },
    RemoveComponent {
        component: Uid,
    },
    RenameComponent {
        component: Uid,
        name: String,
    },
    SetPagePath {
        component: Uid,
        path: String,
    },
    AddParam {
        component: Uid,
        param: Param,
    },
    RemoveParam {
        component: Uid,
        param: Uid,
    },
    /// Declare a variant on a component, or globally when `component` is `None`
    AddVariant {
        component: Option<Uid>,
        variant: Variant,
    },
    InsertNode {
        parent: Uid,
        param: Option<Uid>,
        index: usize,
        node: Node,
    },
    MoveNode {
        node: Uid,
        new_parent: Uid,
        param: Option<Uid>,
        index: usize,
    },
    RemoveNode {
        node: Uid,
    },
    RenameNode {
        node: Uid,
        name: Option<String>,
    },
    SetAttribute {
        node: Uid,
        #[serde(default)]
        variants: Vec<Uid>,
        name: String,
        value: Option<String>,
    },
    SetStyle {
        node: Uid,
        #[serde(default)]
        variants: Vec<Uid>,
        property: String,
        value: Option<String>,
    },
    SetText {
        node: Uid,
        #[serde(default)]
        variants: Vec<Uid>,
        text: Option<String>,
    },
    /// Set a virtual or value argument on an instance
    SetArg {
        node: Uid,
        param: Uid,
        expr: ArgExpr,
    },
    /// Point an instance at another component
    SwapComponent {
        node: Uid,
        component: Uid,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Node not found: {0}")]
    NodeNotFound(Uid),

    #[error("Parent not found: {0}")]
    ParentNotFound(Uid),

    #[error("Component not found: {0}")]
    ComponentNotFound(Uid),

    #[error("Would create cycle")]
    CycleDetected,

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Node is not an instance")]
    NotAnInstance,
}

impl Mutation {
    /// Apply mutation to the document with validation
    pub fn apply(&self, doc: &mut Document) -> Result<(), MutationError> {
        self.validate(doc)?;

        match self {
            Mutation::AddComponent { component, root } => {
                let mut root = root.clone();
                root.parent = None;
                doc.components.push(component.clone());
                Self::insert_into_arena(doc, &component.uid, root);
                Ok(())
            }

            Mutation::RemoveComponent { component } => {
                let index = doc
                    .components
                    .iter()
                    .position(|c| &c.uid == component)
                    .ok_or_else(|| MutationError::ComponentNotFound(component.clone()))?;
                let removed = doc.components.remove(index);
                doc.remove_subtree(&removed.root);
                Ok(())
            }

            Mutation::RenameComponent { component, name } => {
                Self::component_mut(doc, component)?.name = name.clone();
                Ok(())
            }

            Mutation::SetPagePath { component, path } => {
                Self::component_mut(doc, component)?.kind =
                    crate::document::ComponentKind::Page { path: path.clone() };
                Ok(())
            }

            Mutation::AddParam { component, param } => {
                Self::component_mut(doc, component)?
                    .params
                    .push(param.clone());
                Ok(())
            }

            Mutation::RemoveParam { component, param } => {
                Self::component_mut(doc, component)?
                    .params
                    .retain(|p| &p.uid != param);
                Ok(())
            }

            Mutation::AddVariant { component, variant } => {
                match component {
                    Some(component) => Self::component_mut(doc, component)?
                        .variants
                        .push(variant.clone()),
                    None => doc.global_variants.push(variant.clone()),
                }
                Ok(())
            }

            Mutation::InsertNode {
                parent,
                param,
                index,
                node,
            } => {
                let owner = doc
                    .owning_component(parent)
                    .map(|c| c.uid.clone())
                    .ok_or_else(|| MutationError::ParentNotFound(parent.clone()))?;
                let uid = node.uid.clone();
                Self::insert_into_arena(doc, &owner, node.clone());
                Self::attach(doc, &uid, parent, param.as_ref(), *index)
            }

            Mutation::MoveNode {
                node,
                new_parent,
                param,
                index,
            } => {
                doc.detach(node);
                Self::attach(doc, node, new_parent, param.as_ref(), *index)
            }

            Mutation::RemoveNode { node } => {
                doc.remove_subtree(node);
                Ok(())
            }

            Mutation::RenameNode { node, name } => {
                Self::node_mut(doc, node)?.name = name.clone();
                Ok(())
            }

            Mutation::SetAttribute {
                node,
                variants,
                name,
                value,
            } => {
                let vs = Self::vsetting_mut(doc, node, variants)?;
                match value {
                    Some(value) => vs.attrs.insert(name.clone(), value.clone()),
                    None => vs.attrs.remove(name),
                };
                Ok(())
            }

            Mutation::SetStyle {
                node,
                variants,
                property,
                value,
            } => {
                let vs = Self::vsetting_mut(doc, node, variants)?;
                match value {
                    Some(value) => vs.styles.insert(property.clone(), value.clone()),
                    None => vs.styles.remove(property),
                };
                Ok(())
            }

            Mutation::SetText {
                node,
                variants,
                text,
            } => {
                Self::vsetting_mut(doc, node, variants)?.text = text.clone();
                Ok(())
            }

            Mutation::SetArg { node, param, expr } => {
                let vs = Self::vsetting_mut(doc, node, &[])?;
                vs.args.retain(|arg| &arg.param != param);
                vs.args.push(crate::node::Arg {
                    param: param.clone(),
                    expr: expr.clone(),
                });
                Ok(())
            }

            Mutation::SwapComponent { node, component } => {
                match &mut Self::node_mut(doc, node)?.kind {
                    NodeKind::Instance { component: target } => *target = component.clone(),
                    _ => return Err(MutationError::NotAnInstance),
                }
                Ok(())
            }
        }
    }

    /// Validate without applying
    pub fn validate(&self, doc: &Document) -> Result<(), MutationError> {
        match self {
            Mutation::AddComponent { component, root } => {
                if doc.has_component(&component.uid) {
                    return Err(MutationError::InvalidStructure(format!(
                        "component {} already exists",
                        component.uid
                    )));
                }
                if root.uid != component.root {
                    return Err(MutationError::InvalidStructure(
                        "root node does not match component root".to_string(),
                    ));
                }
                Self::check_fresh(doc, root)
            }

            Mutation::RemoveComponent { component }
            | Mutation::RenameComponent { component, .. }
            | Mutation::SetPagePath { component, .. }
            | Mutation::AddParam { component, .. }
            | Mutation::RemoveParam { component, .. }
            | Mutation::AddVariant {
                component: Some(component),
                ..
            } => {
                if doc.has_component(component) {
                    Ok(())
                } else {
                    Err(MutationError::ComponentNotFound(component.clone()))
                }
            }

            Mutation::AddVariant {
                component: None, ..
            } => Ok(()),

            Mutation::InsertNode {
                parent,
                param,
                node,
                ..
            } => {
                Self::check_fresh(doc, node)?;
                Self::check_parent(doc, parent, param.as_ref())
            }

            Mutation::MoveNode {
                node,
                new_parent,
                param,
                ..
            } => {
                if !doc.contains_node(node) {
                    return Err(MutationError::NodeNotFound(node.clone()));
                }
                Self::check_parent(doc, new_parent, param.as_ref())?;
                if Self::would_create_cycle(doc, node, new_parent) {
                    return Err(MutationError::CycleDetected);
                }
                Ok(())
            }

            Mutation::RemoveNode { node }
            | Mutation::RenameNode { node, .. }
            | Mutation::SetAttribute { node, .. }
            | Mutation::SetStyle { node, .. }
            | Mutation::SetText { node, .. } => {
                if doc.contains_node(node) {
                    Ok(())
                } else {
                    Err(MutationError::NodeNotFound(node.clone()))
                }
            }

            Mutation::SetArg { node, expr, .. } => {
                let target = doc
                    .node(node)
                    .ok_or_else(|| MutationError::NodeNotFound(node.clone()))?;
                if !target.is_instance() {
                    return Err(MutationError::NotAnInstance);
                }
                if !expr.nodes().is_empty() {
                    return Err(MutationError::InvalidStructure(
                        "render arguments are filled through InsertNode".to_string(),
                    ));
                }
                Ok(())
            }

            Mutation::SwapComponent { node, component } => {
                if !doc.has_component(component) {
                    return Err(MutationError::ComponentNotFound(component.clone()));
                }
                match doc.node(node) {
                    Some(target) if target.is_instance() => Ok(()),
                    Some(_) => Err(MutationError::NotAnInstance),
                    None => Err(MutationError::NodeNotFound(node.clone())),
                }
            }
        }
    }

    fn check_fresh(doc: &Document, node: &Node) -> Result<(), MutationError> {
        if doc.contains_node(&node.uid) {
            return Err(MutationError::InvalidStructure(format!(
                "node {} already exists",
                node.uid
            )));
        }
        if !node.children().is_empty() {
            return Err(MutationError::InvalidStructure(
                "inserted nodes must not own children".to_string(),
            ));
        }
        Ok(())
    }

    fn check_parent(doc: &Document, parent: &Uid, param: Option<&Uid>) -> Result<(), MutationError> {
        let parent_node = doc
            .node(parent)
            .ok_or_else(|| MutationError::ParentNotFound(parent.clone()))?;
        match (&parent_node.kind, param) {
            (NodeKind::Instance { component }, Some(param)) => {
                let target = doc
                    .component(component)
                    .ok_or_else(|| MutationError::ComponentNotFound(component.clone()))?;
                if target.has_slot_param(param) {
                    Ok(())
                } else {
                    Err(MutationError::InvalidStructure(format!(
                        "{} is not a slot of {}",
                        param, target.name
                    )))
                }
            }
            (NodeKind::Instance { .. }, None) => Err(MutationError::InvalidStructure(
                "instance children need a slot param".to_string(),
            )),
            (_, Some(_)) => Err(MutationError::InvalidStructure(
                "only instances take a slot param".to_string(),
            )),
            (_, None) => Ok(()),
        }
    }

    fn would_create_cycle(doc: &Document, node: &Uid, new_parent: &Uid) -> bool {
        let mut current = Some(new_parent.clone());
        for _ in 0..=doc.nodes.len() {
            match current {
                Some(uid) if &uid == node => return true,
                Some(uid) => current = doc.node(&uid).and_then(|n| n.parent.clone()),
                None => return false,
            }
        }
        true
    }

    fn insert_into_arena(doc: &mut Document, owner: &Uid, mut node: Node) {
        if node.vsettings.is_empty() {
            if let Some(base) = doc.base_vsetting_for(owner) {
                node.vsettings.push(base);
            }
        }
        doc.nodes.insert(node.uid.clone(), node);
    }

    fn attach(
        doc: &mut Document,
        uid: &Uid,
        parent: &Uid,
        param: Option<&Uid>,
        index: usize,
    ) -> Result<(), MutationError> {
        let parent_node = doc
            .node_mut(parent)
            .ok_or_else(|| MutationError::ParentNotFound(parent.clone()))?;
        let list = match param {
            Some(param) => parent_node.ensure_render_arg(param),
            None => parent_node.child_list_mut(),
        }
        .ok_or_else(|| {
            MutationError::InvalidStructure("Parent cannot have children".to_string())
        })?;
        list.insert(index.min(list.len()), uid.clone());

        let node = Self::node_mut(doc, uid)?;
        node.parent = Some(parent.clone());
        Ok(())
    }

    fn component_mut<'a>(doc: &'a mut Document, uid: &Uid) -> Result<&'a mut Component, MutationError> {
        doc.component_mut(uid)
            .ok_or_else(|| MutationError::ComponentNotFound(uid.clone()))
    }

    fn node_mut<'a>(doc: &'a mut Document, uid: &Uid) -> Result<&'a mut Node, MutationError> {
        doc.node_mut(uid)
            .ok_or_else(|| MutationError::NodeNotFound(uid.clone()))
    }

    fn vsetting_mut<'a>(
        doc: &'a mut Document,
        uid: &Uid,
        variants: &[Uid],
    ) -> Result<&'a mut VariantSetting, MutationError> {
        let node = Self::node_mut(doc, uid)?;
        if variants.is_empty() {
            return node
                .vsettings
                .first_mut()
                .ok_or_else(|| MutationError::InvalidStructure("node has no base setting".to_string()));
        }

        let mut wanted = variants.to_vec();
        wanted.sort();
        let index = match node.vsettings.iter().position(|vs| {
            let mut have = vs.variants.clone();
            have.sort();
            have == wanted
        }) {
            Some(index) => index,
            None => {
                node.vsettings.push(VariantSetting::new(variants.to_vec()));
                node.vsettings.len() - 1
            }
        };
        Ok(&mut node.vsettings[index])
    }
}
