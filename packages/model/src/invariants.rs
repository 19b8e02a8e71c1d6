//! # Structural invariants
//!
//! Checks a document for the properties every merge result must have:
//! reachable nodes form a forest, parent pointers agree with the owning
//! lists, instance arguments refer to declared params, and variant settings
//! are unique per condition key.

use crate::document::Document;
use crate::error::{ModelError, ModelResult};
use crate::ids::Uid;
use crate::node::{ArgExpr, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "kebab-case")]
pub enum InvariantViolation {
    #[error("component {component} has no root node {root}")]
    MissingRoot { component: Uid, root: Uid },

    #[error("root {root} of component {component} has a parent")]
    RootHasParent { component: Uid, root: Uid },

    #[error("node {parent} lists missing child {child}")]
    MissingChild { parent: Uid, child: Uid },

    #[error("node {node} points at parent {actual:?}, but is listed under {expected}")]
    StaleParent {
        node: Uid,
        expected: Uid,
        actual: Option<Uid>,
    },

    #[error("node {node} is owned more than once")]
    MultipleOwners { node: Uid },

    #[error("instance {node} targets missing component {component}")]
    MissingComponent { node: Uid, component: Uid },

    #[error("instance {node} has an argument for undeclared param {param}")]
    DanglingParam { node: Uid, param: Uid },

    #[error("node {node} renders slot content outside its base variant setting")]
    RenderOutsideBase { node: Uid },

    #[error("node {node} has two variant settings for {key}")]
    DuplicateVariantSetting { node: Uid, key: String },

    #[error("component id {component} is declared twice")]
    DuplicateComponent { component: Uid },
}

/// Collect every violation in `doc`. An empty result means the document is sound.
pub fn check_document(doc: &Document) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut owners: BTreeMap<Uid, usize> = BTreeMap::new();
    let mut component_ids = BTreeSet::new();

    for component in &doc.components {
        if !component_ids.insert(component.uid.clone()) {
            violations.push(InvariantViolation::DuplicateComponent {
                component: component.uid.clone(),
            });
        }

        let Some(root) = doc.node(&component.root) else {
            violations.push(InvariantViolation::MissingRoot {
                component: component.uid.clone(),
                root: component.root.clone(),
            });
            continue;
        };
        if root.parent.is_some() {
            violations.push(InvariantViolation::RootHasParent {
                component: component.uid.clone(),
                root: component.root.clone(),
            });
        }
        *owners.entry(component.root.clone()).or_default() += 1;

        let mut seen = BTreeSet::new();
        let mut stack = vec![component.root.clone()];
        while let Some(uid) = stack.pop() {
            if !seen.insert(uid.clone()) {
                continue;
            }
            let Some(node) = doc.node(&uid) else {
                continue;
            };

            for child in node.children() {
                *owners.entry(child.clone()).or_default() += 1;
                match doc.node(&child) {
                    None => violations.push(InvariantViolation::MissingChild {
                        parent: uid.clone(),
                        child,
                    }),
                    Some(child_node) => {
                        if child_node.parent.as_ref() != Some(&uid) {
                            violations.push(InvariantViolation::StaleParent {
                                node: child.clone(),
                                expected: uid.clone(),
                                actual: child_node.parent.clone(),
                            });
                        }
                        stack.push(child);
                    }
                }
            }

            if let NodeKind::Instance { component: target } = &node.kind {
                match doc.component(target) {
                    None => violations.push(InvariantViolation::MissingComponent {
                        node: uid.clone(),
                        component: target.clone(),
                    }),
                    Some(target) => {
                        for vs in &node.vsettings {
                            for arg in &vs.args {
                                if target.param(&arg.param).is_none() {
                                    violations.push(InvariantViolation::DanglingParam {
                                        node: uid.clone(),
                                        param: arg.param.clone(),
                                    });
                                }
                            }
                        }
                    }
                }
            }

            let renders_outside_base = node.vsettings.iter().skip(1).any(|vs| {
                vs.args
                    .iter()
                    .any(|arg| matches!(arg.expr, ArgExpr::Render { .. }))
            });
            if renders_outside_base {
                violations.push(InvariantViolation::RenderOutsideBase { node: uid.clone() });
            }

            let mut keys = BTreeSet::new();
            for vs in &node.vsettings {
                let key = doc.vsetting_key(Some(component), vs);
                if !keys.insert(key.clone()) {
                    violations.push(InvariantViolation::DuplicateVariantSetting {
                        node: uid.clone(),
                        key,
                    });
                }
            }
        }
    }

    for (node, count) in owners {
        if count > 1 {
            violations.push(InvariantViolation::MultipleOwners { node });
        }
    }

    violations
}

/// Fail with every violation found
pub fn assert_document(doc: &Document) -> ModelResult<()> {
    let violations = check_document(doc);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ModelError::Invariants(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Component;
    use crate::mutations::Mutation;
    use crate::node::Node;

    fn page() -> Document {
        let mut doc = Document::new("site");
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
            node: Node::container("a", "span"),
        }
        .apply(&mut doc)
        .unwrap();
        doc
    }

    #[test]
    fn test_sound_document() {
        assert!(check_document(&page()).is_empty());
    }

    #[test]
    fn test_stale_parent_is_reported() {
        let mut doc = page();
        doc.node_mut(&Uid::new("a")).unwrap().parent = None;
        let violations = check_document(&doc);
        assert!(matches!(
            violations.as_slice(),
            [InvariantViolation::StaleParent { .. }]
        ));
    }

    #[test]
    fn test_double_ownership_is_reported() {
        let mut doc = page();
        if let NodeKind::Container { children, .. } =
            &mut doc.node_mut(&Uid::new("root")).unwrap().kind
        {
            children.push(Uid::new("a"));
        }
        let violations = check_document(&doc);
        assert!(violations.contains(&InvariantViolation::MultipleOwners {
            node: Uid::new("a")
        }));
        assert!(assert_document(&doc).is_err());
    }
}
