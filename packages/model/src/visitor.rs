use crate::document::{Component, Document};
use crate::ids::Uid;
use crate::node::Node;
use std::collections::BTreeSet;

/// Visitor pattern for walking component trees through the node arena
///
/// Default implementations walk every component from its root in
/// pre-order. Each node is visited at most once per walk, so a corrupted
/// arena with cycles still terminates.
pub trait Visitor: Sized {
    fn visit_document(&mut self, doc: &Document) {
        walk_document(self, doc);
    }

    fn visit_component(&mut self, doc: &Document, component: &Component) {
        walk_component(self, doc, component);
    }

    fn visit_node(&mut self, _component: &Component, _node: &Node) {
        // Children are walked by walk_component
    }
}

pub fn walk_document<V: Visitor>(visitor: &mut V, doc: &Document) {
    for component in &doc.components {
        visitor.visit_component(doc, component);
    }
}

pub fn walk_component<V: Visitor>(visitor: &mut V, doc: &Document, component: &Component) {
    for uid in flatten_component(doc, component) {
        if let Some(node) = doc.node(&uid) {
            visitor.visit_node(component, node);
        }
    }
}

/// Pre-order ids of a component tree, starting at the root
pub fn flatten_component(doc: &Document, component: &Component) -> Vec<Uid> {
    flatten_from(doc, &component.root)
}

/// Pre-order ids reachable from `root` through owned lists
pub fn flatten_from(doc: &Document, root: &Uid) -> Vec<Uid> {
    let mut out = Vec::new();
    let mut seen = BTreeSet::new();
    let mut stack = vec![root.clone()];
    while let Some(uid) = stack.pop() {
        let Some(node) = doc.node(&uid) else {
            continue;
        };
        if !seen.insert(uid.clone()) {
            continue;
        }
        for child in node.children().into_iter().rev() {
            stack.push(child);
        }
        out.push(uid);
    }
    out
}

/// Every node reachable from some component root
pub fn reachable_nodes(doc: &Document) -> BTreeSet<Uid> {
    doc.components
        .iter()
        .flat_map(|component| flatten_component(doc, component))
        .collect()
}

/// Instances of `component` reachable from any component root
pub fn instances_of(doc: &Document, component: &Uid) -> Vec<Uid> {
    struct Collect<'a> {
        target: &'a Uid,
        found: Vec<Uid>,
    }

    impl Visitor for Collect<'_> {
        fn visit_node(&mut self, _component: &Component, node: &Node) {
            if node.instance_of() == Some(self.target) {
                self.found.push(node.uid.clone());
            }
        }
    }

    let mut collect = Collect {
        target: component,
        found: Vec::new(),
    };
    collect.visit_document(doc);
    collect.found
}

/// Components instantiated anywhere inside `component`'s tree, in tree order
pub fn component_dependencies(doc: &Document, component: &Component) -> Vec<Uid> {
    let mut seen = BTreeSet::new();
    flatten_component(doc, component)
        .iter()
        .filter_map(|uid| doc.node(uid).and_then(Node::instance_of))
        .filter(|dep| seen.insert((*dep).clone()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Arg, ArgExpr, VariantSetting};

    fn doc_with_tree() -> Document {
        let mut doc = Document::new("site");
        let mut root = Node::container("root", "div");
        let mut a = Node::container("a", "span");
        let mut b = Node::instance("b", "button");
        let mut b_base = VariantSetting::new(vec![]);
        b_base.args.push(Arg {
            param: Uid::new("children"),
            expr: ArgExpr::Render {
                nodes: vec![Uid::new("c")],
            },
        });
        b.vsettings.push(b_base);
        let mut c = Node::container("c", "text");

        if let crate::node::NodeKind::Container { children, .. } = &mut root.kind {
            children.push(Uid::new("a"));
            children.push(Uid::new("b"));
        }
        a.parent = Some(Uid::new("root"));
        b.parent = Some(Uid::new("root"));
        c.parent = Some(Uid::new("b"));

        for node in [root, a, b, c] {
            doc.nodes.insert(node.uid.clone(), node);
        }
        doc.components
            .push(Component::new("page", "Page", "root"));
        doc
    }

    #[test]
    fn test_flatten_is_preorder() {
        let doc = doc_with_tree();
        let flat = flatten_component(&doc, &doc.components[0]);
        let ids: Vec<&str> = flat.iter().map(Uid::as_str).collect();
        assert_eq!(ids, vec!["root", "a", "b", "c"]);
    }

    #[test]
    fn test_flatten_terminates_on_cycles() {
        let mut doc = doc_with_tree();
        if let crate::node::NodeKind::Container { children, .. } =
            &mut doc.node_mut(&Uid::new("a")).unwrap().kind
        {
            children.push(Uid::new("root"));
        }
        assert_eq!(flatten_component(&doc, &doc.components[0]).len(), 4);
    }

    #[test]
    fn test_instances_of() {
        let doc = doc_with_tree();
        assert_eq!(instances_of(&doc, &Uid::new("button")), vec![Uid::new("b")]);
        assert_eq!(
            component_dependencies(&doc, &doc.components[0]),
            vec![Uid::new("button")]
        );
    }
}
