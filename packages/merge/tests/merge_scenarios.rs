//! End-to-end merge scenarios
//!
//! Each test builds an ancestor document with the mutation API, forks it
//! into two branches, edits them independently and checks the merged
//! document, the pending conflicts and the recorded auto-fixes.

use sitediff_merge::{merge, AutoFix, BranchSide, CanonicalPath, ConflictKind, MergeSession, Picks};
use sitediff_model::{
    check_document, ArgExpr, Component, ComponentKind, Document, Mutation, Node, NodeKind, Param,
    ParamKind, Uid, Variant, VariantKind,
};

fn uid(raw: &str) -> Uid {
    Uid::new(raw)
}

fn apply(doc: &mut Document, mutation: Mutation) {
    mutation.apply(doc).unwrap();
}

fn insert(doc: &mut Document, parent: &str, index: usize, node: Node) {
    apply(
        doc,
        Mutation::InsertNode {
            parent: uid(parent),
            param: None,
            index,
            node,
        },
    );
}

fn move_node(doc: &mut Document, node: &str, parent: &str, index: usize) {
    apply(
        doc,
        Mutation::MoveNode {
            node: uid(node),
            new_parent: uid(parent),
            param: None,
            index,
        },
    );
}

fn set_prop(doc: &mut Document, node: &str, param: &str, value: &str) {
    apply(
        doc,
        Mutation::SetArg {
            node: uid(node),
            param: uid(param),
            expr: ArgExpr::Value {
                value: value.to_string(),
            },
        },
    );
}

fn children(doc: &Document, node: &str) -> Vec<String> {
    doc.node(&uid(node))
        .unwrap()
        .children()
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// A page whose root `div` holds three sections: a, b and c
fn ancestor() -> Document {
    let mut doc = Document::new("ancestor");
    apply(
        &mut doc,
        Mutation::AddComponent {
            component: Component::new("page", "Page", "root"),
            root: Node::container("root", "div"),
        },
    );
    for (index, id) in ["a", "b", "c"].iter().enumerate() {
        insert(&mut doc, "root", index, Node::container(*id, "section"));
    }
    doc
}

fn registered(id: &str, root: &str) -> Mutation {
    let mut component = Component::new(id, "Widget", root);
    component.kind = ComponentKind::Registered;
    component.params.push(Param {
        uid: uid(&format!("{id}.label")),
        name: "label".to_string(),
        kind: ParamKind::Prop,
    });
    Mutation::AddComponent {
        component,
        root: Node::container(root, "div"),
    }
}

#[test]
fn test_merging_identical_documents_is_identity() {
    let doc = ancestor();

    let outcome = merge(&doc, &doc, &doc, None).unwrap();

    assert!(outcome.is_clean());
    assert!(outcome.auto_fixes.is_empty());
    assert_eq!(outcome.merged.components, doc.components);
    assert_eq!(outcome.merged.nodes, doc.nodes);
}

#[test]
fn test_untouched_branch_yields_other_branch() {
    let base = ancestor();
    let left = base.fork("left");
    let mut right = base.fork("right");
    apply(
        &mut right,
        Mutation::RenameComponent {
            component: uid("page"),
            name: "Home".to_string(),
        },
    );
    apply(
        &mut right,
        Mutation::SetStyle {
            node: uid("a"),
            variants: vec![],
            property: "color".to_string(),
            value: Some("red".to_string()),
        },
    );
    move_node(&mut right, "c", "root", 0);
    insert(&mut right, "b", 0, Node::container("d", "p"));

    let outcome = merge(&base, &left, &right, None).unwrap();

    assert!(outcome.is_clean());
    assert_eq!(outcome.merged.components, right.components);
    assert_eq!(outcome.merged.nodes, right.nodes);
}

#[test]
fn test_reorder_and_insert_combine() {
    let base = ancestor();
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    move_node(&mut left, "c", "root", 1);
    insert(&mut right, "root", 3, Node::container("d", "section"));

    let outcome = merge(&base, &left, &right, None).unwrap();

    assert!(outcome.is_clean());
    assert_eq!(children(&outcome.merged, "root"), ["a", "c", "b", "d"]);
    assert_eq!(
        outcome.merged.node(&uid("d")).unwrap().parent,
        Some(uid("root"))
    );
}

#[test]
fn test_divergent_reorders_conflict_and_picks_settle_them() {
    let base = ancestor();
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    move_node(&mut left, "b", "root", 0);
    move_node(&mut right, "c", "root", 1);

    let outcome = merge(&base, &left, &right, None).unwrap();

    let path = CanonicalPath::node(&uid("page"), &uid("root"))
        .child("children")
        .to_string();
    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(outcome.conflicts[0].path, path);
    assert_eq!(outcome.conflicts[0].kind, ConflictKind::OrderedList);
    assert_eq!(outcome.conflicts[0].left_value, serde_json::json!(["b", "a", "c"]));
    assert_eq!(children(&outcome.merged, "root"), ["a", "b", "c"]);

    let mut picks = Picks::new();
    picks.insert(path, BranchSide::Left);
    let resolved = merge(&base, &left, &right, Some(&picks)).unwrap();

    assert!(resolved.is_clean());
    assert_eq!(children(&resolved.merged, "root"), ["b", "a", "c"]);
}

#[test]
fn test_pick_side_after_run() {
    let base = ancestor();
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    move_node(&mut left, "b", "root", 0);
    move_node(&mut right, "c", "root", 1);

    let mut session = MergeSession::new(&base, &left, &right);
    session.run().unwrap();
    let conflicts = session.conflicts();
    assert_eq!(conflicts.len(), 1);

    session.pick_side(&conflicts[0].path, BranchSide::Right).unwrap();
    assert!(session.conflicts().is_empty());
    assert!(session.pick_side(&conflicts[0].path, BranchSide::Left).is_err());

    let outcome = session.finish();
    assert_eq!(children(&outcome.merged, "root"), ["a", "c", "b"]);
}

#[test]
fn test_divergent_moves_conflict_and_right_pick_moves_node() {
    let base = ancestor();
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    move_node(&mut left, "c", "a", 0);
    move_node(&mut right, "c", "b", 0);

    let outcome = merge(&base, &left, &right, None).unwrap();

    let path = CanonicalPath::node(&uid("page"), &uid("c"))
        .child("parent")
        .to_string();
    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(outcome.conflicts[0].path, path);
    assert_eq!(outcome.conflicts[0].kind, ConflictKind::Structural);
    assert_eq!(children(&outcome.merged, "root"), ["a", "b", "c"]);

    let mut picks = Picks::new();
    picks.insert(path, BranchSide::Right);
    let resolved = merge(&base, &left, &right, Some(&picks)).unwrap();

    assert!(resolved.is_clean());
    assert_eq!(children(&resolved.merged, "root"), ["a", "b"]);
    assert_eq!(children(&resolved.merged, "b"), ["c"]);
    assert_eq!(resolved.merged.node(&uid("c")).unwrap().parent, Some(uid("b")));
}

#[test]
fn test_crossed_moves_are_repaired_instead_of_cycling() {
    let base = ancestor();
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    move_node(&mut left, "b", "a", 0);
    move_node(&mut right, "a", "b", 0);

    let outcome = merge(&base, &left, &right, None).unwrap();

    assert!(outcome.is_clean());
    assert!(check_document(&outcome.merged).is_empty());
    assert_eq!(children(&outcome.merged, "root"), ["a", "c"]);
    assert_eq!(children(&outcome.merged, "a"), ["b"]);
}

#[test]
fn test_divergent_renames_conflict() {
    let base = ancestor();
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    for (doc, name) in [(&mut left, "Landing"), (&mut right, "Home")] {
        apply(
            doc,
            Mutation::RenameComponent {
                component: uid("page"),
                name: name.to_string(),
            },
        );
    }

    let outcome = merge(&base, &left, &right, None).unwrap();

    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(outcome.conflicts[0].kind, ConflictKind::Scalar);
    assert_eq!(outcome.conflicts[0].left_value, serde_json::json!("Landing"));
    assert_eq!(outcome.merged.component(&uid("page")).unwrap().name, "Page");

    let mut picks = Picks::new();
    picks.insert(outcome.conflicts[0].path.clone(), BranchSide::Right);
    let resolved = merge(&base, &left, &right, Some(&picks)).unwrap();
    assert_eq!(resolved.merged.component(&uid("page")).unwrap().name, "Home");
}

#[test]
fn test_edits_to_different_properties_merge() {
    let base = ancestor();
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    apply(
        &mut left,
        Mutation::SetStyle {
            node: uid("a"),
            variants: vec![],
            property: "color".to_string(),
            value: Some("red".to_string()),
        },
    );
    apply(
        &mut right,
        Mutation::SetText {
            node: uid("a"),
            variants: vec![],
            text: Some("Hello".to_string()),
        },
    );

    let outcome = merge(&base, &left, &right, None).unwrap();

    assert!(outcome.is_clean());
    let base_setting = &outcome.merged.node(&uid("a")).unwrap().vsettings[0];
    assert_eq!(base_setting.styles.get("color").map(String::as_str), Some("red"));
    assert_eq!(base_setting.text.as_deref(), Some("Hello"));
}

#[test]
fn test_style_variant_added_on_both_sides_is_shared() {
    let base = ancestor();
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    for (doc, variant, property, value) in [
        (&mut left, "hover-l", "color", "red"),
        (&mut right, "hover-r", "background", "blue"),
    ] {
        apply(
            doc,
            Mutation::AddVariant {
                component: Some(uid("page")),
                variant: Variant {
                    uid: uid(variant),
                    name: "hover".to_string(),
                    kind: VariantKind::Style {
                        selectors: vec![":hover".to_string()],
                        for_node: Some(uid("a")),
                    },
                },
            },
        );
        apply(
            doc,
            Mutation::SetStyle {
                node: uid("a"),
                variants: vec![uid(variant)],
                property: property.to_string(),
                value: Some(value.to_string()),
            },
        );
    }

    let outcome = merge(&base, &left, &right, None).unwrap();

    assert!(outcome.is_clean());
    let page = outcome.merged.component(&uid("page")).unwrap();
    assert_eq!(page.variants.len(), 2);
    let a = outcome.merged.node(&uid("a")).unwrap();
    assert_eq!(a.vsettings.len(), 2);
    assert_eq!(a.vsettings[1].variants, vec![uid("hover-l")]);
    assert_eq!(a.vsettings[1].styles.get("color").map(String::as_str), Some("red"));
    assert_eq!(a.vsettings[1].styles.get("background").map(String::as_str), Some("blue"));
}

/// The three-section page with a `:hover` setting on `a`
fn hover_ancestor() -> Document {
    let mut doc = ancestor();
    apply(
        &mut doc,
        Mutation::AddVariant {
            component: Some(uid("page")),
            variant: Variant {
                uid: uid("hover"),
                name: "hover".to_string(),
                kind: VariantKind::Style {
                    selectors: vec![":hover".to_string()],
                    for_node: Some(uid("a")),
                },
            },
        },
    );
    set_hover_color(&mut doc, "red");
    doc
}

fn set_hover_color(doc: &mut Document, value: &str) {
    apply(
        doc,
        Mutation::SetStyle {
            node: uid("a"),
            variants: vec![uid("hover")],
            property: "color".to_string(),
            value: Some(value.to_string()),
        },
    );
}

fn drop_hover_setting(doc: &mut Document) {
    doc.node_mut(&uid("a"))
        .unwrap()
        .vsettings
        .retain(|vs| !vs.variants.contains(&uid("hover")));
}

#[test]
fn test_setting_removed_on_both_sides_is_removed() {
    let base = hover_ancestor();
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    drop_hover_setting(&mut left);
    drop_hover_setting(&mut right);

    let outcome = merge(&base, &left, &right, None).unwrap();

    assert!(outcome.is_clean());
    let a = outcome.merged.node(&uid("a")).unwrap();
    assert_eq!(a.vsettings.len(), 1);
    assert!(a.vsettings[0].variants.iter().all(|v| v != &uid("hover")));
}

#[test]
fn test_setting_removed_on_one_side_and_untouched_on_the_other_is_removed() {
    let base = hover_ancestor();
    let left = base.fork("left");
    let mut right = base.fork("right");
    drop_hover_setting(&mut right);

    let outcome = merge(&base, &left, &right, None).unwrap();

    assert!(outcome.is_clean());
    let a = outcome.merged.node(&uid("a")).unwrap();
    assert_eq!(a.vsettings.len(), 1);
    assert!(a.vsettings[0].variants.iter().all(|v| v != &uid("hover")));
}

#[test]
fn test_setting_removed_on_one_side_and_edited_on_the_other_is_kept() {
    let base = hover_ancestor();
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    drop_hover_setting(&mut left);
    set_hover_color(&mut right, "blue");

    let outcome = merge(&base, &left, &right, None).unwrap();

    assert!(outcome.is_clean());
    let a = outcome.merged.node(&uid("a")).unwrap();
    assert_eq!(a.vsettings.len(), 2);
    let hover = a
        .vsettings
        .iter()
        .find(|vs| vs.variants == vec![uid("hover")])
        .unwrap();
    assert_eq!(hover.styles.get("color").map(String::as_str), Some("blue"));
}

#[test]
fn test_deleting_a_node_wins_over_editing_it() {
    let base = ancestor();
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    apply(&mut left, Mutation::RemoveNode { node: uid("a") });
    apply(
        &mut right,
        Mutation::SetText {
            node: uid("a"),
            variants: vec![],
            text: Some("kept?".to_string()),
        },
    );

    let outcome = merge(&base, &left, &right, None).unwrap();

    assert!(outcome.is_clean());
    assert!(!outcome.merged.contains_node(&uid("a")));
    assert_eq!(children(&outcome.merged, "root"), ["b", "c"]);
}

#[test]
fn test_duplicate_registered_components_fold_onto_first() {
    let mut base = ancestor();
    apply(&mut base, registered("w1", "w1-root"));
    insert(&mut base, "root", 3, Node::instance("i1", "w1"));
    set_prop(&mut base, "i1", "w1.label", "Hi");

    let mut left = base.fork("left");
    apply(&mut left, registered("w2", "w2-root"));
    let mut right = base.fork("right");
    apply(&mut right, registered("w3", "w3-root"));
    insert(&mut right, "root", 4, Node::instance("i2", "w3"));
    set_prop(&mut right, "i2", "w3.label", "Yo");

    let outcome = merge(&base, &left, &right, None).unwrap();

    let widgets: Vec<&Uid> = outcome
        .merged
        .components
        .iter()
        .filter(|c| c.is_registered())
        .map(|c| &c.uid)
        .collect();
    assert_eq!(widgets, vec![&uid("w1")]);

    let i2 = outcome.merged.node(&uid("i2")).unwrap();
    assert_eq!(i2.instance_of(), Some(&uid("w1")));
    assert_eq!(i2.vsettings[0].args.len(), 1);
    assert_eq!(i2.vsettings[0].args[0].param, uid("w1.label"));
    assert!(outcome.auto_fixes.contains(&AutoFix::FoldedComponent {
        duplicate: uid("w3"),
        canonical: uid("w1"),
        name: "Widget".to_string(),
    }));
}

#[test]
fn test_reregistered_component_takes_over_instances() {
    let mut base = ancestor();
    apply(&mut base, registered("w1", "w1-root"));
    insert(&mut base, "root", 3, Node::instance("i1", "w1"));
    set_prop(&mut base, "i1", "w1.label", "Hi");

    let mut left = base.fork("left");
    apply(&mut left, Mutation::RemoveComponent { component: uid("w1") });
    apply(&mut left, registered("w2", "w2-root"));
    let mut right = base.fork("right");
    set_prop(&mut right, "i1", "w1.label", "Yo");

    let outcome = merge(&base, &left, &right, None).unwrap();

    assert!(outcome.is_clean());
    assert!(!outcome.merged.has_component(&uid("w1")));
    let i1 = outcome.merged.node(&uid("i1")).unwrap();
    assert_eq!(i1.instance_of(), Some(&uid("w2")));
    assert_eq!(i1.vsettings[0].args[0].param, uid("w2.label"));
    assert_eq!(i1.vsettings[0].args.len(), 1);
    assert_eq!(i1.vsettings[0].args[0].expr.value(), Some("Yo"));
}

#[test]
fn test_clashing_pages_are_renamed() {
    let mut base = ancestor();
    apply(
        &mut base,
        Mutation::SetPagePath {
            component: uid("page"),
            path: "/".to_string(),
        },
    );
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    for (doc, id) in [(&mut left, "about"), (&mut right, "contact")] {
        let root = format!("{id}-root");
        apply(
            doc,
            Mutation::AddComponent {
                component: Component::new(id, "About", root.as_str()),
                root: Node::container(root.as_str(), "main"),
            },
        );
        apply(
            doc,
            Mutation::SetPagePath {
                component: uid(id),
                path: "/about".to_string(),
            },
        );
    }

    let outcome = merge(&base, &left, &right, None).unwrap();

    let mut paths: Vec<&str> = outcome
        .merged
        .components
        .iter()
        .filter_map(Component::page_path)
        .collect();
    paths.sort_unstable();
    assert_eq!(paths, vec!["/", "/about", "/about-2"]);

    let mut names: Vec<&str> = outcome.merged.components.iter().map(|c| c.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["About", "About 2", "Page"]);

    let renamed_paths = outcome
        .auto_fixes
        .iter()
        .filter(|fix| matches!(fix, AutoFix::RenamedPagePath { .. }))
        .count();
    assert_eq!(renamed_paths, 1);
}

/// `ancestor()` plus a card component with a `body` slot, instantiated on
/// the page with a virtual argument
fn card_site() -> Document {
    let mut doc = ancestor();
    let mut card = Component::new("card", "Card", "card-root");
    card.params.push(Param {
        uid: uid("card.body"),
        name: "body".to_string(),
        kind: ParamKind::Slot,
    });
    apply(
        &mut doc,
        Mutation::AddComponent {
            component: card,
            root: Node::container("card-root", "div"),
        },
    );
    insert(&mut doc, "card-root", 0, Node::slot("s", "card.body"));
    insert(&mut doc, "s", 0, Node::container("t1", "p"));
    insert(&mut doc, "root", 3, Node::instance("i", "card"));
    apply(
        &mut doc,
        Mutation::SetArg {
            node: uid("i"),
            param: uid("card.body"),
            expr: ArgExpr::Virtual,
        },
    );
    doc
}

#[test]
fn test_virtual_slot_is_materialized_when_defaults_change() {
    let base = card_site();
    let mut left = base.fork("left");
    insert(&mut left, "s", 1, Node::container("t2", "p"));
    let mut right = base.fork("right");
    apply(
        &mut right,
        Mutation::RenameComponent {
            component: uid("page"),
            name: "Home".to_string(),
        },
    );

    let outcome = merge(&base, &left, &right, None).unwrap();

    let i = outcome.merged.node(&uid("i")).unwrap();
    let rendered = i.slot_arg(&uid("card.body")).unwrap().expr.nodes().to_vec();
    assert_eq!(rendered.len(), 2);
    for node in &rendered {
        assert!(node != &uid("t1") && node != &uid("t2"));
        assert_eq!(outcome.merged.node(node).unwrap().parent, Some(uid("i")));
    }
    assert_eq!(children(&outcome.merged, "s"), ["t1", "t2"]);
    assert!(outcome
        .auto_fixes
        .iter()
        .any(|fix| matches!(fix, AutoFix::MaterializedSlot { node, .. } if node == &uid("i"))));
}

#[test]
fn test_virtual_slot_stays_virtual_in_one_sided_merge() {
    let base = card_site();
    let mut left = base.fork("left");
    insert(&mut left, "s", 1, Node::container("t2", "p"));
    let right = base.fork("right");

    let outcome = merge(&base, &left, &right, None).unwrap();

    let i = outcome.merged.node(&uid("i")).unwrap();
    assert_eq!(i.slot_arg(&uid("card.body")).unwrap().expr, ArgExpr::Virtual);
    assert_eq!(outcome.merged.nodes, left.nodes);
}

#[test]
fn test_swapped_instance_drops_foreign_arguments() {
    let mut base = ancestor();
    for (id, param) in [("card", "title"), ("badge", "label")] {
        let mut component = Component::new(id, id, format!("{id}-root"));
        component.params.push(Param {
            uid: uid(&format!("{id}.{param}")),
            name: param.to_string(),
            kind: ParamKind::Prop,
        });
        apply(
            &mut base,
            Mutation::AddComponent {
                component,
                root: Node::container(format!("{id}-root"), "div"),
            },
        );
    }
    insert(&mut base, "root", 3, Node::instance("i", "card"));
    set_prop(&mut base, "i", "card.title", "T");

    let mut left = base.fork("left");
    apply(
        &mut left,
        Mutation::SwapComponent {
            node: uid("i"),
            component: uid("badge"),
        },
    );
    let mut right = base.fork("right");
    apply(
        &mut right,
        Mutation::SetStyle {
            node: uid("a"),
            variants: vec![],
            property: "margin".to_string(),
            value: Some("0".to_string()),
        },
    );

    let outcome = merge(&base, &left, &right, None).unwrap();

    let i = outcome.merged.node(&uid("i")).unwrap();
    assert_eq!(i.instance_of(), Some(&uid("badge")));
    assert!(i.vsettings[0].args.is_empty());
    assert!(outcome.auto_fixes.contains(&AutoFix::DroppedArg {
        node: uid("i"),
        param: uid("card.title"),
    }));
}

/// Make `wrapper` the page root, with the old root as its only child
fn wrap_root(doc: &mut Document, wrapper: &str) {
    let mut node = Node::container(wrapper, "main");
    node.vsettings.push(doc.base_vsetting_for(&uid("page")).unwrap());
    if let NodeKind::Container { children, .. } = &mut node.kind {
        children.push(uid("root"));
    }
    doc.nodes.insert(uid(wrapper), node);
    doc.node_mut(&uid("root")).unwrap().parent = Some(uid(wrapper));
    doc.component_mut(&uid("page")).unwrap().root = uid(wrapper);
}

#[test]
fn test_competing_new_roots_conflict() {
    let base = ancestor();
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    wrap_root(&mut left, "left-root");
    wrap_root(&mut right, "right-root");

    let mut session = MergeSession::new(&base, &left, &right);
    session.run().unwrap();

    let path = CanonicalPath::component(&uid("page")).child("root").to_string();
    let conflicts = session.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].path, path);
    assert_eq!(conflicts[0].kind, ConflictKind::Structural);
    assert_eq!(session.merged().component(&uid("page")).unwrap().root, uid("root"));

    session.pick_side(&path, BranchSide::Left).unwrap();
    let outcome = session.finish();

    assert_eq!(outcome.merged.component(&uid("page")).unwrap().root, uid("left-root"));
    assert_eq!(
        outcome.merged.node(&uid("root")).unwrap().parent,
        Some(uid("left-root"))
    );
    assert!(!outcome.merged.contains_node(&uid("right-root")));
    assert!(check_document(&outcome.merged).is_empty());
}

#[test]
fn test_wrapping_a_node_in_a_new_container() {
    let base = ancestor();
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    insert(&mut left, "root", 0, Node::container("w", "div"));
    move_node(&mut left, "a", "w", 0);
    apply(
        &mut right,
        Mutation::RenameComponent {
            component: uid("page"),
            name: "Home".to_string(),
        },
    );

    let outcome = merge(&base, &left, &right, None).unwrap();

    assert!(outcome.is_clean());
    let merged = &outcome.merged;
    assert_eq!(children(merged, "root"), vec!["w", "b", "c"]);
    assert_eq!(children(merged, "w"), vec!["a"]);
    assert_eq!(merged.node(&uid("a")).unwrap().parent, Some(uid("w")));
    assert_eq!(merged.component(&uid("page")).unwrap().name, "Home");
    assert!(check_document(merged).is_empty());
}

#[test]
fn test_extracting_nodes_into_a_new_component() {
    let base = ancestor();
    let mut left = base.fork("left");
    let mut right = base.fork("right");
    apply(
        &mut left,
        Mutation::AddComponent {
            component: Component::new("hero", "Hero", "hero-root"),
            root: Node::container("hero-root", "div"),
        },
    );
    move_node(&mut left, "a", "hero-root", 0);
    apply(
        &mut right,
        Mutation::RenameComponent {
            component: uid("page"),
            name: "Home".to_string(),
        },
    );

    let outcome = merge(&base, &left, &right, None).unwrap();

    assert!(outcome.is_clean());
    let merged = &outcome.merged;
    assert_eq!(children(merged, "hero-root"), vec!["a"]);
    assert_eq!(children(merged, "root"), vec!["b", "c"]);
    assert_eq!(merged.node(&uid("a")).unwrap().parent, Some(uid("hero-root")));
}
