//! Tests for loading documents from JSON
//!
//! Covers:
//! - Parsing a hand-written document and checking its invariants
//! - Reporting structural damage as invariant violations
//! - Mutations applied to a parsed document

use sitediff_model::{
    check_document, parse_document, to_json, ArgExpr, InvariantViolation, Mutation, NodeKind, Uid,
};

const SITE: &str = r#"{
    "uuid": "site-1",
    "name": "site",
    "components": [
        {
            "uid": "page",
            "name": "Home",
            "kind": { "type": "Page", "path": "/" },
            "variants": [{ "uid": "page.base", "name": "base", "kind": { "type": "Base" } }],
            "root": "root"
        },
        {
            "uid": "card",
            "name": "Card",
            "params": [{ "uid": "card.title", "name": "title", "kind": "prop" }],
            "variants": [{ "uid": "card.base", "name": "base", "kind": { "type": "Base" } }],
            "root": "card-root"
        }
    ],
    "nodes": {
        "root": {
            "uid": "root",
            "kind": { "type": "Container", "tag": "main", "children": ["hero"] },
            "vsettings": [{ "variants": ["page.base"] }]
        },
        "hero": {
            "uid": "hero",
            "parent": "root",
            "kind": { "type": "Instance", "component": "card" },
            "vsettings": [{
                "variants": ["page.base"],
                "args": [{ "param": "card.title", "expr": { "type": "Value", "value": "Welcome" } }]
            }]
        },
        "card-root": {
            "uid": "card-root",
            "kind": { "type": "Container", "tag": "article" },
            "vsettings": [{ "variants": ["card.base"], "styles": { "padding": "8px" } }]
        }
    }
}"#;

#[test]
fn test_parse_hand_written_document() {
    let doc = parse_document(SITE).unwrap();

    assert_eq!(doc.components.len(), 2);
    assert_eq!(doc.component(&Uid::new("page")).unwrap().page_path(), Some("/"));

    let hero = doc.node(&Uid::new("hero")).unwrap();
    assert_eq!(hero.instance_of(), Some(&Uid::new("card")));
    let title = hero.vsettings[0].arg(&Uid::new("card.title")).unwrap();
    assert_eq!(title.expr.value(), Some("Welcome"));

    assert!(check_document(&doc).is_empty());
}

#[test]
fn test_serialized_document_parses_back() {
    let doc = parse_document(SITE).unwrap();
    let json = to_json(&doc).unwrap();
    assert_eq!(parse_document(&json).unwrap(), doc);
}

#[test]
fn test_broken_links_are_reported() {
    let mut doc = parse_document(SITE).unwrap();
    doc.node_mut(&Uid::new("hero")).unwrap().parent = None;
    doc.components.retain(|c| c.uid != Uid::new("card"));

    let violations = check_document(&doc);

    assert!(violations.contains(&InvariantViolation::MissingComponent {
        node: Uid::new("hero"),
        component: Uid::new("card"),
    }));
    assert!(violations
        .iter()
        .any(|v| matches!(v, InvariantViolation::StaleParent { .. })));
}

#[test]
fn test_mutations_keep_parsed_document_valid() {
    let mut doc = parse_document(SITE).unwrap();

    Mutation::SetArg {
        node: Uid::new("hero"),
        param: Uid::new("card.title"),
        expr: ArgExpr::Value {
            value: "Hello".to_string(),
        },
    }
    .apply(&mut doc)
    .unwrap();
    Mutation::MoveNode {
        node: Uid::new("hero"),
        new_parent: Uid::new("root"),
        param: None,
        index: 0,
    }
    .apply(&mut doc)
    .unwrap();

    let hero = doc.node(&Uid::new("hero")).unwrap();
    assert_eq!(hero.vsettings[0].args.len(), 1);
    assert_eq!(hero.vsettings[0].args[0].expr.value(), Some("Hello"));
    assert!(matches!(
        &doc.node(&Uid::new("root")).unwrap().kind,
        NodeKind::Container { children, .. } if children == &vec![Uid::new("hero")]
    ));
    assert!(check_document(&doc).is_empty());
}
