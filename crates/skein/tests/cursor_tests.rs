//! Cursor resolution and traversal over freshly parsed trees, across both
//! storage representations.

mod common;

use common::{expr_grammar, repeat_grammar};
use skein::{ParserConfig, Term, Tree};

fn collect(tree: &Tree) -> Vec<(Option<Term>, u32, u32)> {
    let mut cursor = tree.cursor();
    let mut out = vec![(cursor.tag(), cursor.start(), cursor.end())];
    while cursor.next_node() {
        out.push((cursor.tag(), cursor.start(), cursor.end()));
    }
    out
}

#[test]
fn traversal_is_in_document_order() {
    let built = repeat_grammar();
    let parser = built.parser();
    let result = parser.parse("aaa").unwrap();
    let s = built.term("S");
    let a = built.term("a");
    assert_eq!(
        collect(&result.tree),
        vec![
            (Some(s), 0, 3),
            (Some(a), 0, 1),
            (Some(a), 1, 2),
            (Some(a), 2, 3),
        ]
    );
}

#[test]
fn traversal_is_storage_independent() {
    let built = expr_grammar();
    let as_trees = built.parser().with_config(ParserConfig {
        buffer_run_min: usize::MAX,
        ..ParserConfig::default()
    });
    let as_buffers = built.parser().with_config(ParserConfig {
        buffer_run_min: 1,
        ..ParserConfig::default()
    });
    let text = "1+2+3";
    let a = as_trees.parse(text).unwrap();
    let b = as_buffers.parse(text).unwrap();
    // The container wrapping differs, but the tagged nodes, their order,
    // and their ranges must not.
    let tags_a: Vec<_> = collect(&a.tree).into_iter().filter(|n| n.0.is_some()).collect();
    let tags_b: Vec<_> = collect(&b.tree).into_iter().filter(|n| n.0.is_some()).collect();
    assert_eq!(tags_a, tags_b);
}

#[test]
fn resolve_descends_to_the_innermost_node() {
    let built = expr_grammar();
    let parser = built.parser();
    let result = parser.parse("12+3").unwrap();
    let cursor = result.tree.resolve(1);
    assert_eq!(cursor.tag(), Some(built.term("num")));
    assert_eq!((cursor.start(), cursor.end()), (0, 2));

    let mut cursor = result.tree.resolve(2);
    assert_eq!(cursor.tag(), Some(built.term("plus")));
    assert!(cursor.goto_parent());
    assert_eq!(cursor.tag(), Some(built.term("E")));
    assert_eq!((cursor.start(), cursor.end()), (0, 4));
}

#[test]
fn sibling_navigation_walks_children() {
    let built = expr_grammar();
    let parser = built.parser();
    let result = parser.parse("1+2").unwrap();
    let mut cursor = result.tree.cursor();
    assert_eq!(cursor.tag(), Some(built.term("E")));
    assert!(cursor.goto_first_child());
    assert_eq!(cursor.tag(), Some(built.term("E")));
    assert!(cursor.goto_next_sibling());
    assert_eq!(cursor.tag(), Some(built.term("plus")));
    assert!(cursor.goto_next_sibling());
    assert_eq!(cursor.tag(), Some(built.term("E")));
    assert!(!cursor.goto_next_sibling());
    assert!(cursor.goto_parent());
    assert!(!cursor.goto_parent());
}
