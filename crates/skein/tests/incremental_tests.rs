//! Incremental reuse: edits, fragment maps, and reuse-vs-scratch parity.

mod common;

use common::expr_grammar;
use skein::{ChangedRange, FragmentMap, ParserConfig, StringInput, TreeChild};
use std::sync::Arc;

#[test]
fn appending_reuses_the_untouched_prefix() {
    let built = expr_grammar();
    let parser = built.parser();
    let old = parser.parse("1+2").unwrap();

    // Insert "+3" at the end.
    let changes = [ChangedRange {
        from_a: 3,
        to_a: 3,
        from_b: 3,
        to_b: 5,
    }];
    let fragments = FragmentMap::new(&old.tree, &changes);
    let mut input = StringInput::new("1+2+3");
    let new = parser.parse_with(&mut input, &[], Some(&fragments)).unwrap();

    assert_eq!(
        new.tree.to_sexpr(parser.tables()),
        "E(E(E(num),plus,E(num)),plus,E(num))"
    );
    assert!(new.metrics.reused_nodes >= 1);
    // The whole old expression survives as the new left operand, by
    // identity.
    match &new.tree.children()[0] {
        TreeChild::Node(left) => assert!(Arc::ptr_eq(left, &old.tree)),
        TreeChild::Buffer(_) => panic!("reused subtree must stay a node"),
    }
}

#[test]
fn reuse_matches_a_scratch_parse() {
    let built = expr_grammar();
    let parser = built.parser();
    let old_text = "1+22+333";
    let old = parser.parse(old_text).unwrap();

    // Replace "22" with "9": coordinates shrink by one.
    let changes = [ChangedRange {
        from_a: 2,
        to_a: 4,
        from_b: 2,
        to_b: 3,
    }];
    let new_text = "1+9+333";
    let fragments = FragmentMap::new(&old.tree, &changes);

    let mut input = StringInput::new(new_text);
    let incremental = parser.parse_with(&mut input, &[], Some(&fragments)).unwrap();
    let scratch = parser.parse(new_text).unwrap();

    assert_eq!(
        incremental.tree.to_sexpr(parser.tables()),
        scratch.tree.to_sexpr(parser.tables())
    );
    assert_eq!(incremental.tree.len(), scratch.tree.len());
}

#[test]
fn edits_inside_a_subtree_force_its_reparse() {
    let built = expr_grammar();
    let parser = built.parser();
    let old = parser.parse("1+2").unwrap();

    // Touch the first number: nothing starting at 0 survives.
    let changes = [ChangedRange {
        from_a: 0,
        to_a: 1,
        from_b: 0,
        to_b: 2,
    }];
    let fragments = FragmentMap::new(&old.tree, &changes);
    let mut input = StringInput::new("41+2");
    let new = parser.parse_with(&mut input, &[], Some(&fragments)).unwrap();
    assert_eq!(
        new.tree.to_sexpr(parser.tables()),
        "E(E(num),plus,E(num))"
    );
    assert_eq!(new.tree.len(), 4);
}

#[test]
fn buffers_are_atomic_for_reuse() {
    let built = expr_grammar();
    // Pack everything into buffers.
    let parser = built.parser().with_config(ParserConfig {
        buffer_run_min: 1,
        ..ParserConfig::default()
    });
    let old = parser.parse("1+2").unwrap();
    let changes = [ChangedRange {
        from_a: 3,
        to_a: 3,
        from_b: 3,
        to_b: 5,
    }];
    let fragments = FragmentMap::new(&old.tree, &changes);
    // Every small node sits in one packed buffer, and buffers are never
    // reused piecemeal.
    assert_eq!(fragments.candidate_count(), 0);

    let mut input = StringInput::new("1+2+3");
    let new = parser.parse_with(&mut input, &[], Some(&fragments)).unwrap();
    assert_eq!(new.metrics.reused_nodes, 0);
    assert_eq!(
        new.tree.to_sexpr(parser.tables()),
        "E(E(E(num),plus,E(num)),plus,E(num))"
    );
}

#[test]
fn no_edits_means_total_reuse() {
    let built = expr_grammar();
    let parser = built.parser();
    let old = parser.parse("1+2+3").unwrap();
    let fragments = FragmentMap::new(&old.tree, &[]);
    let mut input = StringInput::new("1+2+3");
    let new = parser.parse_with(&mut input, &[], Some(&fragments)).unwrap();
    assert!(new.metrics.reused_nodes >= 1);
    assert_eq!(
        new.tree.to_sexpr(parser.tables()),
        old.tree.to_sexpr(parser.tables())
    );
}
