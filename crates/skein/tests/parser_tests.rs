//! Core GLR parsing behavior: repetition, skip tokens, ambiguity
//! tie-breaks, and the always-reduce/default-reduce interactions.

mod common;

use common::{expr_grammar, repeat_grammar, repeat_grammar_with_skip};
use skein::table::{action, NO_ALWAYS_REDUCE};
use skein::{ConflictPreference, Parser, ParserConfig};

#[test]
fn parses_simple_repetition() {
    let built = repeat_grammar();
    let parser = built.parser();
    let result = parser.parse("aaa").unwrap();
    assert_eq!(result.tree.to_sexpr(parser.tables()), "S(a,a,a)");
    assert_eq!(result.tree.len(), 3);
}

#[test]
fn leaf_positions_follow_the_input() {
    let built = repeat_grammar();
    let parser = built.parser();
    let result = parser.parse("aaa").unwrap();
    for pos in 0..3 {
        let cursor = result.tree.resolve(pos);
        assert_eq!(cursor.tag(), Some(built.term("a")));
        assert_eq!(cursor.start(), pos);
        assert_eq!(cursor.end(), pos + 1);
    }
}

#[test]
fn skip_tokens_stay_out_of_the_tree() {
    let built = repeat_grammar_with_skip();
    let parser = built.parser();
    let spaced = parser.parse("a a").unwrap();
    let dense = parser.parse("aa").unwrap();
    assert_eq!(
        spaced.tree.to_sexpr(parser.tables()),
        dense.tree.to_sexpr(parser.tables())
    );
    // Positions still reflect the skipped space.
    let cursor = spaced.tree.resolve(2);
    assert_eq!(cursor.start(), 2);
    assert_eq!(spaced.tree.len(), 3);
}

#[test]
fn ambiguous_plus_is_left_associative_by_default() {
    let built = expr_grammar();
    let parser = built.parser();
    let result = parser.parse("1+2+3").unwrap();
    assert_eq!(
        result.tree.to_sexpr(parser.tables()),
        "E(E(E(num),plus,E(num)),plus,E(num))"
    );
    assert!(result.metrics.forks > 0);
}

#[test]
fn conflict_preference_flips_associativity() {
    let built = expr_grammar();
    let parser = built.parser().with_config(ParserConfig {
        conflict_preference: ConflictPreference::Shift,
        ..ParserConfig::default()
    });
    let result = parser.parse("1+2+3").unwrap();
    assert_eq!(
        result.tree.to_sexpr(parser.tables()),
        "E(E(num),plus,E(E(num),plus,E(num)))"
    );
}

#[test]
fn single_token_input_reduces_cleanly() {
    let built = expr_grammar();
    let parser = built.parser();
    let result = parser.parse("42").unwrap();
    assert_eq!(result.tree.to_sexpr(parser.tables()), "E(num)");
}

/// A state carrying both an unconditional reduce and shift actions must
/// tokenize and prefer the shift; the reduce only fires when the token
/// matches nothing.
#[test]
fn always_reduce_yields_to_a_matching_shift() {
    // S → A b | A;  A → a.  The state after A has a shift on `b` and a
    // reduce on end-of-input; rewrite the reduce as an unconditional one.
    let mut g = skein::testing::GrammarBuilder::new();
    let a = g.token("a", skein::testing::TokenPattern::literal("a"));
    let b = g.token("b", skein::testing::TokenPattern::literal("b"));
    let s = g.nonterminal("S");
    let nt_a = g.nonterminal("A");
    g.rule(s, vec![nt_a.into(), b.into()]);
    g.rule(s, vec![nt_a.into()]);
    g.rule(nt_a, vec![a.into()]);
    let mut built = g.build(s).unwrap();

    let term_b = built.term("b");
    let reduce_to_s = action::reduce(1, built.term("S"));
    for state in built.tables.states.iter_mut() {
        let shifts_b = state
            .actions_for(term_b)
            .iter()
            .any(|&(_, a)| action::is_shift(a));
        if shifts_b && state.actions.iter().any(|&(_, a)| a == reduce_to_s) {
            state.actions = state
                .actions
                .iter()
                .copied()
                .filter(|&(_, a)| a != reduce_to_s)
                .collect();
            state.always_reduce = reduce_to_s;
        }
    }

    let parser = Parser::new(built.tables.clone()).unwrap();
    // With a matching terminal the shift wins over the unconditional reduce.
    let with_b = parser.parse("ab").unwrap();
    assert_eq!(with_b.tree.to_sexpr(parser.tables()), "S(A(a),b)");
    // Without one, the unconditional reduce still completes the parse.
    let without_b = parser.parse("a").unwrap();
    assert_eq!(without_b.tree.to_sexpr(parser.tables()), "S(A(a))");
}

/// `default_reduce` applies when the next token matches no action.
#[test]
fn default_reduce_catches_unmatched_tokens() {
    let mut g = skein::testing::GrammarBuilder::new();
    let a = g.token("a", skein::testing::TokenPattern::literal("a"));
    let s = g.nonterminal("S");
    g.rule(s, vec![a.into()]);
    let mut built = g.build(s).unwrap();

    let reduce_to_s = action::reduce(1, built.term("S"));
    for state in built.tables.states.iter_mut() {
        if state.actions.iter().any(|&(_, act)| act == reduce_to_s) {
            state.actions = state
                .actions
                .iter()
                .copied()
                .filter(|&(_, act)| act != reduce_to_s)
                .collect();
            state.always_reduce = NO_ALWAYS_REDUCE;
            state.default_reduce = reduce_to_s;
        }
    }

    let parser = Parser::new(built.tables.clone()).unwrap();
    let result = parser.parse("a").unwrap();
    assert_eq!(result.tree.to_sexpr(parser.tables()), "S(a)");
}

#[test]
fn epsilon_rules_reduce_at_depth_zero() {
    // S → a T;  T → b | ε.
    let mut g = skein::testing::GrammarBuilder::new();
    let a = g.token("a", skein::testing::TokenPattern::literal("a"));
    let b = g.token("b", skein::testing::TokenPattern::literal("b"));
    let s = g.nonterminal("S");
    let t = g.nonterminal("T");
    g.rule(s, vec![a.into(), t.into()]);
    g.rule(t, vec![b.into()]);
    g.rule(t, vec![]);
    let built = g.build(s).unwrap();
    let parser = built.parser();

    let full = parser.parse("ab").unwrap();
    assert_eq!(full.tree.to_sexpr(parser.tables()), "S(a,T(b))");

    let empty = parser.parse("a").unwrap();
    assert_eq!(empty.tree.to_sexpr(parser.tables()), "S(a,T)");
    // The empty T sits at the end of the input, zero-width.
    let cursor = empty.tree.resolve(0);
    assert_eq!(cursor.tag(), Some(built.term("a")));
}

#[test]
fn tagged_skip_tokens_stay_in_the_tree() {
    let mut g = skein::testing::GrammarBuilder::new();
    let a = g.token("a", skein::testing::TokenPattern::literal("a"));
    let s = g.nonterminal("S");
    let r = g.hidden_nonterminal("R");
    g.rule(s, vec![r.into()]);
    g.rule(r, vec![r.into(), a.into()]);
    g.rule(r, vec![a.into()]);
    g.tagged_skip("comment", skein::testing::TokenPattern::literal(";"));
    let built = g.build(s).unwrap();
    let parser = built.parser();
    let result = parser.parse("a;a").unwrap();
    assert_eq!(result.tree.to_sexpr(parser.tables()), "S(a,comment,a)");
    assert_eq!(result.tree.len(), 3);
}

#[test]
fn deterministic_across_runs() {
    let built = expr_grammar();
    let parser = built.parser();
    let first = parser.parse("1+2+3+4").unwrap();
    let second = parser.parse("1+2+3+4").unwrap();
    assert_eq!(
        first.tree.to_sexpr(parser.tables()),
        second.tree.to_sexpr(parser.tables())
    );
    assert_eq!(first.metrics.steps, second.metrics.steps);
    assert_eq!(first.metrics.forks, second.metrics.forks);
}

#[test]
fn tree_covers_the_whole_input() {
    let built = expr_grammar();
    let parser = built.parser();
    for text in ["1", "1+2", "1+2+3", "12+345"] {
        let result = parser.parse(text).unwrap();
        assert_eq!(result.tree.len() as usize, text.len(), "input {text:?}");
    }
}
