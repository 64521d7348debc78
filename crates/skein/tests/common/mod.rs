//! Shared grammars for the integration suites.

#![allow(dead_code)]

use skein::testing::{BuiltGrammar, GrammarBuilder, TokenPattern};

/// `S → a+`, with the repetition hidden behind an untagged helper.
pub fn repeat_grammar() -> BuiltGrammar {
    let mut g = GrammarBuilder::new();
    let a = g.token("a", TokenPattern::literal("a"));
    let s = g.nonterminal("S");
    let r = g.hidden_nonterminal("R");
    g.rule(s, vec![r.into()]);
    g.rule(r, vec![r.into(), a.into()]);
    g.rule(r, vec![a.into()]);
    g.build(s).expect("repeat grammar builds")
}

/// `S → a+` with spaces skipped.
pub fn repeat_grammar_with_skip() -> BuiltGrammar {
    let mut g = GrammarBuilder::new();
    let a = g.token("a", TokenPattern::literal("a"));
    let s = g.nonterminal("S");
    let r = g.hidden_nonterminal("R");
    g.rule(s, vec![r.into()]);
    g.rule(r, vec![r.into(), a.into()]);
    g.rule(r, vec![a.into()]);
    g.skip(TokenPattern::class(&[(' ', ' ')], true));
    g.build(s).expect("repeat grammar builds")
}

/// The deliberately ambiguous `E → E "+" E | num`.
pub fn expr_grammar() -> BuiltGrammar {
    let mut g = GrammarBuilder::new();
    let num = g.token("num", TokenPattern::class(&[('0', '9')], true));
    let plus = g.token("plus", TokenPattern::literal("+"));
    let e = g.nonterminal("E");
    g.rule(e, vec![e.into(), plus.into(), e.into()]);
    g.rule(e, vec![num.into()]);
    g.build(e).expect("expr grammar builds")
}

/// Single-token grammar `W → w` where `w` is a letter run.
pub fn word_grammar() -> BuiltGrammar {
    let mut g = GrammarBuilder::new();
    let word = g.token("w", TokenPattern::class(&[('a', 'z')], true));
    let w = g.nonterminal("W");
    g.rule(w, vec![word.into()]);
    g.build(w).expect("word grammar builds")
}

/// Letter-at-a-time grammar `S → l+` for gap position tests.
pub fn letters_grammar() -> BuiltGrammar {
    let mut g = GrammarBuilder::new();
    let l = g.token("l", TokenPattern::class(&[('a', 'z')], false));
    let s = g.nonterminal("S");
    let r = g.hidden_nonterminal("R");
    g.rule(s, vec![r.into()]);
    g.rule(r, vec![r.into(), l.into()]);
    g.rule(r, vec![l.into()]);
    g.build(s).expect("letters grammar builds")
}
