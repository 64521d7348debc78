use criterion::{black_box, criterion_group, criterion_main, Criterion};
use skein::testing::{GrammarBuilder, TokenPattern};
use skein::{ChangedRange, FragmentMap, StringInput};

fn expr_parser() -> skein::Parser {
    let mut g = GrammarBuilder::new();
    let num = g.token("num", TokenPattern::class(&[('0', '9')], true));
    let plus = g.token("plus", TokenPattern::literal("+"));
    let e = g.nonterminal("E");
    g.rule(e, vec![e.into(), plus.into(), e.into()]);
    g.rule(e, vec![num.into()]);
    g.build(e).expect("expr grammar builds").parser()
}

fn expr_text(terms: usize) -> String {
    (0..terms)
        .map(|i| (i % 97).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

fn bench_full_parse(c: &mut Criterion) {
    let parser = expr_parser();
    let text = expr_text(64);
    c.bench_function("expr_parse_64_terms", |b| {
        b.iter(|| parser.parse(black_box(&text)).unwrap());
    });
}

fn bench_incremental_append(c: &mut Criterion) {
    let parser = expr_parser();
    let old_text = expr_text(64);
    let old = parser.parse(&old_text).unwrap();
    let new_text = format!("{old_text}+7");
    let change = ChangedRange {
        from_a: old_text.len() as u32,
        to_a: old_text.len() as u32,
        from_b: old_text.len() as u32,
        to_b: new_text.len() as u32,
    };
    c.bench_function("expr_incremental_append", |b| {
        b.iter(|| {
            let fragments = FragmentMap::new(&old.tree, &[change]);
            let mut input = StringInput::new(&new_text);
            parser
                .parse_with(black_box(&mut input), &[], Some(&fragments))
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_full_parse, bench_incremental_append);
criterion_main!(benches);
