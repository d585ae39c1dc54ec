use criterion::{criterion_group, criterion_main, Criterion};

use ll_core::driver::ActionInvocation;
use ll_core::grammar::Terminal;
use ll_core::{generate_table_from_ruleset, GeneratorKind};

fn ll1_nested_token_stream_parsing(c: &mut Criterion) {
    let grammar = "
%%
s : 'a' s 'b'
  |
  ;
";

    let bundle = generate_table_from_ruleset(GeneratorKind::Ll1, grammar).unwrap();
    let open = bundle
        .grammar
        .terminal_mapping(&Terminal::new("a"))
        .unwrap();
    let close = bundle
        .grammar
        .terminal_mapping(&Terminal::new("b"))
        .unwrap();

    const DEPTH: usize = 256;
    let tokens = std::iter::repeat((open, ()))
        .take(DEPTH)
        .chain(std::iter::repeat((close, ())).take(DEPTH))
        .collect::<Vec<_>>();

    c.bench_function("ll1 nested token stream parsing", |b| {
        b.iter(|| {
            let mut parser = bundle.parser(|_: ActionInvocation, _: &[()]| Ok(()));
            let res = parser.parse(tokens.iter().copied());

            assert_eq!(res, Ok(None))
        });
    });
}

criterion_group!(benches, ll1_nested_token_stream_parsing);
criterion_main!(benches);
