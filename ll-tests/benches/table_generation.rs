use criterion::{criterion_group, criterion_main, Criterion};

fn ll1_table_generation_from_known_grammar(c: &mut Criterion) {
    let grammar = "
%token NUM IDENT STRING
%%
value : STRING
      | expr
      | '[' values ']'
      | '{' key_values '}'
      ;
values : value more_values
       |
       ;
more_values : ',' value more_values
            |
            ;
key_values : STRING ':' value more_key_values
           |
           ;
more_key_values : ',' STRING ':' value more_key_values
                |
                ;
expr : term expr_rest ;
expr_rest : '+' term expr_rest
          | '-' term expr_rest
          |
          ;
term : factor term_rest ;
term_rest : '*' factor term_rest
          | '/' factor term_rest
          |
          ;
factor : NUM
       | IDENT
       | '(' expr ')'
       ;
";

    c.bench_function("ll1 table generation", |b| {
        b.iter(|| {
            let bundle =
                ll_core::generate_table_from_ruleset(ll_core::GeneratorKind::Ll1, grammar)
                    .unwrap();

            assert_eq!(bundle.diagnostics().count(), 0)
        });
    });
}

criterion_group!(benches, ll1_table_generation_from_known_grammar);
criterion_main!(benches);
