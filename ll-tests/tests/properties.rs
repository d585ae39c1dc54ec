use proptest::prelude::*;

use ll_core::driver::ActionInvocation;
use ll_core::grammar::{load_grammar, NonTerminal, NonTerminalRef, SymbolRef, Terminal, TerminalRef};
use ll_core::ll::{
    build_first_sets, build_follow_sets, find_nullable_non_terminals, Ll1, LlTableGenerator,
};
use ll_core::{generate_table_from_ruleset, GeneratorKind};

/// Builds a right-linear chain grammar over distinct literal terminals:
/// each nonterminal derives its terminal followed by the next link, and the
/// flagged nonterminals additionally derive the empty sequence.
fn chain_grammar(epsilon_flags: &[bool]) -> String {
    let links = epsilon_flags.len();
    let mut grammar = String::from("%%\n");

    for (idx, &nullable) in epsilon_flags.iter().enumerate() {
        let terminal = (b'a' + idx as u8) as char;
        let rest = if idx + 1 < links {
            format!(" n{}", idx + 1)
        } else {
            String::new()
        };

        grammar.push_str(&format!("n{} : '{}'{}\n", idx, terminal, rest));
        if nullable {
            grammar.push_str("   |\n");
        }
        grammar.push_str("   ;\n");
    }

    grammar
}

fn epsilon_flags() -> impl Strategy<Value = Vec<bool>> {
    proptest::collection::vec(any::<bool>(), 1..8)
}

proptest! {
    #[test]
    fn first_of_every_terminal_is_itself(flags in epsilon_flags()) {
        let grammar = load_grammar(chain_grammar(&flags)).unwrap().grammar;
        let nullable = find_nullable_non_terminals(&grammar);
        let first = build_first_sets(&grammar, &nullable);

        for (id, _) in grammar.terminals().enumerate() {
            let terminal = TerminalRef::from(id);
            let set = first.set(&SymbolRef::Terminal(terminal)).unwrap();

            prop_assert_eq!(set.len(), 1);
            prop_assert!(set.contains(&terminal));
        }
    }

    #[test]
    fn nullability_matches_the_epsilon_alternatives(flags in epsilon_flags()) {
        let grammar = load_grammar(chain_grammar(&flags)).unwrap().grammar;
        let nullable = find_nullable_non_terminals(&grammar);

        for (idx, &has_epsilon) in flags.iter().enumerate() {
            let name = format!("n{}", idx);
            let non_terminal = grammar
                .non_terminal_mapping(&NonTerminal::new(&name))
                .unwrap();

            prop_assert_eq!(nullable.contains(&non_terminal), has_epsilon, "{}", name);
        }
    }

    #[test]
    fn follow_of_every_nullable_nonterminal_contains_end_of_input(flags in epsilon_flags()) {
        let grammar = load_grammar(chain_grammar(&flags)).unwrap().grammar;
        let nullable = find_nullable_non_terminals(&grammar);
        let first = build_first_sets(&grammar, &nullable);
        let follow = build_follow_sets(&grammar, &nullable, &first);

        let eof = grammar.eof_terminal_ref();
        for non_terminal in &nullable {
            let set = follow.set(&SymbolRef::NonTerminal(*non_terminal)).unwrap();

            prop_assert!(set.contains(&eof), "nonterminal {}", non_terminal);
        }
    }

    #[test]
    fn table_generation_is_deterministic(flags in epsilon_flags()) {
        let grammar = load_grammar(chain_grammar(&flags)).unwrap().grammar;
        let first = Ll1::generate_table(&grammar).unwrap();
        let second = Ll1::generate_table(&grammar).unwrap();

        let non_terminal_count = grammar.non_terminals().count();
        let terminal_count = grammar.terminals().count();
        for nt in 0..non_terminal_count {
            for t in 0..terminal_count {
                let non_terminal = NonTerminalRef::from(nt);
                let terminal = TerminalRef::from(t);

                prop_assert_eq!(
                    first.lookup(non_terminal, terminal),
                    second.lookup(non_terminal, terminal)
                );
            }
        }
    }

    #[test]
    fn every_table_entry_expands_its_own_nonterminal(flags in epsilon_flags()) {
        let grammar = load_grammar(chain_grammar(&flags)).unwrap().grammar;
        let table = Ll1::generate_table(&grammar).unwrap();

        let non_terminal_count = grammar.non_terminals().count();
        let terminal_count = grammar.terminals().count();
        for nt in 0..non_terminal_count {
            let non_terminal = NonTerminalRef::from(nt);
            for t in 0..terminal_count {
                if let Some(production_id) = table.lookup(non_terminal, TerminalRef::from(t)) {
                    let production = grammar.production(production_id.as_usize()).unwrap();

                    prop_assert_eq!(production.lhs, non_terminal);
                }
            }
        }
    }

    #[test]
    fn the_full_chain_sentence_always_parses(flags in epsilon_flags()) {
        let source = chain_grammar(&flags);
        let bundle = generate_table_from_ruleset(GeneratorKind::Ll1, &source).unwrap();
        prop_assert_eq!(bundle.diagnostics().count(), 0);

        let tokens = (0..flags.len())
            .map(|idx| {
                let name = ((b'a' + idx as u8) as char).to_string();
                let terminal = bundle
                    .grammar
                    .terminal_mapping(&Terminal::new(&name))
                    .unwrap();
                (terminal, ())
            })
            .collect::<Vec<_>>();

        let mut parser = bundle.parser(|_: ActionInvocation, _: &[()]| Ok(()));
        let res = parser.parse(tokens);

        prop_assert_eq!(res, Ok(None));
    }
}
