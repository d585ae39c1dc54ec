use ll_core::driver::{ActionInvocation, ParseErrorKind};
use ll_core::grammar::{Terminal, TerminalRef};
use ll_core::{generate_table_from_ruleset, GeneratedParser, GeneratorKind};

const GRAMMAR: &str = "
%%
s : 'a' s 'b'
  |
  ;
";

fn bundle() -> GeneratedParser {
    generate_table_from_ruleset(GeneratorKind::Ll1, GRAMMAR).unwrap()
}

fn tokens_of(bundle: &GeneratedParser, input: &str) -> Vec<(TerminalRef, ())> {
    input
        .chars()
        .map(|c| {
            let terminal = bundle
                .grammar
                .terminal_mapping(&Terminal::new(&c.to_string()))
                .unwrap();
            (terminal, ())
        })
        .collect()
}

fn no_actions(_: ActionInvocation, _: &[()]) -> Result<(), String> {
    Ok(())
}

#[test]
fn should_generate_a_conflict_free_table() {
    let bundle = bundle();

    assert_eq!(bundle.diagnostics().count(), 0);
}

#[test]
fn should_accept_balanced_strings() {
    let bundle = bundle();

    for input in ["", "ab", "aabb", "aaabbb"] {
        let tokens = tokens_of(&bundle, input);
        let mut parser = bundle.parser(no_actions);

        assert_eq!(parser.parse(tokens), Ok(None), "input: {:?}", input);
    }
}

#[test]
fn should_accept_deep_nesting() {
    let bundle = bundle();
    let input = "a".repeat(100) + &"b".repeat(100);
    let tokens = tokens_of(&bundle, &input);
    let mut parser = bundle.parser(no_actions);

    assert_eq!(parser.parse(tokens), Ok(None));
}

#[test]
fn should_reject_a_close_before_any_open() {
    let bundle = bundle();
    let tokens = tokens_of(&bundle, "ba");
    let mut parser = bundle.parser(no_actions);

    let res = parser.parse(tokens);

    assert_eq!(
        Err(ParseErrorKind::UnexpectedToken),
        res.map_err(|e| e.kind)
    );
}

#[test]
fn should_reject_a_missing_close() {
    let bundle = bundle();
    let tokens = tokens_of(&bundle, "aab");
    let mut parser = bundle.parser(no_actions);

    let res = parser.parse(tokens);

    assert_eq!(
        Err(ParseErrorKind::UnexpectedEndOfInput),
        res.map_err(|e| e.kind)
    );
}

#[test]
fn should_reject_an_extra_close() {
    let bundle = bundle();
    let tokens = tokens_of(&bundle, "abb");
    let mut parser = bundle.parser(no_actions);

    let res = parser.parse(tokens);

    assert_eq!(
        Err(ParseErrorKind::UnexpectedToken),
        res.map_err(|e| e.kind)
    );
}
