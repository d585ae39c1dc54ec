use grammar::{Diagnostic, GrammarLoadError, GrammarTable};

pub mod actions;
pub mod driver;
pub mod grammar;
pub mod ll;

/// Represents the kind of table that can be generated
pub enum GeneratorKind {
    /// LL(1) Grammar
    Ll1,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ErrorKind {
    GrammarError(GrammarLoadError),
    TableGenerationError(ll::TableGenError),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GrammarError(err) => write!(f, "grammar error: {}", err),
            Self::TableGenerationError(err) => write!(f, "table generation error: {}", err),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    data: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, data: None }
    }

    pub fn with_data_mut(&mut self, data: String) {
        self.data = Some(data)
    }

    pub fn with_data(mut self, data: String) -> Self {
        self.with_data_mut(data);
        self
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            Some(ctx) => write!(f, "{}: {}", &self.kind, ctx),
            None => write!(f, "{}", &self.kind),
        }
    }
}

/// A generated parser bundle: the interned grammar, its prediction table and
/// any diagnostics raised while loading. The grammar and table are frozen and
/// may back any number of [driver::Parser] instances.
#[derive(Debug)]
pub struct GeneratedParser {
    pub grammar: GrammarTable,
    pub table: ll::LlTable,
    /// Diagnostics raised while loading the ruleset.
    pub warnings: Vec<Diagnostic>,
}

impl GeneratedParser {
    /// All diagnostics for the bundle, loader warnings first, then table
    /// construction warnings and conflicts.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.warnings
            .iter()
            .chain(self.table.warnings.iter())
            .chain(self.table.conflicts.iter())
    }

    /// Instantiates a parse driver over the bundle with the given action
    /// hook.
    pub fn parser<A>(&self, action_handler: A) -> driver::Parser<'_, A> {
        driver::Parser::new(&self.grammar, &self.table, action_handler)
    }
}

pub fn generate_table_from_ruleset<G: AsRef<str>>(
    kind: GeneratorKind,
    grammar: G,
) -> Result<GeneratedParser, Error> {
    use grammar::load_grammar;

    let grammar = grammar.as_ref();
    let loaded = load_grammar(grammar).map_err(|e| Error::new(ErrorKind::GrammarError(e)))?;

    let table = generate_table_from_grammar(kind, &loaded.grammar)?;

    Ok(GeneratedParser {
        grammar: loaded.grammar,
        table,
        warnings: loaded.warnings,
    })
}

pub fn generate_table_from_grammar(
    kind: GeneratorKind,
    grammar_table: &grammar::GrammarTable,
) -> Result<ll::LlTable, Error> {
    match kind {
        GeneratorKind::Ll1 => {
            use crate::ll::LlTableGenerator;

            crate::ll::Ll1::generate_table(grammar_table)
                .map_err(|e| Error::new(ErrorKind::TableGenerationError(e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_a_parser_bundle_from_a_ruleset() {
        let res = generate_table_from_ruleset(
            GeneratorKind::Ll1,
            "
%token NUM
%%
expr : NUM ;
",
        );

        let bundle = res.unwrap();
        assert!(bundle.warnings.is_empty());
        assert_eq!(bundle.diagnostics().count(), 0);
    }

    #[test]
    fn should_propagate_grammar_load_errors() {
        let res = generate_table_from_ruleset(GeneratorKind::Ll1, "%%\n");

        assert!(matches!(
            res.map(|_| ()),
            Err(Error {
                kind: ErrorKind::GrammarError(_),
                ..
            })
        ));
    }

    #[test]
    fn should_surface_conflicts_through_bundle_diagnostics() {
        let res = generate_table_from_ruleset(
            GeneratorKind::Ll1,
            "
%%
s : 'a'
  | 'a'
  ;
",
        );

        let bundle = res.unwrap();
        assert_eq!(bundle.diagnostics().count(), 1);
    }
}
