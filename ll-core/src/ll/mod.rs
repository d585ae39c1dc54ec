use std::collections::{HashMap, HashSet};

use crate::actions::expand_action_body;
use crate::grammar::*;

/// Markers for the type of error encountered in table generation.
#[derive(Debug, PartialEq, Eq)]
pub enum TableGenErrorKind {
    /// The grammar defines no production to derive the start symbol from.
    MissingStartSymbol,
}

impl std::fmt::Display for TableGenErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingStartSymbol => write!(f, "grammar has no start symbol"),
        }
    }
}

/// Represents errors that can occur in the table generation process.
#[derive(Debug, PartialEq, Eq)]
pub struct TableGenError {
    pub kind: TableGenErrorKind,
    data: Option<String>,
}

impl TableGenError {
    pub(crate) fn new(kind: TableGenErrorKind) -> Self {
        Self { kind, data: None }
    }

    #[allow(unused)]
    pub(crate) fn with_data_mut<S: AsRef<str>>(&mut self, data: S) {
        let data = data.as_ref().to_string();

        self.data = Some(data)
    }

    #[allow(unused)]
    pub(crate) fn with_data<S: AsRef<str>>(mut self, data: S) -> Self {
        self.with_data_mut(data);
        self
    }
}

impl std::fmt::Display for TableGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            Some(ctx) => write!(f, "{}: {}", &self.kind, ctx),
            None => write!(f, "{}", &self.kind),
        }
    }
}

/// A mapping of grammar symbols to sets of terminals, used for both the
/// FIRST and FOLLOW artifacts.
#[derive(Debug, PartialEq)]
pub struct SymbolSet {
    sets: HashMap<SymbolRef, HashSet<TerminalRef>>,
}

impl SymbolSet {
    fn new<I: IntoIterator<Item = SymbolRef>>(symbols: I) -> Self {
        let sets = symbols
            .into_iter()
            .fold(HashMap::new(), |mut acc, symbol| {
                acc.insert(symbol, HashSet::new());
                acc
            });
        Self { sets }
    }

    /// Inserts a terminal into a symbol's set, returning true if it was not
    /// already present.
    fn insert(&mut self, key: SymbolRef, terminal: TerminalRef) -> bool {
        self.sets
            .get_mut(&key)
            .map(|terminal_set| terminal_set.insert(terminal))
            .unwrap_or(false)
    }

    /// Sets the terminals for `lhs` to the union of `lhs` and `rhs`,
    /// returning true if `lhs` grew.
    fn union_of_sets(&mut self, lhs: SymbolRef, rhs: &SymbolRef) -> bool {
        let mut changed = false;

        let terminals_of_rhs = self.sets.get(rhs).cloned().unwrap_or_default();
        self.sets.entry(lhs).and_modify(|terminal_set| {
            for terminal in terminals_of_rhs {
                changed |= terminal_set.insert(terminal);
            }
        });

        changed
    }

    /// The terminal set tracked for a symbol.
    pub fn set(&self, key: &SymbolRef) -> Option<&HashSet<TerminalRef>> {
        self.sets.get(key)
    }

    /// The terminal set for a symbol in ascending terminal order.
    pub fn sorted_terminals(&self, key: &SymbolRef) -> Vec<TerminalRef> {
        let mut terminals = self
            .sets
            .get(key)
            .map(|set| set.iter().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        terminals.sort();

        terminals
    }
}

impl AsRef<HashMap<SymbolRef, HashSet<TerminalRef>>> for SymbolSet {
    fn as_ref(&self) -> &HashMap<SymbolRef, HashSet<TerminalRef>> {
        &self.sets
    }
}

/// Computes the set of nonterminals that can derive the empty sequence:
/// those with a production whose rhs is empty or consists entirely of
/// already-nullable nonterminals. Terminals are never nullable.
pub fn find_nullable_non_terminals(grammar_table: &GrammarTable) -> HashSet<NonTerminalRef> {
    let mut nullable = HashSet::new();

    let mut done = false;
    while !done {
        // assume done unless an insertion happens.
        done = true;
        for production in grammar_table.productions() {
            if nullable.contains(&production.lhs) {
                continue;
            }

            if are_all_nullable(&production.rhs, &nullable) {
                nullable.insert(production.lhs);
                done = false;
            }
        }
    }

    nullable
}

/// True exactly when every symbol in the range is a nullable nonterminal.
/// Vacuously true for the empty range.
pub fn are_all_nullable(range: &[SymbolRef], nullable: &HashSet<NonTerminalRef>) -> bool {
    range.iter().all(|symbol| match symbol {
        SymbolRef::NonTerminal(non_terminal) => nullable.contains(non_terminal),
        SymbolRef::Terminal(_) => false,
    })
}

/// Computes FIRST for every symbol.
///
/// Terminals are seeded with themselves. For a production X -> Y1..Yk the
/// FIRST of every Yi whose preceding symbols are all nullable is merged into
/// FIRST(X); this transmits FIRST across nullable prefixes inside the fixed
/// point itself, so table construction only ever needs FIRST of a
/// production's leading symbol.
pub fn build_first_sets(
    grammar_table: &GrammarTable,
    nullable_non_terminals: &HashSet<NonTerminalRef>,
) -> SymbolSet {
    let keys = grammar_table
        .non_terminals()
        .enumerate()
        .map(|(id, _)| SymbolRef::NonTerminal(NonTerminalRef::from(id)))
        .chain(
            grammar_table
                .terminals()
                .enumerate()
                .map(|(id, _)| SymbolRef::Terminal(TerminalRef::from(id))),
        );
    let mut first_sets = SymbolSet::new(keys);

    // FIRST(t) = {t} for every terminal, literal-character terminals included.
    for (id, _) in grammar_table.terminals().enumerate() {
        let terminal = TerminalRef::from(id);
        first_sets.insert(SymbolRef::Terminal(terminal), terminal);
    }

    let mut changed = true;
    while changed {
        changed = false;

        for production in grammar_table.productions() {
            let lhs = SymbolRef::NonTerminal(production.lhs);

            for (position, symbol) in production.rhs.iter().enumerate() {
                if !are_all_nullable(&production.rhs[..position], nullable_non_terminals) {
                    break;
                }

                if first_sets.union_of_sets(lhs, symbol) {
                    changed = true;
                }
            }
        }
    }

    first_sets
}

/// Computes FOLLOW for every nonterminal.
///
/// The end-of-input terminal is seeded into FOLLOW of the start symbol and
/// into FOLLOW of every nullable nonterminal; grammars validated against the
/// ancestral generator rely on the second seeding, so it is preserved and
/// pinned by a regression test.
pub fn build_follow_sets(
    grammar_table: &GrammarTable,
    nullable_non_terminals: &HashSet<NonTerminalRef>,
    first_sets: &SymbolSet,
) -> SymbolSet {
    let eof_terminal = grammar_table.eof_terminal_ref();

    let keys = grammar_table
        .non_terminals()
        .enumerate()
        .map(|(id, _)| SymbolRef::NonTerminal(NonTerminalRef::from(id)));
    let mut follow_sets = SymbolSet::new(keys);

    if let Some(start) = grammar_table.start_non_terminal() {
        follow_sets.insert(SymbolRef::NonTerminal(start), eof_terminal);
    }
    for non_terminal in nullable_non_terminals {
        follow_sets.insert(SymbolRef::NonTerminal(*non_terminal), eof_terminal);
    }

    let mut changed = true;
    while changed {
        changed = false;

        for production in grammar_table.productions() {
            let rhs = &production.rhs;

            for (position, symbol) in rhs.iter().enumerate() {
                let non_terminal = match symbol {
                    SymbolRef::NonTerminal(non_terminal) => *non_terminal,
                    SymbolRef::Terminal(_) => continue,
                };
                let followed = SymbolRef::NonTerminal(non_terminal);

                // everything that can start a later symbol, across nullable
                // gaps, follows this one.
                for (offset, next_symbol) in rhs.iter().enumerate().skip(position + 1) {
                    if !are_all_nullable(&rhs[position + 1..offset], nullable_non_terminals) {
                        break;
                    }

                    let firsts_of_next = first_sets.set(next_symbol).cloned().unwrap_or_default();
                    for terminal in firsts_of_next {
                        if follow_sets.insert(followed, terminal) {
                            changed = true;
                        }
                    }
                }

                // when the tail is empty or fully nullable, whatever follows
                // the lhs follows this nonterminal too.
                if are_all_nullable(&rhs[position + 1..], nullable_non_terminals)
                    && follow_sets.union_of_sets(followed, &SymbolRef::NonTerminal(production.lhs))
                {
                    changed = true;
                }
            }
        }
    }

    follow_sets
}

/// A wrapper type for annotating a production.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub struct ProductionId(usize);

impl ProductionId {
    /// Instantiates a new [ProductionId] from a reference id.
    ///
    /// # Safety
    ///
    /// Caller guarantees that the id usize corresponds to a valid production
    /// id in the corresponding grammar.
    pub fn unchecked_new(id: usize) -> Self {
        ProductionId(id)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl From<ProductionId> for usize {
    fn from(value: ProductionId) -> Self {
        value.as_usize()
    }
}

/// The predictive parse table: for each (nonterminal, lookahead) pair the
/// production to expand, plus the per-production action bodies rewritten for
/// value-stack execution.
///
/// Construction is append-only; the first production written into a cell
/// stays there and later attempts are recorded in `conflicts`.
#[derive(Debug)]
pub struct LlTable {
    cells: HashMap<NonTerminalRef, HashMap<TerminalRef, ProductionId>>,
    actions: Vec<String>,

    /// LL(1) conflicts discovered during construction. Non-fatal: the table
    /// remains usable with first-entry-wins resolution.
    pub conflicts: Vec<Diagnostic>,
    /// Structural warnings, e.g. nonterminals that never appear as an lhs.
    pub warnings: Vec<Diagnostic>,
}

impl LlTable {
    fn new(actions: Vec<String>) -> Self {
        Self {
            cells: HashMap::new(),
            actions,
            conflicts: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// The production to expand for a nonterminal under a lookahead, if the
    /// grammar predicts one.
    pub fn lookup(
        &self,
        non_terminal: NonTerminalRef,
        lookahead: TerminalRef,
    ) -> Option<ProductionId> {
        self.cells
            .get(&non_terminal)
            .and_then(|row| row.get(&lookahead))
            .copied()
    }

    /// The rewritten action body for a production. Empty for productions
    /// declared without an action.
    pub fn action_body(&self, production: ProductionId) -> Option<&str> {
        self.actions.get(production.as_usize()).map(|s| s.as_str())
    }

    /// Attempts an insertion, reporting a conflict when the cell is already
    /// claimed by a different production.
    fn insert_cell(
        &mut self,
        non_terminal: NonTerminalRef,
        lookahead: TerminalRef,
        production: ProductionId,
        conflict_context: impl Fn() -> Diagnostic,
    ) {
        let row = self.cells.entry(non_terminal).or_default();

        match row.get(&lookahead).copied() {
            None => {
                row.insert(lookahead, production);
            }
            Some(occupant) if occupant == production => {}
            Some(_) => self.conflicts.push(conflict_context()),
        }
    }

    /// Outputs a human-readable representation of the parse table.
    #[allow(unused)]
    pub fn human_readable_format(&self, grammar_table: &GrammarTable) -> String {
        let non_terminals = grammar_table.non_terminals().collect::<Vec<_>>();
        let terminals = grammar_table.terminals().collect::<Vec<_>>();

        let mut rows = self
            .cells
            .iter()
            .map(|(non_terminal, row)| {
                let mut entries = row
                    .iter()
                    .map(|(lookahead, production)| (lookahead.as_usize(), production))
                    .collect::<Vec<_>>();
                entries.sort_by_key(|(lookahead, _)| *lookahead);

                let rendered = entries
                    .into_iter()
                    .map(|(lookahead, production)| {
                        // productions are 1-indexed when pretty printed
                        format!("'{}' -> {}", terminals[lookahead], production.as_usize() + 1)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");

                (
                    non_terminal.as_usize(),
                    format!("{}: {}", non_terminals[non_terminal.as_usize()], rendered),
                )
            })
            .collect::<Vec<_>>();
        rows.sort_by_key(|(id, _)| *id);

        rows.into_iter()
            .map(|(_, line)| line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Exposes a trait for generating an LL table from a grammar.
pub trait LlTableGenerator {
    fn generate_table(grammar_table: &GrammarTable) -> Result<LlTable, TableGenError>;
}

/// Single-lookahead predictive table construction.
pub struct Ll1;

impl LlTableGenerator for Ll1 {
    fn generate_table(grammar_table: &GrammarTable) -> Result<LlTable, TableGenError> {
        grammar_table
            .start_non_terminal()
            .ok_or_else(|| TableGenError::new(TableGenErrorKind::MissingStartSymbol))?;

        let nullable = find_nullable_non_terminals(grammar_table);
        let first_sets = build_first_sets(grammar_table, &nullable);
        let follow_sets = build_follow_sets(grammar_table, &nullable, &first_sets);

        build_table(grammar_table, &nullable, &first_sets, &follow_sets)
    }
}

fn build_table(
    grammar_table: &GrammarTable,
    nullable: &HashSet<NonTerminalRef>,
    first_sets: &SymbolSet,
    follow_sets: &SymbolSet,
) -> Result<LlTable, TableGenError> {
    let non_terminals = grammar_table.non_terminals().collect::<Vec<_>>();
    let terminals = grammar_table.terminals().collect::<Vec<_>>();

    let expanded_actions = grammar_table
        .productions()
        .map(|production| expand_action_body(&production.action, production.rhs_len()))
        .collect::<Vec<_>>();
    let mut table = LlTable::new(expanded_actions);

    // every nonterminal referenced on a rhs must have a defining production.
    let defined = grammar_table
        .productions()
        .map(|production| production.lhs)
        .collect::<HashSet<_>>();
    for production in grammar_table.productions() {
        for symbol in production.rhs.iter() {
            if let SymbolRef::NonTerminal(non_terminal) = symbol {
                if !defined.contains(non_terminal) {
                    let message = format!(
                        "nonterminal '{}' is missing a left-hand side",
                        non_terminals[non_terminal.as_usize()]
                    );
                    if !table
                        .warnings
                        .iter()
                        .any(|diagnostic| diagnostic.message == message)
                    {
                        table
                            .warnings
                            .push(Diagnostic::warning(production.line, message));
                    }
                }
            }
        }
    }

    for (idx, production) in grammar_table.productions().enumerate() {
        let production_id = ProductionId::unchecked_new(idx);
        let lhs = production.lhs;
        let lhs_name = non_terminals[lhs.as_usize()];

        let conflict_at = |lookahead: TerminalRef| {
            let lookahead_name = terminals[lookahead.as_usize()];
            move || {
                Diagnostic::warning(
                    production.line,
                    format!(
                        "LL(1) conflict: nonterminal '{}' on lookahead '{}' already \
                         has a production; production {} is unreachable here",
                        lhs_name,
                        lookahead_name,
                        idx + 1,
                    ),
                )
            }
        };

        // a production that can derive nothing is predicted by everything
        // that may follow its lhs.
        if are_all_nullable(&production.rhs, nullable) {
            for lookahead in follow_sets.sorted_terminals(&SymbolRef::NonTerminal(lhs)) {
                table.insert_cell(lhs, lookahead, production_id, conflict_at(lookahead));
            }
        }

        // a non-empty production is predicted by whatever can start it.
        if let Some(leading_symbol) = production.rhs.first() {
            for lookahead in first_sets.sorted_terminals(leading_symbol) {
                table.insert_cell(lhs, lookahead, production_id, conflict_at(lookahead));
            }
        }
    }

    Ok(table)
}
