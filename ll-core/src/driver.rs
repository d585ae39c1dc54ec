//! The table-driven predictive parsing runtime.
//!
//! A [Parser] borrows a frozen [GrammarTable] and [LlTable] and owns nothing
//! across runs: each call to [Parser::parse] creates a fresh symbol stack and
//! value stack and discards them when the run ends. The frozen tables may be
//! shared read-only across any number of concurrent parser instances.

use crate::grammar::{GrammarTable, NonTerminalRef, SymbolRef, TerminalRef};
use crate::ll::{LlTable, ProductionId};

/// Default ceiling on driver iterations before a parse is abandoned as
/// runaway.
pub const DEFAULT_STEP_LIMIT: usize = 1 << 20;

/// An element of the parse-time symbol stack. Action markers are pushed
/// beneath a production's rhs so they surface only once the rhs has been
/// fully matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackSymbol {
    Terminal(TerminalRef),
    NonTerminal(NonTerminalRef),
    Action(ProductionId),
}

/// Everything an action hook needs to run one semantic action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionInvocation<'a> {
    /// The production whose rhs has just been fully matched.
    pub production: ProductionId,
    /// The declaration-order action id, counted from 1.
    pub action_id: usize,
    /// The action body, rewritten for value-stack execution.
    pub body: &'a str,
}

/// Markers for the type of error encountered while driving a parse.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The parse table has no start symbol to expand.
    MissingStartSymbol,
    /// No table entry exists for the current (nonterminal, lookahead) pair.
    NoTableEntry,
    /// The lookahead does not match the terminal on top of the stack.
    UnexpectedToken,
    /// Input ended while unmatched symbols remain.
    UnexpectedEndOfInput,
    /// Input continued past an explicitly supplied end marker. Trailing
    /// tokens in a stream without an explicit end marker surface as
    /// `UnexpectedToken` while the end marker itself is matched.
    TrailingInput,
    /// An action fired with fewer values on the stack than its rhs length.
    ValueStackUnderflow,
    /// The action hook reported a failure.
    ActionFailed,
    /// The step budget was exhausted.
    StepLimitExceeded,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingStartSymbol => write!(f, "grammar has no start symbol"),
            Self::NoTableEntry => write!(f, "no prediction for nonterminal under lookahead"),
            Self::UnexpectedToken => write!(f, "unexpected token"),
            Self::UnexpectedEndOfInput => write!(f, "unexpected end of input"),
            Self::TrailingInput => write!(f, "trailing input after accepted derivation"),
            Self::ValueStackUnderflow => write!(f, "value stack underflow"),
            Self::ActionFailed => write!(f, "semantic action failed"),
            Self::StepLimitExceeded => write!(f, "parse step limit exceeded"),
        }
    }
}

/// Represents errors that abort a parse. All parse-time errors are fatal to
/// the current run; none are retried.
#[derive(Debug, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    data: Option<String>,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind) -> Self {
        Self { kind, data: None }
    }

    pub(crate) fn with_data_mut<S: AsRef<str>>(&mut self, data: S) {
        let data = data.as_ref().to_string();

        self.data = Some(data)
    }

    pub(crate) fn with_data<S: AsRef<str>>(mut self, data: S) -> Self {
        self.with_data_mut(data);
        self
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            Some(ctx) => write!(f, "{}: {}", &self.kind, ctx),
            None => write!(f, "{}", &self.kind),
        }
    }
}

/// A generic predictive parser over a frozen grammar and parse table.
///
/// `A` is the action-execution hook: it receives the invocation description
/// and the matched values for the production's rhs in match order (the last
/// slice element is the most recently matched, i.e. `$1`), and returns the
/// value the action leaves on the stack.
pub struct Parser<'a, A> {
    grammar_table: &'a GrammarTable,
    table: &'a LlTable,
    action_handler: A,
    step_limit: usize,
}

impl<'a, A> Parser<'a, A> {
    pub fn new(grammar_table: &'a GrammarTable, table: &'a LlTable, action_handler: A) -> Self {
        Self {
            grammar_table,
            table,
            action_handler,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Drives a full derivation over the token stream, interleaving semantic
    /// actions, and returns the value left on top of the value stack (if any
    /// action ever pushed one).
    ///
    /// The stream may end without an explicit end-of-input token; exhaustion
    /// is treated as the end marker.
    pub fn parse<V, I>(&mut self, tokens: I) -> Result<Option<V>, ParseError>
    where
        I: IntoIterator<Item = (TerminalRef, V)>,
        A: FnMut(ActionInvocation, &[V]) -> Result<V, String>,
    {
        let start = self
            .grammar_table
            .start_non_terminal()
            .ok_or_else(|| ParseError::new(ParseErrorKind::MissingStartSymbol))?;
        let eof = self.grammar_table.eof_terminal_ref();

        let non_terminal_names = self.grammar_table.non_terminals().collect::<Vec<_>>();
        let terminal_names = self.grammar_table.terminals().collect::<Vec<_>>();

        // the permanent stack bottom for a single run.
        let mut ss: Vec<StackSymbol> =
            vec![StackSymbol::Terminal(eof), StackSymbol::NonTerminal(start)];
        let mut vs: Vec<V> = Vec::new();

        let mut tokens = tokens.into_iter();
        let mut lookahead: Option<(TerminalRef, Option<V>)> = None;
        let mut steps = 0usize;
        let mut ran_action = false;

        while let Some(&top) = ss.last() {
            steps += 1;
            if steps > self.step_limit {
                return Err(ParseError::new(ParseErrorKind::StepLimitExceeded)
                    .with_data(format!("after {} steps", self.step_limit)));
            }

            if lookahead.is_none() {
                lookahead = Some(match tokens.next() {
                    Some((terminal, value)) => (terminal, Some(value)),
                    None => (eof, None),
                });
            }
            let current = lookahead
                .as_ref()
                .map(|(terminal, _)| *terminal)
                .unwrap_or(eof);

            match top {
                StackSymbol::Terminal(expected) if expected == current => {
                    ss.pop();
                    let value = lookahead.take().and_then(|(_, value)| value);
                    // the end marker carries no semantic value.
                    if current != eof {
                        if let Some(value) = value {
                            vs.push(value);
                        }
                    }
                }
                StackSymbol::Terminal(expected) => {
                    let kind = if current == eof {
                        ParseErrorKind::UnexpectedEndOfInput
                    } else {
                        ParseErrorKind::UnexpectedToken
                    };
                    return Err(ParseError::new(kind).with_data(format!(
                        "expected '{}', found '{}'",
                        terminal_names[expected.as_usize()],
                        terminal_names[current.as_usize()]
                    )));
                }
                StackSymbol::Action(production_id) => {
                    let production = self
                        .grammar_table
                        .production(production_id.as_usize())
                        .ok_or_else(|| {
                            ParseError::new(ParseErrorKind::NoTableEntry).with_data(format!(
                                "unknown production {}",
                                production_id.as_usize() + 1
                            ))
                        })?;
                    let rhs_len = production.rhs_len();

                    if vs.len() < rhs_len {
                        return Err(ParseError::new(ParseErrorKind::ValueStackUnderflow)
                            .with_data(format!(
                                "action {} needs {} values, stack holds {}",
                                production.action_id,
                                rhs_len,
                                vs.len()
                            )));
                    }
                    let args_start = vs.len() - rhs_len;

                    let invocation = ActionInvocation {
                        production: production_id,
                        action_id: production.action_id,
                        body: self.table.action_body(production_id).unwrap_or(""),
                    };
                    let result = (self.action_handler)(invocation, &vs[args_start..])
                        .map_err(|cause| {
                            ParseError::new(ParseErrorKind::ActionFailed).with_data(format!(
                                "action {}: {}",
                                production.action_id, cause
                            ))
                        })?;

                    vs.truncate(args_start);
                    vs.push(result);
                    ran_action = true;
                    ss.pop();
                }
                StackSymbol::NonTerminal(non_terminal) => {
                    let production_id =
                        self.table.lookup(non_terminal, current).ok_or_else(|| {
                            let kind = if current == eof {
                                ParseErrorKind::UnexpectedEndOfInput
                            } else {
                                ParseErrorKind::NoTableEntry
                            };
                            ParseError::new(kind).with_data(format!(
                                "nonterminal '{}' under lookahead '{}'",
                                non_terminal_names[non_terminal.as_usize()],
                                terminal_names[current.as_usize()]
                            ))
                        })?;
                    let production = self
                        .grammar_table
                        .production(production_id.as_usize())
                        .ok_or_else(|| {
                            ParseError::new(ParseErrorKind::NoTableEntry).with_data(format!(
                                "unknown production {}",
                                production_id.as_usize() + 1
                            ))
                        })?;

                    ss.pop();
                    // the marker sits beneath the rhs so the action runs only
                    // after every rhs symbol has been matched.
                    if production.has_action() {
                        ss.push(StackSymbol::Action(production_id));
                    }
                    for symbol in production.rhs.iter().rev() {
                        ss.push(match symbol {
                            SymbolRef::Terminal(terminal) => StackSymbol::Terminal(*terminal),
                            SymbolRef::NonTerminal(non_terminal) => {
                                StackSymbol::NonTerminal(*non_terminal)
                            }
                        });
                    }
                }
            }
        }

        // the derivation is complete; any remaining input is an error.
        let leftover = match lookahead {
            Some((terminal, _)) if terminal != eof => Some(terminal),
            _ => tokens.next().map(|(terminal, _)| terminal),
        };
        if let Some(terminal) = leftover {
            return Err(ParseError::new(ParseErrorKind::TrailingInput)
                .with_data(format!("'{}'", terminal_names[terminal.as_usize()])));
        }

        // matched-token values without any action to consume them are not a
        // result; only actions produce one.
        if ran_action {
            Ok(vs.pop())
        } else {
            Ok(None)
        }
    }
}
