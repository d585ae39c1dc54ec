use std::collections::hash_map::HashMap;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTerminals {
    Eof,
}

impl BuiltinTerminals {
    pub(crate) fn as_terminal(&self) -> &'static str {
        match self {
            BuiltinTerminals::Eof => "<$>",
        }
    }
}

/// A wrapper type for non-terminals that reference the grammar table.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NonTerminalRef(usize);

impl NonTerminalRef {
    pub(crate) fn new(non_terminal: usize) -> Self {
        Self(non_terminal)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl From<usize> for NonTerminalRef {
    fn from(val: usize) -> Self {
        Self::new(val)
    }
}

impl std::fmt::Display for NonTerminalRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 1-indexed in human-readable format, 0-indexed internally.
        write!(f, "S{}", &self.0 + 1)
    }
}

/// A wrapper type for terminals that reference the grammar table.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TerminalRef(usize);

impl TerminalRef {
    pub(crate) fn new(terminal: usize) -> Self {
        Self(terminal)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl From<usize> for TerminalRef {
    fn from(val: usize) -> Self {
        Self::new(val)
    }
}

impl std::fmt::Display for TerminalRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 1-indexed in human-readable format, 0-indexed internally.
        write!(f, "T{}", &self.0 + 1)
    }
}

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum SymbolRef {
    NonTerminal(NonTerminalRef),
    Terminal(TerminalRef),
}

impl std::fmt::Display for SymbolRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolRef::NonTerminal(id) => write!(f, "{}", id),
            SymbolRef::Terminal(id) => write!(f, "{}", id),
        }
    }
}

/// A wrapper type for non-terminal names borrowed from the grammar table.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NonTerminal<'a>(&'a str);

impl<'a> NonTerminal<'a> {
    pub fn new(non_terminal: &'a str) -> Self {
        Self(non_terminal)
    }
}

impl<'a> AsRef<str> for NonTerminal<'a> {
    fn as_ref(&self) -> &str {
        self.0
    }
}

impl<'a> From<&'a str> for NonTerminal<'a> {
    fn from(val: &'a str) -> Self {
        Self::new(val)
    }
}

impl<'a> std::fmt::Display for NonTerminal<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

/// A wrapper type for terminal names borrowed from the grammar table.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Terminal<'a>(&'a str);

impl<'a> Terminal<'a> {
    pub fn new(terminal: &'a str) -> Self {
        Self(terminal)
    }
}

impl<'a> AsRef<str> for Terminal<'a> {
    fn as_ref(&self) -> &str {
        self.0
    }
}

impl<'a> From<&'a str> for Terminal<'a> {
    fn from(val: &'a str) -> Self {
        Terminal::new(val)
    }
}

impl<'a> From<BuiltinTerminals> for Terminal<'a> {
    fn from(val: BuiltinTerminals) -> Self {
        Terminal::new(val.as_terminal())
    }
}

impl<'a> std::fmt::Display for Terminal<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

/// A single production, with its right-hand side in declaration order and the
/// raw text of its semantic action, if any.
///
/// Every production receives an action id, assigned sequentially from 1 in
/// declaration order, whether or not it carries an action body.
#[derive(Debug, Hash, Clone, PartialEq, Eq)]
pub struct ProductionRef {
    pub lhs: NonTerminalRef,
    pub rhs: Vec<SymbolRef>,
    pub action: String,
    pub action_id: usize,
    pub line: Option<usize>,
}

impl ProductionRef {
    fn new(
        lhs: NonTerminalRef,
        rhs: Vec<SymbolRef>,
        action: String,
        action_id: usize,
        line: Option<usize>,
    ) -> Self {
        Self {
            lhs,
            rhs,
            action,
            action_id,
            line,
        }
    }

    pub fn rhs_len(&self) -> usize {
        self.rhs.len()
    }

    pub fn has_action(&self) -> bool {
        !self.action.is_empty()
    }
}

impl std::fmt::Display for ProductionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rhs = self
            .rhs
            .iter()
            .map(|sym| sym.to_string())
            .collect::<Vec<_>>()
            .join(" ");

        write!(f, "{} ::= {}", self.lhs, rhs)
    }
}

/// Severity of a grammar diagnostic. Diagnostics never abort table
/// construction; hard failures are surfaced through error types instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A positioned message about a grammar, rendered as
/// `grammar(LINE): warning: MESSAGE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(line: Option<usize>, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            line,
            message,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "grammar({}): {}: {}", line, self.severity, self.message),
            None => write!(f, "grammar: {}: {}", self.severity, self.message),
        }
    }
}

/// The frozen description of a grammar: interned symbol names, declared
/// token terminals and the production list in declaration order.
///
/// Mutating methods are only meaningful while the grammar is being built;
/// once any derived set or table has been computed from it the table must be
/// treated as read-only.
#[derive(Debug, PartialEq)]
pub struct GrammarTable {
    non_terminals: HashMap<String, usize>,
    terminals: HashMap<String, usize>,
    token_terminals: HashSet<usize>,
    productions: Vec<ProductionRef>,

    start: Option<NonTerminalRef>,
    eof_terminal_ref: TerminalRef,
}

impl GrammarTable {
    pub fn new() -> Self {
        let mut terminals = HashMap::new();
        terminals.insert(BuiltinTerminals::Eof.as_terminal().to_string(), 0);

        Self {
            non_terminals: HashMap::new(),
            terminals,
            token_terminals: HashSet::new(),
            productions: Vec::new(),
            start: None,
            eof_terminal_ref: TerminalRef::new(0),
        }
    }

    /// Adds a non-terminal to the table, returning its index. If the
    /// non-terminal already exists, the index of the previous entry is
    /// returned.
    fn add_non_terminal_mut<S: AsRef<str>>(&mut self, non_terminal: S) -> usize {
        let non_terminal = non_terminal.as_ref();
        let new_id = self.non_terminals.len();

        *self
            .non_terminals
            .entry(non_terminal.to_string())
            .or_insert(new_id)
    }

    /// Adds a terminal to the table, returning its index. If the terminal
    /// already exists, the index of the previous entry is returned.
    fn add_terminal_mut<S: AsRef<str>>(&mut self, terminal: S) -> usize {
        let terminal = terminal.as_ref();
        let new_id = self.terminals.len();

        *self.terminals.entry(terminal.to_string()).or_insert(new_id)
    }

    /// Registers a `%token` declaration.
    pub fn declare_token<S: AsRef<str>>(&mut self, token: S) -> TerminalRef {
        let id = self.add_terminal_mut(token);
        self.token_terminals.insert(id);

        TerminalRef::new(id)
    }

    /// Registers a literal-character terminal, named by the character itself.
    pub fn declare_literal(&mut self, literal: char) -> TerminalRef {
        let repr = literal.to_string();
        let id = self.add_terminal_mut(repr);

        TerminalRef::new(id)
    }

    /// Overrides the start symbol. Without an override the lhs of the first
    /// production is used.
    pub fn set_start<S: AsRef<str>>(&mut self, non_terminal: S) {
        let id = self.add_non_terminal_mut(non_terminal);
        self.start = Some(NonTerminalRef::new(id));
    }

    /// Resolves a right-hand-side name to a symbol, interning it as a
    /// non-terminal when it is not a known terminal. Terminal and
    /// non-terminal namespaces are disjoint by construction; a name that is
    /// both is resolved as the terminal.
    pub fn symbol_for_name<S: AsRef<str>>(&mut self, name: S) -> SymbolRef {
        let name = name.as_ref();

        match self.terminals.get(name) {
            Some(&id) => SymbolRef::Terminal(TerminalRef::new(id)),
            None => {
                let id = self.add_non_terminal_mut(name);
                SymbolRef::NonTerminal(NonTerminalRef::new(id))
            }
        }
    }

    /// Appends a production for `lhs`, returning the action id assigned to
    /// it. Action ids count every production, actioned or not, starting at 1.
    pub fn add_production<S: AsRef<str>>(
        &mut self,
        lhs: S,
        rhs: Vec<SymbolRef>,
        action: &str,
        line: Option<usize>,
    ) -> usize {
        let lhs_id = self.add_non_terminal_mut(lhs);
        let action_id = self.productions.len() + 1;

        self.productions.push(ProductionRef::new(
            NonTerminalRef::new(lhs_id),
            rhs,
            action.to_string(),
            action_id,
            line,
        ));

        action_id
    }

    pub fn eof_terminal_ref(&self) -> TerminalRef {
        self.eof_terminal_ref
    }

    /// The start symbol: the explicit `%start` override when present,
    /// otherwise the lhs of the first production.
    pub fn start_non_terminal(&self) -> Option<NonTerminalRef> {
        self.start
            .or_else(|| self.productions.first().map(|production| production.lhs))
    }

    pub fn is_token_terminal(&self, terminal: TerminalRef) -> bool {
        self.token_terminals.contains(&terminal.as_usize())
    }

    pub fn non_terminals(&self) -> NonTerminalIterator {
        NonTerminalIterator::new(self)
    }

    pub fn terminals(&self) -> TerminalIterator {
        TerminalIterator::new(self)
    }

    pub fn non_terminal_mapping(&self, non_terminal: &NonTerminal) -> Option<NonTerminalRef> {
        self.non_terminals
            .get(non_terminal.0)
            .map(|&id| NonTerminalRef::new(id))
    }

    pub fn terminal_mapping(&self, terminal: &Terminal) -> Option<TerminalRef> {
        self.terminals
            .get(terminal.0)
            .map(|&id| TerminalRef::new(id))
    }

    pub fn productions(&self) -> impl Iterator<Item = &ProductionRef> {
        self.productions.iter()
    }

    pub fn production(&self, idx: usize) -> Option<&ProductionRef> {
        self.productions.get(idx)
    }
}

impl Default for GrammarTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GrammarTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let header = "Grammar Table
-------------";

        let non_terminals = self
            .non_terminals()
            .enumerate()
            .map(|(id, non_terminal)| format!("{}. '{}'\n", id + 1, non_terminal))
            .collect::<String>();
        let terminals = self
            .terminals()
            .enumerate()
            .map(|(id, terminal)| format!("{}. '{}'\n", id + 1, terminal))
            .collect::<String>();

        let productions = self
            .productions
            .iter()
            .enumerate()
            // 1-indexed
            .map(|(idx, production)| format!("{}. {}\n", idx + 1, production))
            .collect::<String>();

        write!(
            f,
            "{}\nNON-TERMINALS\n{}\nTERMINALS\n{}\nPRODUCTIONS\n{}",
            header, non_terminals, terminals, productions
        )
    }
}

/// An ordered iterator over all non-terminal names in a grammar table.
pub struct NonTerminalIterator<'a> {
    non_terminals: Vec<&'a str>,
}

impl<'a> NonTerminalIterator<'a> {
    fn new(grammar_table: &'a GrammarTable) -> Self {
        let mut values = grammar_table
            .non_terminals
            .iter()
            .map(|(key, value)| (key.as_str(), value))
            .collect::<Vec<_>>();
        // reverse the id order so the first non-terminal pops off the back first.
        values.sort_by(|(_, a), (_, b)| b.cmp(a));

        Self {
            non_terminals: values.into_iter().map(|(key, _)| key).collect(),
        }
    }
}

impl<'a> Iterator for NonTerminalIterator<'a> {
    type Item = NonTerminal<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.non_terminals.pop().map(NonTerminal)
    }
}

/// An ordered iterator over all terminal names in a grammar table.
pub struct TerminalIterator<'a> {
    terminals: Vec<&'a str>,
}

impl<'a> TerminalIterator<'a> {
    fn new(grammar_table: &'a GrammarTable) -> Self {
        let mut values = grammar_table
            .terminals
            .iter()
            .map(|(key, value)| (key.as_str(), value))
            .collect::<Vec<_>>();
        // reverse the id order so the first terminal pops off the back first.
        values.sort_by(|(_, a), (_, b)| b.cmp(a));

        Self {
            terminals: values.into_iter().map(|(key, _)| key).collect(),
        }
    }
}

impl<'a> Iterator for TerminalIterator<'a> {
    type Item = Terminal<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.terminals.pop().map(Terminal)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum GrammarLoadErrorKind {
    NoProductions,
    InvalidDeclaration,
    InvalidRule,
    InvalidCharLiteral,
    UnterminatedAction,
    UnknownStartSymbol,
}

impl std::fmt::Display for GrammarLoadErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoProductions => write!(f, "grammar does not define any production"),
            Self::InvalidDeclaration => write!(f, "declaration is invalid"),
            Self::InvalidRule => write!(f, "provided rule is invalid"),
            Self::InvalidCharLiteral => write!(f, "character literal is invalid"),
            Self::UnterminatedAction => write!(f, "action block is missing a closing brace"),
            Self::UnknownStartSymbol => write!(f, "start symbol has no production"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct GrammarLoadError {
    pub kind: GrammarLoadErrorKind,
    data: Option<String>,
}

impl GrammarLoadError {
    pub fn new(kind: GrammarLoadErrorKind) -> Self {
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

impl std::fmt::Display for GrammarLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            Some(ctx) => write!(f, "{}: {}", &self.kind, ctx),
            None => write!(f, "{}", &self.kind),
        }
    }
}

/// Tokens of the grammar-description surface itself.
#[derive(Debug, PartialEq)]
enum GrammarToken {
    Ident(String),
    CharLit(char),
    Colon,
    Pipe,
    Semi,
    Action(String),
    SectionDelim,
    TokenDecl,
    StartDecl,
}

#[derive(Debug, PartialEq)]
struct ScannedToken {
    token: GrammarToken,
    line: usize,
}

impl ScannedToken {
    fn new(token: GrammarToken, line: usize) -> Self {
        Self { token, line }
    }
}

fn scan_grammar(input: &str) -> Result<Vec<ScannedToken>, GrammarLoadError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '/' if chars.peek() == Some(&'/') => {
                // line comment
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '%' => {
                if chars.peek() == Some(&'%') {
                    chars.next();
                    tokens.push(ScannedToken::new(GrammarToken::SectionDelim, line));
                    continue;
                }

                let mut keyword = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        keyword.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }

                let token = match keyword.as_str() {
                    "token" => GrammarToken::TokenDecl,
                    "start" => GrammarToken::StartDecl,
                    other => {
                        return Err(
                            GrammarLoadError::new(GrammarLoadErrorKind::InvalidDeclaration)
                                .with_data(format!("line {}: unknown directive %{}", line, other)),
                        )
                    }
                };
                tokens.push(ScannedToken::new(token, line));
            }
            '\'' => {
                let literal = match chars.next() {
                    Some('\\') => match chars.next() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        _ => {
                            return Err(GrammarLoadError::new(
                                GrammarLoadErrorKind::InvalidCharLiteral,
                            )
                            .with_data(format!("line {}: unsupported escape", line)))
                        }
                    },
                    Some('\'') | None => {
                        return Err(
                            GrammarLoadError::new(GrammarLoadErrorKind::InvalidCharLiteral)
                                .with_data(format!("line {}: empty literal", line)),
                        )
                    }
                    Some(c) => c,
                };

                if chars.next() != Some('\'') {
                    return Err(
                        GrammarLoadError::new(GrammarLoadErrorKind::InvalidCharLiteral)
                            .with_data(format!("line {}: missing closing quote", line)),
                    );
                }
                tokens.push(ScannedToken::new(GrammarToken::CharLit(literal), line));
            }
            '{' => {
                let start_line = line;
                let mut depth = 1usize;
                let mut body = String::new();

                loop {
                    match chars.next() {
                        Some('{') => {
                            depth += 1;
                            body.push('{');
                        }
                        Some('}') => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                            body.push('}');
                        }
                        Some('\n') => {
                            line += 1;
                            body.push('\n');
                        }
                        Some(c) => body.push(c),
                        None => {
                            return Err(GrammarLoadError::new(
                                GrammarLoadErrorKind::UnterminatedAction,
                            )
                            .with_data(format!("line {}", start_line)))
                        }
                    }
                }

                tokens.push(ScannedToken::new(
                    GrammarToken::Action(body.trim().to_string()),
                    start_line,
                ));
            }
            ':' => tokens.push(ScannedToken::new(GrammarToken::Colon, line)),
            '|' => tokens.push(ScannedToken::new(GrammarToken::Pipe, line)),
            ';' => tokens.push(ScannedToken::new(GrammarToken::Semi, line)),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                ident.push(c);
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(ScannedToken::new(GrammarToken::Ident(ident), line));
            }
            other => {
                return Err(GrammarLoadError::new(GrammarLoadErrorKind::InvalidRule)
                    .with_data(format!("line {}: unexpected character '{}'", line, other)))
            }
        }
    }

    Ok(tokens)
}

/// A grammar built from text, together with any non-fatal diagnostics
/// produced while loading it.
#[derive(Debug)]
pub struct LoadedGrammar {
    pub grammar: GrammarTable,
    pub warnings: Vec<Diagnostic>,
}

/// Loads a grammar from its textual description:
///
/// ```text
/// %token NUM STRING
/// %%
/// value : NUM { $$ = $1; }
///       | '[' values ']'
///       |
///       ;
/// %%
/// ```
///
/// The declaration section (`%token`, `%start`) is optional; when present it
/// is separated from the rules by `%%`. A trailing `%%` after the rules is
/// accepted. `//` starts a line comment.
pub fn load_grammar<S: AsRef<str>>(input: S) -> Result<LoadedGrammar, GrammarLoadError> {
    let tokens = scan_grammar(input.as_ref())?;
    let mut grammar = GrammarTable::new();
    let mut warnings = Vec::new();

    let mut cursor = tokens.iter().peekable();
    let mut saw_declarations = false;
    let mut start_override: Option<(String, usize)> = None;

    // declaration section
    loop {
        match cursor.peek().map(|scanned| &scanned.token) {
            Some(GrammarToken::TokenDecl) => {
                let decl_line = cursor.next().map(|scanned| scanned.line).unwrap_or(0);
                saw_declarations = true;

                let mut declared = 0usize;
                while let Some(GrammarToken::Ident(name)) =
                    cursor.peek().map(|scanned| &scanned.token)
                {
                    grammar.declare_token(name);
                    declared += 1;
                    cursor.next();
                }

                if declared == 0 {
                    return Err(GrammarLoadError::new(GrammarLoadErrorKind::InvalidDeclaration)
                        .with_data(format!("line {}: %token names nothing", decl_line)));
                }
            }
            Some(GrammarToken::StartDecl) => {
                let decl_line = cursor.next().map(|scanned| scanned.line).unwrap_or(0);
                saw_declarations = true;

                match cursor.next() {
                    Some(ScannedToken {
                        token: GrammarToken::Ident(name),
                        ..
                    }) => start_override = Some((name.clone(), decl_line)),
                    _ => {
                        return Err(GrammarLoadError::new(
                            GrammarLoadErrorKind::InvalidDeclaration,
                        )
                        .with_data(format!("line {}: %start names nothing", decl_line)))
                    }
                }
            }
            _ => break,
        }
    }

    // the `%%` separating declarations from rules
    if let Some(GrammarToken::SectionDelim) = cursor.peek().map(|scanned| &scanned.token) {
        cursor.next();
    } else if saw_declarations {
        return Err(GrammarLoadError::new(GrammarLoadErrorKind::InvalidDeclaration)
            .with_data("expected %% after declarations".to_string()));
    }

    // rules section
    let mut defined_lhs: HashSet<String> = HashSet::new();

    while let Some(scanned) = cursor.next() {
        let (lhs, lhs_line) = match &scanned.token {
            GrammarToken::SectionDelim => break,
            GrammarToken::Ident(name) => (name.clone(), scanned.line),
            other => {
                return Err(GrammarLoadError::new(GrammarLoadErrorKind::InvalidRule)
                    .with_data(format!(
                        "line {}: expected rule name, found {:?}",
                        scanned.line, other
                    )))
            }
        };

        if grammar.terminal_mapping(&Terminal::new(&lhs)).is_some() {
            warnings.push(Diagnostic::warning(
                Some(lhs_line),
                format!("'{}' is declared %token and defined as a nonterminal", lhs),
            ));
        }
        if defined_lhs.contains(&lhs) {
            warnings.push(Diagnostic::warning(
                Some(lhs_line),
                format!("duplicate definition of nonterminal '{}'", lhs),
            ));
        }

        match cursor.next() {
            Some(ScannedToken {
                token: GrammarToken::Colon,
                ..
            }) => {}
            _ => {
                return Err(GrammarLoadError::new(GrammarLoadErrorKind::InvalidRule)
                    .with_data(format!("line {}: expected ':' after '{}'", lhs_line, lhs)))
            }
        }

        // one or more '|'-separated alternatives, terminated by ';'
        let mut alternative_line = lhs_line;
        loop {
            let mut rhs_names: Vec<RhsName> = Vec::new();
            let mut action = String::new();

            let terminator = loop {
                match cursor.next() {
                    Some(ScannedToken {
                        token: GrammarToken::Ident(name),
                        line,
                    }) => {
                        if !action.is_empty() {
                            return Err(GrammarLoadError::new(GrammarLoadErrorKind::InvalidRule)
                                .with_data(format!(
                                    "line {}: symbol '{}' follows an action block",
                                    line, name
                                )));
                        }
                        rhs_names.push(RhsName::Ident(name.clone()));
                    }
                    Some(ScannedToken {
                        token: GrammarToken::CharLit(literal),
                        line,
                    }) => {
                        if !action.is_empty() {
                            return Err(GrammarLoadError::new(GrammarLoadErrorKind::InvalidRule)
                                .with_data(format!(
                                    "line {}: symbol follows an action block",
                                    line
                                )));
                        }
                        rhs_names.push(RhsName::Literal(*literal));
                    }
                    Some(ScannedToken {
                        token: GrammarToken::Action(body),
                        line,
                    }) => {
                        if !action.is_empty() {
                            return Err(GrammarLoadError::new(GrammarLoadErrorKind::InvalidRule)
                                .with_data(format!(
                                    "line {}: multiple action blocks in one alternative",
                                    line
                                )));
                        }
                        action = body.clone();
                    }
                    Some(ScannedToken {
                        token: GrammarToken::Pipe,
                        line,
                    }) => break Some(*line),
                    Some(ScannedToken {
                        token: GrammarToken::Semi,
                        ..
                    }) => break None,
                    Some(ScannedToken { token: other, line }) => {
                        return Err(GrammarLoadError::new(GrammarLoadErrorKind::InvalidRule)
                            .with_data(format!(
                                "line {}: unexpected {:?} in rule for '{}'",
                                line, other, lhs
                            )))
                    }
                    None => {
                        return Err(GrammarLoadError::new(GrammarLoadErrorKind::InvalidRule)
                            .with_data(format!("rule for '{}' is missing ';'", lhs)))
                    }
                }
            };

            let rhs = rhs_names
                .into_iter()
                .map(|name| match name {
                    RhsName::Ident(ident) => grammar.symbol_for_name(ident),
                    RhsName::Literal(literal) => {
                        SymbolRef::Terminal(grammar.declare_literal(literal))
                    }
                })
                .collect::<Vec<_>>();

            grammar.add_production(&lhs, rhs, &action, Some(alternative_line));

            match terminator {
                Some(pipe_line) => alternative_line = pipe_line,
                None => break,
            }
        }

        defined_lhs.insert(lhs);
    }

    if grammar.productions().next().is_none() {
        return Err(GrammarLoadError::new(GrammarLoadErrorKind::NoProductions));
    }

    if let Some((name, line)) = start_override {
        let defines_start = defined_lhs.contains(&name);
        if !defines_start {
            return Err(GrammarLoadError::new(GrammarLoadErrorKind::UnknownStartSymbol)
                .with_data(format!("line {}: '{}'", line, name)));
        }
        grammar.set_start(&name);
    }

    Ok(LoadedGrammar { grammar, warnings })
}

/// A right-hand-side element as written, before interning.
enum RhsName {
    Ident(String),
    Literal(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_GRAMMAR: &str = "
%token STRING NUM
%%
value : STRING
      | NUM
      | '[' values ']'
      ;
values : value more_values
       |
       ;
more_values : ',' values
            |
            ;
%%
";

    #[test]
    fn should_load_grammar_with_valid_test_input() {
        let loaded = load_grammar(TEST_GRAMMAR).unwrap();
        let grammar = loaded.grammar;

        assert!(loaded.warnings.is_empty());
        // eof builtin, STRING, NUM plus '[' ']' ','
        assert_eq!(6, grammar.terminals().count());
        assert_eq!(3, grammar.non_terminals().count());
        assert_eq!(7, grammar.productions().count());
    }

    #[test]
    fn should_assign_sequential_action_ids_to_every_production() {
        let loaded = load_grammar(TEST_GRAMMAR).unwrap();

        let action_ids = loaded
            .grammar
            .productions()
            .map(|production| production.action_id)
            .collect::<Vec<_>>();

        assert_eq!(action_ids, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn should_default_start_symbol_to_first_production() {
        let loaded = load_grammar(TEST_GRAMMAR).unwrap();
        let grammar = loaded.grammar;

        let start = grammar.start_non_terminal().unwrap();
        assert_eq!(
            Some(start),
            grammar.non_terminal_mapping(&NonTerminal::new("value"))
        );
    }

    #[test]
    fn should_honor_explicit_start_override() {
        let input = "
%start values
%%
value : NUM ;
values : value ;
";
        let loaded = load_grammar(input).unwrap();
        let grammar = loaded.grammar;

        let start = grammar.start_non_terminal().unwrap();
        assert_eq!(
            Some(start),
            grammar.non_terminal_mapping(&NonTerminal::new("values"))
        );
    }

    #[test]
    fn should_error_on_unknown_start_symbol() {
        let input = "
%start nothing
%%
value : NUM ;
";
        let res = load_grammar(input);

        assert_eq!(
            Err(GrammarLoadErrorKind::UnknownStartSymbol),
            res.map(|_| ()).map_err(|e| e.kind)
        );
    }

    #[test]
    fn should_capture_action_bodies_verbatim() {
        let input = "
%token NUM
%%
sum : NUM '+' NUM { $$ = $1 + $3; } ;
";
        let loaded = load_grammar(input).unwrap();
        let production = loaded.grammar.productions().next().unwrap();

        assert_eq!(production.action, "$$ = $1 + $3;");
        assert_eq!(production.rhs_len(), 3);
    }

    #[test]
    fn should_error_on_unterminated_action() {
        let input = "
%token NUM
%%
sum : NUM { $$ = $1; ;
";
        let res = load_grammar(input);

        assert_eq!(
            Err(GrammarLoadErrorKind::UnterminatedAction),
            res.map(|_| ()).map_err(|e| e.kind)
        );
    }

    #[test]
    fn should_warn_on_name_declared_as_token_and_defined_as_rule() {
        let input = "
%token value NUM
%%
value : NUM ;
start : value ;
";
        let loaded = load_grammar(input).unwrap();

        assert_eq!(loaded.warnings.len(), 1);
        let rendered = loaded.warnings[0].to_string();
        assert!(rendered.starts_with("grammar(4): warning:"), "{}", rendered);
    }

    #[test]
    fn should_warn_on_duplicate_nonterminal_definition() {
        let input = "
%%
value : 'a' ;
value : 'b' ;
";
        let loaded = load_grammar(input).unwrap();

        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0]
            .message
            .contains("duplicate definition of nonterminal 'value'"));
        // both alternatives survive the warning
        assert_eq!(loaded.grammar.productions().count(), 2);
    }

    #[test]
    fn should_scan_char_literal_escapes() {
        let input = "
%%
ws : '\\t' ws
   |
   ;
";
        let loaded = load_grammar(input).unwrap();
        let grammar = loaded.grammar;

        assert!(grammar.terminal_mapping(&Terminal::new("\t")).is_some());
    }

    #[test]
    fn should_error_on_empty_grammar() {
        let res = load_grammar("%%\n%%");

        assert_eq!(
            Err(GrammarLoadErrorKind::NoProductions),
            res.map(|_| ()).map_err(|e| e.kind)
        );
    }

    #[test]
    fn should_keep_terminal_and_nonterminal_namespaces_disjoint() {
        let loaded = load_grammar(TEST_GRAMMAR).unwrap();
        let grammar = loaded.grammar;

        for terminal in grammar.terminals() {
            assert!(grammar
                .non_terminal_mapping(&NonTerminal::new(terminal.as_ref()))
                .is_none());
        }
    }
}
