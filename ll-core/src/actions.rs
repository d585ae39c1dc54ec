//! Textual rewriting of semantic-action bodies.
//!
//! Positional references are resolved against the value stack at the moment
//! the action runs: `$1` is the value on top of the stack (the most recently
//! matched symbol), `$2` the one beneath it, and so on. `$$` names the
//! action's result slot. Rewriting is purely textual and performs no
//! validation of the surrounding action code.

/// The identifier substituted for `$$` in rewritten action bodies.
pub const RESULT_IDENTIFIER: &str = "yyval";

/// Rewrites one action body against the rhs length of its production.
///
/// `$$` becomes [RESULT_IDENTIFIER]; `$K` for 1 <= K <= `rhs_len` becomes an
/// index expression for the value-stack element K slots from the top.
/// Out-of-range positional references and all other text pass through
/// unchanged.
pub fn expand_action_body(body: &str, rhs_len: usize) -> String {
    let mut expanded = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            expanded.push(c);
            continue;
        }

        match chars.peek() {
            Some('$') => {
                chars.next();
                expanded.push_str(RESULT_IDENTIFIER);
            }
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }

                let position = digits.parse::<usize>().unwrap_or(0);
                if (1..=rhs_len).contains(&position) {
                    expanded.push_str(&format!("vs[vs.len() - {}]", position));
                } else {
                    expanded.push('$');
                    expanded.push_str(&digits);
                }
            }
            _ => expanded.push('$'),
        }
    }

    expanded
}
