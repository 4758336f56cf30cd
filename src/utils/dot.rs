//! Graphviz helpers for [`crate::analysis::Cfg::to_dot`].

/// Escapes `s` for use inside a double-quoted DOT label.
///
/// Instruction renderings contain string literals, comparison operators and SSA suffixes, so
/// quotes, backslashes and angle brackets are escaped and line breaks become `\n`.
#[must_use]
pub fn escape_dot(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            '<' => escaped.push_str("\\<"),
            '>' => escaped.push_str("\\>"),
            _ => escaped.push(c),
        }
    }
    escaped
}
