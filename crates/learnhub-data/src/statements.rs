//! Split SQL scripts into individual statements
//!
//! Statements are separated by top-level semicolons. Semicolons inside quoted
//! strings (including `E'...'` escape strings), quoted identifiers,
//! dollar-quoted bodies and comments do not split.
//! Comments are dropped from the output.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lexer {
    Normal,
    SingleQuoted,
    /// `E'...'`, where a backslash escapes the next character
    EscapeQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// Split `sql` into trimmed, non-empty statements without trailing semicolons
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = Lexer::Normal;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        let next = match &state {
            Lexer::Normal => match c {
                ';' => {
                    flush(&mut current, &mut statements);
                    None
                }
                '\'' => {
                    let escape = opens_escape_string(&current);
                    current.push(c);
                    Some(if escape {
                        Lexer::EscapeQuoted
                    } else {
                        Lexer::SingleQuoted
                    })
                }
                '"' => {
                    current.push(c);
                    Some(Lexer::DoubleQuoted)
                }
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    Some(Lexer::LineComment)
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    Some(Lexer::BlockComment(1))
                }
                '$' => match dollar_tag(&chars) {
                    Some(tag) => {
                        // tag characters plus the closing '$'
                        for _ in 0..=tag.chars().count() {
                            chars.next();
                        }
                        current.push('$');
                        current.push_str(&tag);
                        current.push('$');
                        Some(Lexer::DollarQuoted(tag))
                    }
                    None => {
                        current.push(c);
                        None
                    }
                },
                _ => {
                    current.push(c);
                    None
                }
            },
            Lexer::SingleQuoted | Lexer::DoubleQuoted => {
                current.push(c);
                let quote = if state == Lexer::SingleQuoted { '\'' } else { '"' };
                if c != quote {
                    None
                } else if chars.peek() == Some(&quote) {
                    // doubled quote is an escaped quote
                    chars.next();
                    current.push(quote);
                    None
                } else {
                    Some(Lexer::Normal)
                }
            }
            Lexer::EscapeQuoted => {
                current.push(c);
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            current.push(escaped);
                        }
                        None
                    }
                    '\'' if chars.peek() == Some(&'\'') => {
                        chars.next();
                        current.push('\'');
                        None
                    }
                    '\'' => Some(Lexer::Normal),
                    _ => None,
                }
            }
            Lexer::LineComment => (c == '\n').then(|| {
                current.push('\n');
                Lexer::Normal
            }),
            Lexer::BlockComment(depth) => {
                let depth = *depth;
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    Some(if depth <= 1 {
                        current.push(' ');
                        Lexer::Normal
                    } else {
                        Lexer::BlockComment(depth.saturating_sub(1))
                    })
                } else if c == '/' && chars.peek() == Some(&'*') {
                    chars.next();
                    Some(Lexer::BlockComment(depth.saturating_add(1)))
                } else {
                    None
                }
            }
            Lexer::DollarQuoted(tag) => {
                current.push(c);
                if c == '$' && closes_dollar_quote(&chars, tag) {
                    for _ in 0..=tag.chars().count() {
                        if let Some(ch) = chars.next() {
                            current.push(ch);
                        }
                    }
                    Some(Lexer::Normal)
                } else {
                    None
                }
            }
        };

        if let Some(next) = next {
            state = next;
        }
    }

    flush(&mut current, &mut statements);
    statements
}

fn flush(current: &mut String, statements: &mut Vec<String>) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

/// Whether a quote appended to `current` opens an `E'...'` escape string
///
/// The `E` must stand alone, not end an identifier such as `type`.
fn opens_escape_string(current: &str) -> bool {
    let mut rev = current.chars().rev();
    matches!(rev.next(), Some('E' | 'e'))
        && !rev
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Tag following an opening `$`, if the `$` starts a dollar quote
///
/// `$$` yields an empty tag; `$1` (a positional parameter) yields `None`.
fn dollar_tag(chars: &Peekable<Chars<'_>>) -> Option<String> {
    let mut lookahead = chars.clone();
    let mut tag = String::new();

    while let Some(&c) = lookahead.peek() {
        if c == '$' {
            return Some(tag);
        }
        let valid = c == '_' || c.is_ascii_alphabetic() || (!tag.is_empty() && c.is_ascii_digit());
        if !valid {
            return None;
        }
        tag.push(c);
        lookahead.next();
    }

    None
}

/// Whether the characters after a `$` are `tag$`
fn closes_dollar_quote(chars: &Peekable<Chars<'_>>, tag: &str) -> bool {
    let mut lookahead = chars.clone();
    tag.chars().all(|expected| lookahead.next() == Some(expected)) && lookahead.next() == Some('$')
}

#[cfg(test)]
mod tests {
    use super::*;

    const FUNCTION: &str = "CREATE OR REPLACE FUNCTION app.touch()
RETURNS trigger AS $body$
BEGIN
    NEW.updated_at := now();
    RETURN NEW;
END;
$body$;
SELECT 1;";

    #[test]
    fn test_splits_on_top_level_semicolons() {
        let statements = split_statements("SELECT 1; SELECT 2;\n\nSELECT 3");
        assert_eq!(statements, vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
    }

    #[test]
    fn test_keeps_semicolons_inside_strings() {
        let statements =
            split_statements("INSERT INTO t VALUES ('a;b', 'it''s; fine'); SELECT \"odd;name\" FROM t;");
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "INSERT INTO t VALUES ('a;b', 'it''s; fine')");
        assert_eq!(statements[1], "SELECT \"odd;name\" FROM t");
    }

    #[test]
    fn test_backslash_escapes_inside_escape_strings() {
        let statements = split_statements(r"INSERT INTO app.t VALUES (E'it\'s; fine'); SELECT 1;");
        assert_eq!(
            statements,
            vec![r"INSERT INTO app.t VALUES (E'it\'s; fine')", "SELECT 1"]
        );

        let statements = split_statements(r"SELECT e'a\\'; SELECT 'b\'; SELECT 2");
        assert_eq!(statements, vec![r"SELECT e'a\\'", r"SELECT 'b\'", "SELECT 2"]);
    }

    #[test]
    fn test_trailing_e_of_identifier_is_not_an_escape_prefix() {
        let statements = split_statements(r"SELECT type'a\'; SELECT 2");
        assert_eq!(statements, vec![r"SELECT type'a\'", "SELECT 2"]);
    }

    #[test]
    fn test_keeps_function_bodies_whole() {
        let statements = split_statements(FUNCTION);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE OR REPLACE FUNCTION"));
        assert!(statements[0].ends_with("$body$"));
        assert!(statements[0].contains("NEW.updated_at := now();"));
        assert_eq!(statements[1], "SELECT 1");
    }

    #[test]
    fn test_positional_parameters_are_not_dollar_quotes() {
        let statements = split_statements("SELECT $1; SELECT $2");
        assert_eq!(statements, vec!["SELECT $1", "SELECT $2"]);
    }

    #[test]
    fn test_drops_comments() {
        let sql = "-- leading; comment\nSELECT 1; /* block; /* nested; */ still */ SELECT 2; -- trailing";
        assert_eq!(split_statements(sql), vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_empty_and_comment_only_scripts() {
        assert!(split_statements("").is_empty());
        assert!(split_statements(" ;; -- nothing\n").is_empty());
    }

    #[test]
    fn test_shipped_definitions_split_cleanly() {
        for definition in crate::tables::SchemaDefinition::all() {
            let statements = split_statements(&definition.sql);
            assert!(!statements.is_empty(), "{} is empty", definition.name);
            assert!(
                statements.iter().all(|s| !s.contains("--")),
                "{} kept a comment",
                definition.name
            );
        }
    }
}
