//! Input file preprocessing.
//!
//! Import files may contain `{{ ... }}` actions that are evaluated before the
//! YAML is parsed:
//!
//! ```text
//! password: {{ env "DB_PASSWORD" | printf "%q" }}
//! user: {{ env "DB_USER" "admin" }}
//! ```
//!
//! `env` returns the variable's value, else the optional default, else an
//! empty string. `print`, `println` and `printf` behave like their Go
//! template builtins for string operands, and `|` passes the value on the
//! left as the last argument of the command on the right. `{{- ` and ` -}}`
//! trim surrounding whitespace, and `{{/* ... */}}` is a comment.

use std::env;

use regex::Regex;

use crate::error::{MigratorError, Result};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const COMMENT_OPEN: &str = "/*";
const COMMENT_CLOSE: &str = "*/";

const TOKEN_PATTERN: &str = r#"^(?:"(?:[^"\\]|\\.)*"|`[^`]*`|[A-Za-z_][A-Za-z0-9_]*|\|)"#;

/// A parsed action argument or name.
#[derive(Debug, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Pipe,
}

/// Expand all actions in `input`, reading variables from the process environment.
pub fn expand(input: &str) -> Result<String> {
    expand_with(input, |name| env::var(name).ok())
}

/// Expand all actions in `input`, resolving `env` through `lookup`.
pub fn expand_with<F>(input: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let token_re = Regex::new(TOKEN_PATTERN)
        .map_err(|e| MigratorError::Template(format!("internal pattern error: {}", e)))?;

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut trim_next = false;

    while let Some(start) = rest.find(OPEN) {
        let mut text = &rest[..start];
        if trim_next {
            text = text.trim_start();
        }

        let line = line_of(input, rest, start);
        let after_open = &rest[start + OPEN.len()..];
        let comment = is_comment(after_open);
        let (mut body, consumed) = split_action(after_open, comment, line)?;

        if let Some(stripped) = trim_marker_left(body) {
            text = text.trim_end();
            body = stripped;
        }
        trim_next = false;
        if let Some(stripped) = trim_marker_right(body) {
            trim_next = true;
            body = stripped;
        }

        out.push_str(text);
        if !comment {
            let value = evaluate(body.trim(), &token_re, &lookup)
                .map_err(|msg| MigratorError::Template(format!("line {}: {}", line, msg)))?;
            out.push_str(&value);
        }

        rest = &after_open[consumed..];
    }

    if trim_next {
        rest = rest.trim_start();
    }
    out.push_str(rest);

    Ok(out)
}

/// A comment must open the action, right after `{{` or `{{- `.
fn is_comment(after_open: &str) -> bool {
    after_open.starts_with(COMMENT_OPEN)
        || trim_marker_left(after_open).is_some_and(|rest| rest.starts_with(COMMENT_OPEN))
}

/// Find the end of an action, skipping `}}` inside string literals and comments.
/// Returns the action body and the number of bytes consumed including `}}`.
fn split_action(s: &str, comment: bool, line: usize) -> Result<(&str, usize)> {
    if comment {
        return split_comment(s, line);
    }

    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    if bytes[i..].first() == Some(&b'\n') {
                        return Err(MigratorError::Template(format!(
                            "line {}: unterminated quoted string",
                            line
                        )));
                    }
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(MigratorError::Template(format!(
                        "line {}: unterminated quoted string",
                        line
                    )));
                }
            }
            b'`' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'`' {
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(MigratorError::Template(format!(
                        "line {}: unterminated raw string",
                        line
                    )));
                }
            }
            b'}' if s[i..].starts_with(CLOSE) => return Ok((&s[..i], i + CLOSE.len())),
            _ => {}
        }
        i += 1;
    }

    Err(MigratorError::Template(format!(
        "line {}: unclosed action",
        line
    )))
}

/// The closing `*/` must be followed directly by `}}` or ` -}}`.
fn split_comment(s: &str, line: usize) -> Result<(&str, usize)> {
    let comment_start = s.find(COMMENT_OPEN).unwrap_or(0);
    let inner = &s[comment_start + COMMENT_OPEN.len()..];
    let end = inner.find(COMMENT_CLOSE).ok_or_else(|| {
        MigratorError::Template(format!("line {}: unclosed comment", line))
    })?;

    let after = &inner[end + COMMENT_CLOSE.len()..];
    let close = after.find(CLOSE).ok_or_else(|| {
        MigratorError::Template(format!("line {}: unclosed action", line))
    })?;
    let between = &after[..close];
    if !between.is_empty() && trim_marker_right(between) != Some("") {
        return Err(MigratorError::Template(format!(
            "line {}: comment ends before closing delimiter",
            line
        )));
    }

    let body_end = s.len() - after.len() + close;
    Ok((&s[..body_end], body_end + CLOSE.len()))
}

fn trim_marker_left(body: &str) -> Option<&str> {
    body.strip_prefix("- ")
        .or_else(|| body.strip_prefix("-\t"))
        .or_else(|| body.strip_prefix("-\n"))
}

fn trim_marker_right(body: &str) -> Option<&str> {
    body.strip_suffix(" -")
        .or_else(|| body.strip_suffix("\t-"))
        .or_else(|| body.strip_suffix("\n-"))
}

/// Run the pipeline in one action body.
fn evaluate<F>(body: &str, token_re: &Regex, lookup: &F) -> std::result::Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let tokens = tokenize(body, token_re)?;

    let mut piped = None;
    for command in tokens.split(|t| *t == Token::Pipe) {
        piped = Some(run_command(command, piped, lookup)?);
    }
    piped.ok_or_else(|| "missing value for command".to_string())
}

fn run_command<F>(
    command: &[Token],
    piped: Option<String>,
    lookup: &F,
) -> std::result::Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    match command.split_first() {
        None => Err("missing value for command".into()),
        Some((Token::Str(literal), rest)) => {
            if !rest.is_empty() || piped.is_some() {
                return Err(format!(
                    "can't give argument to non-function \"{}\"",
                    literal
                ));
            }
            Ok(literal.clone())
        }
        Some((Token::Ident(name), rest)) => {
            let mut args = rest
                .iter()
                .map(|t| match t {
                    Token::Str(s) => Ok(s.clone()),
                    Token::Ident(id) => Err(format!(
                        "{}: argument '{}' must be a quoted string",
                        name, id
                    )),
                    Token::Pipe => Err(format!("{}: unexpected '|'", name)),
                })
                .collect::<std::result::Result<Vec<String>, String>>()?;
            args.extend(piped);
            call(name, &args, lookup)
        }
        Some((Token::Pipe, _)) => Err("unexpected '|'".into()),
    }
}

fn call<F>(name: &str, args: &[String], lookup: &F) -> std::result::Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    match name {
        "env" => match args {
            [var] => Ok(lookup(var).unwrap_or_default()),
            [var, default] => Ok(lookup(var).unwrap_or_else(|| default.clone())),
            _ => Err(format!(
                "env: expected 1 or 2 arguments, got {}",
                args.len()
            )),
        },
        // Go only inserts spaces between operands that are not strings.
        "print" => Ok(args.concat()),
        "println" => Ok(format!("{}\n", args.join(" "))),
        "printf" => match args.split_first() {
            Some((format, rest)) => sprintf(format, rest),
            None => Err("printf: missing format".into()),
        },
        _ => Err(format!("function \"{}\" not defined", name)),
    }
}

/// `printf` over string operands. Supports `%s`, `%v`, `%q` and `%%`, and
/// reports missing or extra operands inline the way Go's `fmt` does.
fn sprintf(format: &str, args: &[String]) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(format.len());
    let mut args = args.iter();
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(verb @ ('s' | 'v' | 'q')) => match args.next() {
                Some(arg) if verb == 'q' => out.push_str(&quote(arg)),
                Some(arg) => out.push_str(arg),
                None => out.push_str(&format!("%!{}(MISSING)", verb)),
            },
            Some(verb) => return Err(format!("printf: unsupported verb '%{}'", verb)),
            None => out.push_str("%!(NOVERB)"),
        }
    }

    let extra: Vec<String> = args.map(|a| format!("string={}", a)).collect();
    if !extra.is_empty() {
        out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
    }
    Ok(out)
}

/// Double-quote `s` with Go escapes, which YAML also reads back.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{7}' => out.push_str("\\a"),
            '\u{8}' => out.push_str("\\b"),
            '\u{b}' => out.push_str("\\v"),
            '\u{c}' => out.push_str("\\f"),
            c if c.is_control() && (c as u32) < 0x100 => {
                out.push_str(&format!("\\x{:02x}", c as u32))
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn tokenize(body: &str, token_re: &Regex) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut rest = body.trim_start();

    while !rest.is_empty() {
        let m = token_re
            .find(rest)
            .ok_or_else(|| format!("unexpected input in action: {}", rest))?;
        let raw = m.as_str();
        let token = if raw == "|" {
            Token::Pipe
        } else if let Some(inner) = raw.strip_prefix('"') {
            Token::Str(unescape(&inner[..inner.len() - 1])?)
        } else if let Some(inner) = raw.strip_prefix('`') {
            Token::Str(inner[..inner.len() - 1].to_string())
        } else {
            Token::Ident(raw.to_string())
        };

        let after = &rest[m.end()..];
        let separated = after.is_empty()
            || after.starts_with(char::is_whitespace)
            || after.starts_with('|')
            || token == Token::Pipe;
        if !separated {
            return Err(format!("unexpected input after '{}'", raw));
        }
        tokens.push(token);
        rest = after.trim_start();
    }

    Ok(tokens)
}

/// Resolve escapes inside a double-quoted literal.
fn unescape(s: &str) -> std::result::Result<String, String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some('\\') => result.push('\\'),
            Some(other) => return Err(format!("unknown escape sequence '\\{}'", other)),
            None => return Err("trailing backslash".into()),
        }
    }
    Ok(result)
}

/// 1-based line number of `rest[offset]` within `input`.
fn line_of(input: &str, rest: &str, offset: usize) -> usize {
    let consumed = input.len() - rest.len() + offset;
    input[..consumed].matches('\n').count() + 1
}
