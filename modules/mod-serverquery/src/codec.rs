//! Text encoding used by the ServerQuery interface.
//!
//! A response line holds one or more records separated by `|`; a record is a
//! space separated list of `key=value` properties (or bare `key` flags).
//! Whitespace and separators inside values are backslash escaped.

use tsmunin_sdk::QueryError;

pub type Record = Vec<(String, String)>;

/// Terminal line of every command response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub id: u32,
    pub message: String,
}

impl Status {
    pub fn is_ok(&self) -> bool {
        self.id == 0
    }
}

pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            ' ' => out.push_str("\\s"),
            '|' => out.push_str("\\p"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            other => out.push(other),
        }
    }
    out
}

pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('s') => out.push(' '),
            Some('p') => out.push('|'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0c'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\x0b'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn parse_properties(input: &str) -> Record {
    input
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(|token| match token.split_once('=') {
            Some((key, value)) => (key.to_string(), unescape(value)),
            None => (token.to_string(), String::new()),
        })
        .collect()
}

pub fn parse_records(line: &str) -> Vec<Record> {
    line.split('|')
        .map(parse_properties)
        .filter(|record| !record.is_empty())
        .collect()
}

/// Parses an `error id=.. msg=..` line; any other line yields `None`.
pub fn parse_status(line: &str) -> Result<Option<Status>, QueryError> {
    let Some(rest) = line.strip_prefix("error ") else {
        return Ok(None);
    };

    let properties = parse_properties(rest);
    let id = lookup(&properties, "id")
        .and_then(|value| value.parse::<u32>().ok())
        .ok_or_else(|| QueryError::Protocol(format!("malformed status line `{}`", line)))?;
    let message = lookup(&properties, "msg").unwrap_or_default().to_string();

    Ok(Some(Status { id, message }))
}

pub fn lookup<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
