//! Dotted key paths and section lookup.

use std::fmt;

use toml::{Table, Value};

/// An ordered, non-empty list of keys locating a table inside a document,
/// written `config.misc` in model declarations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// Parses a dotted path. Returns `None` when the path is empty or has an
    /// empty segment (`a..b`, `.a`, `a.`).
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<String> = path.split('.').map(str::to_owned).collect();
        if path.is_empty() || segments.iter().any(String::is_empty) {
            return None;
        }
        Some(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Walks `root` one segment at a time and returns the table at `path`.
///
/// A missing segment, or a value along the way that is not a table, means
/// the section is absent. That is an ordinary outcome, not an error.
pub fn resolve<'a>(root: &'a Table, path: &KeyPath) -> Option<&'a Table> {
    let (first, rest) = path.segments.split_first()?;
    let mut current = root.get(first)?;

    for segment in rest {
        current = current.as_table()?.get(segment)?;
    }

    match current {
        Value::Table(table) => Some(table),
        _ => None,
    }
}
