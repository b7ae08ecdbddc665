//! Parsers for controller CLI output.
//!
//! The controller answers in two shapes:
//!
//! * tabular: one header line followed by one line per entity
//!   (`lsmdiskgrp -delim ,`, `lsvdisk -delim ,`),
//! * vertical: one `name value` pair per line describing a single entity
//!   (`lsvdisk -delim , <id>`).

use crate::shared::error::ParseError;
use log::{debug, warn};

/// Token separator used by a command's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// Runs of whitespace, as printed without `-delim`.
    Whitespace,
    /// A single character, as printed with `-delim <c>`.
    Char(char),
}

impl Delimiter {
    fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Delimiter::Whitespace => line.split_whitespace().collect(),
            Delimiter::Char(c) => line.split(*c).map(str::trim).collect(),
        }
    }

    fn split_pair<'a>(&self, line: &'a str) -> (&'a str, &'a str) {
        let line = line.trim();
        let split = match self {
            Delimiter::Whitespace => line.split_once(char::is_whitespace),
            Delimiter::Char(c) => line.split_once(*c),
        };
        match split {
            Some((name, value)) => (name.trim(), value.trim()),
            None => (line, ""),
        }
    }
}

/// How a command's output must be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Tabular(Delimiter),
    Vertical(Delimiter),
}

/// One row (tabular) or one entity (vertical), fields in output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    entries: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value recorded under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Parses raw command output into records.
///
/// Malformed tabular lines are logged and skipped; they never abort the
/// rest of the output.
pub fn parse_output(raw: &str, format: &OutputFormat) -> Vec<Record> {
    match format {
        OutputFormat::Tabular(delimiter) => match parse_tabular(raw, *delimiter) {
            Ok(records) => records,
            Err(e) => {
                debug!("No records in tabular output: {}", e);
                Vec::new()
            }
        },
        OutputFormat::Vertical(delimiter) => parse_vertical(raw, *delimiter).into_iter().collect(),
    }
}

/// Header-driven parse; errors only when no header line exists.
pub fn parse_tabular(raw: &str, delimiter: Delimiter) -> Result<Vec<Record>, ParseError> {
    let mut lines = raw
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header_line) = lines.next().ok_or(ParseError::MissingHeader)?;
    let header = delimiter.split(header_line.trim());

    let mut records = Vec::new();
    for (index, line) in lines {
        match parse_row(&header, line, delimiter, index + 1) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping malformed line: {}", e),
        }
    }

    Ok(records)
}

fn parse_row(
    header: &[&str],
    line: &str,
    delimiter: Delimiter,
    line_number: usize,
) -> Result<Record, ParseError> {
    let tokens = delimiter.split(line.trim());
    if tokens.len() != header.len() {
        return Err(ParseError::FieldCountMismatch {
            line: line_number,
            expected: header.len(),
            found: tokens.len(),
        });
    }

    Ok(header.iter().copied().zip(tokens).collect())
}

/// Single-entity parse; `None` when the output holds no pair at all.
pub fn parse_vertical(raw: &str, delimiter: Delimiter) -> Option<Record> {
    let record: Record = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| delimiter.split_pair(line))
        .collect();

    if record.is_empty() {
        None
    } else {
        Some(record)
    }
}
