//! Field value coercion.
//!
//! Capacity values are always reported in bytes, whichever unit the
//! controller printed them with. Unit prefixes are binary (1 KB = 1024 B).

use crate::shared::parser::Record;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionKind {
    Bytes,
    Integer,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    Bytes(u64),
    Integer(i64),
    Text(String),
    /// The raw value could not be read as its declared kind.
    Absent,
}

impl TypedValue {
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypedValue::Bytes(_) | TypedValue::Integer(_))
    }
}

/// Field name to coercion kind. Unlisted fields are text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTypeTable {
    kinds: HashMap<String, CoercionKind>,
}

impl FieldTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, kind: CoercionKind) -> Self {
        self.kinds.insert(field.into(), kind);
        self
    }

    pub fn with_all<'a>(mut self, fields: impl IntoIterator<Item = &'a str>, kind: CoercionKind) -> Self {
        for field in fields {
            self.kinds.insert(field.to_string(), kind);
        }
        self
    }

    pub fn kind_of(&self, field: &str) -> CoercionKind {
        self.kinds.get(field).copied().unwrap_or(CoercionKind::Text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypedRecord {
    entries: Vec<(String, TypedValue)>,
}

impl TypedRecord {
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn coerce(record: &Record, table: &FieldTypeTable) -> TypedRecord {
    TypedRecord {
        entries: record
            .iter()
            .map(|(name, raw)| (name.to_string(), coerce_value(raw, table.kind_of(name))))
            .collect(),
    }
}

pub fn coerce_value(raw: &str, kind: CoercionKind) -> TypedValue {
    let raw = raw.trim();
    match kind {
        CoercionKind::Bytes => parse_bytes(raw).map_or(TypedValue::Absent, TypedValue::Bytes),
        CoercionKind::Integer => raw.parse().map_or(TypedValue::Absent, TypedValue::Integer),
        CoercionKind::Text => TypedValue::Text(raw.to_string()),
    }
}

fn byte_size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(\d+)(?:\.(\d+))?\s*([kmgtpe])?(i)?(b)?$")
            .expect("byte size pattern is valid")
    })
}

fn unit_multiplier(prefix: Option<&str>) -> Option<u64> {
    let exponent = match prefix.map(str::to_ascii_uppercase).as_deref() {
        None => 0,
        Some("K") => 1,
        Some("M") => 2,
        Some("G") => 3,
        Some("T") => 4,
        Some("P") => 5,
        Some("E") => 6,
        Some(_) => return None,
    };
    1024u64.checked_pow(exponent)
}

/// Largest byte count the metrics store can hold as a signed 64-bit integer.
pub const MAX_BYTES: u64 = i64::MAX as u64;

/// Reads `1073741824`, `512B`, `1024KB`, `1.50 GB` or `2TiB` as a byte count.
///
/// Counts above [`MAX_BYTES`] are rejected.
pub fn parse_bytes(raw: &str) -> Option<u64> {
    parse_unbounded_bytes(raw).filter(|&bytes| bytes <= MAX_BYTES)
}

fn parse_unbounded_bytes(raw: &str) -> Option<u64> {
    let caps = byte_size_pattern().captures(raw)?;
    let prefix = caps.get(3).map(|m| m.as_str());
    if prefix.is_none() && caps.get(4).is_some() {
        return None;
    }
    let multiplier = unit_multiplier(prefix)?;

    match caps.get(2) {
        None => caps[1].parse::<u64>().ok()?.checked_mul(multiplier),
        Some(fraction) => {
            let value: f64 = format!("{}.{}", &caps[1], fraction.as_str()).parse().ok()?;
            let bytes = (value * multiplier as f64).round();
            if bytes.is_finite() && bytes < u64::MAX as f64 {
                Some(bytes as u64)
            } else {
                None
            }
        }
    }
}
