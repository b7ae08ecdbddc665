use crate::shared::coercion::{FieldTypeTable, TypedRecord, TypedValue};
use serde::Serialize;
use std::collections::BTreeMap;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

pub type TagSet = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bytes(u64),
    Integer(i64),
}

/// One tagged, timestamped time-series datum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Point {
    pub measurement: String,
    pub tags: TagSet,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: Timestamp,
}

/// How records of one command become points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementSchema {
    pub prefix: String,
    pub kind: String,
    pub field_types: FieldTypeTable,
    /// Record fields promoted to tags, in addition to the target tags.
    pub identifying_tags: Vec<String>,
}

impl MeasurementSchema {
    pub fn measurement(&self) -> String {
        format!("{}{}", self.prefix, self.kind)
    }

    fn is_identifying(&self, field: &str) -> bool {
        self.identifying_tags.iter().any(|tag| tag == field)
    }
}

/// Points gathered from one target during one run, in command order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionBatch {
    pub target: String,
    pub points: Vec<Point>,
    /// Collection was abandoned after a connection-level failure.
    pub aborted: bool,
}

impl CollectionBatch {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            points: Vec::new(),
            aborted: false,
        }
    }

    pub fn aborted(target: impl Into<String>) -> Self {
        Self {
            aborted: true,
            ..Self::new(target)
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Identifying tags come from the first occurrence of their name in the
/// record; numeric fields come from the last.
pub fn build_point(
    record: &TypedRecord,
    schema: &MeasurementSchema,
    target_tags: &TagSet,
    timestamp: Timestamp,
) -> Point {
    let mut tags = target_tags.clone();
    for name in &schema.identifying_tags {
        let tag_value = match record.get(name) {
            Some(TypedValue::Text(text)) => text.clone(),
            Some(TypedValue::Bytes(n)) => n.to_string(),
            Some(TypedValue::Integer(n)) => n.to_string(),
            Some(TypedValue::Absent) | None => continue,
        };
        // record fields win over configured tags of the same name
        if !tag_value.is_empty() {
            tags.insert(name.clone(), tag_value);
        }
    }

    let mut fields = BTreeMap::new();
    for (name, value) in record.iter() {
        if schema.is_identifying(name) {
            continue;
        }
        // a repeated name (one per volume copy) takes its last value
        match value {
            TypedValue::Bytes(n) => {
                fields.insert(name.to_string(), FieldValue::Bytes(*n));
            }
            TypedValue::Integer(n) => {
                fields.insert(name.to_string(), FieldValue::Integer(*n));
            }
            TypedValue::Absent => {
                fields.remove(name);
            }
            TypedValue::Text(_) => {}
        }
    }

    Point {
        measurement: schema.measurement(),
        tags,
        fields,
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::coercion::{coerce, CoercionKind};
    use crate::shared::parser::{parse_output, Delimiter, OutputFormat, Record};

    fn pool_schema() -> MeasurementSchema {
        MeasurementSchema {
            prefix: "pool_".into(),
            kind: "capacity".into(),
            field_types: FieldTypeTable::new()
                .with("capacity", CoercionKind::Bytes)
                .with("free_capacity", CoercionKind::Bytes)
                .with("vdisk_count", CoercionKind::Integer),
            identifying_tags: vec!["id".into(), "name".into()],
        }
    }

    fn target_tags() -> TagSet {
        TagSet::from([("target".to_string(), "svcA".to_string())])
    }

    #[test]
    fn test_pool_listing_end_to_end() {
        let schema = pool_schema();
        let records = parse_output(
            "name capacity\npool0 1073741824\n",
            &OutputFormat::Tabular(Delimiter::Whitespace),
        );
        assert_eq!(records.len(), 1);

        let typed = coerce(&records[0], &schema.field_types);
        let point = build_point(&typed, &schema, &target_tags(), 1_700_000_000_000);

        assert_eq!(point.measurement, "pool_capacity");
        assert_eq!(
            point.tags,
            TagSet::from([
                ("target".to_string(), "svcA".to_string()),
                ("name".to_string(), "pool0".to_string()),
            ])
        );
        assert_eq!(
            point.fields,
            BTreeMap::from([("capacity".to_string(), FieldValue::Bytes(1073741824))])
        );
        assert_eq!(point.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_build_is_idempotent() {
        let schema = pool_schema();
        let record: Record =
            vec![("id", "0"), ("name", "p"), ("capacity", "1GB"), ("vdisk_count", "3")]
                .into_iter()
                .collect();
        let typed = coerce(&record, &schema.field_types);

        let first = build_point(&typed, &schema, &target_tags(), 42);
        let second = build_point(&typed, &schema, &target_tags(), 42);

        assert_eq!(first, second);
    }

    #[test]
    fn test_absent_and_text_values_are_not_fields() {
        let schema = pool_schema();
        let record: Record = vec![
            ("name", "p"),
            ("status", "online"),
            ("capacity", ""),
            ("free_capacity", "garbage"),
            ("vdisk_count", "7"),
        ]
        .into_iter()
        .collect();
        let typed = coerce(&record, &schema.field_types);

        let point = build_point(&typed, &schema, &target_tags(), 0);

        assert_eq!(
            point.fields,
            BTreeMap::from([("vdisk_count".to_string(), FieldValue::Integer(7))])
        );
        assert!(!point.tags.contains_key("status"));
    }

    #[test]
    fn test_identifying_numeric_field_stays_a_tag() {
        let schema = MeasurementSchema {
            field_types: pool_schema().field_types.with("id", CoercionKind::Integer),
            ..pool_schema()
        };
        let record: Record =
            vec![("id", "12"), ("capacity", "5")].into_iter().collect();
        let typed = coerce(&record, &schema.field_types);

        let point = build_point(&typed, &schema, &target_tags(), 0);

        assert_eq!(point.tags.get("id").map(String::as_str), Some("12"));
        assert!(!point.fields.contains_key("id"));
    }

    #[test]
    fn test_record_tag_overrides_target_tag() {
        let schema = pool_schema();
        let mut tags = target_tags();
        tags.insert("name".into(), "configured".into());
        let record: Record =
            vec![("name", "pool9"), ("capacity", "1")].into_iter().collect();
        let typed = coerce(&record, &schema.field_types);

        let point = build_point(&typed, &schema, &tags, 0);

        assert_eq!(point.tags.get("name").map(String::as_str), Some("pool9"));
    }

    #[test]
    fn test_empty_identifying_value_is_not_tagged() {
        let schema = pool_schema();
        let record: Record =
            vec![("id", ""), ("name", "p"), ("capacity", "1")].into_iter().collect();
        let typed = coerce(&record, &schema.field_types);

        let point = build_point(&typed, &schema, &target_tags(), 0);

        assert!(!point.tags.contains_key("id"));
    }

    #[test]
    fn test_repeated_field_takes_last_value_and_tag_takes_first() {
        let schema = pool_schema();
        let record: Record = vec![
            ("name", "p0"),
            ("capacity", "10"),
            ("name", "p1"),
            ("capacity", "20"),
            ("free_capacity", "5"),
            ("free_capacity", ""),
        ]
        .into_iter()
        .collect();
        let typed = coerce(&record, &schema.field_types);

        let point = build_point(&typed, &schema, &target_tags(), 0);

        assert_eq!(point.tags.get("name").map(String::as_str), Some("p0"));
        assert_eq!(point.fields.get("capacity"), Some(&FieldValue::Bytes(20)));
        assert!(!point.fields.contains_key("free_capacity"));
    }
}
