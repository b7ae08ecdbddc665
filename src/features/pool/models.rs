use crate::shared::coercion::{CoercionKind, FieldTypeTable};
use crate::shared::parser::{Delimiter, OutputFormat};
use crate::shared::point::MeasurementSchema;

/// Storage pools (managed disk groups), one line per pool.
pub const POOL_LISTING_COMMAND: &str = "lsmdiskgrp -bytes -delim ,";

pub const POOL_LISTING_FORMAT: OutputFormat = OutputFormat::Tabular(Delimiter::Char(','));

const CAPACITY_FIELDS: [&str; 8] = [
    "capacity",
    "free_capacity",
    "virtual_capacity",
    "used_capacity",
    "real_capacity",
    "compression_virtual_capacity",
    "compression_compressed_capacity",
    "compression_uncompressed_capacity",
];

const COUNT_FIELDS: [&str; 4] = ["mdisk_count", "vdisk_count", "overallocation", "extent_size"];

pub fn pool_schema() -> MeasurementSchema {
    MeasurementSchema {
        prefix: "pool_".to_string(),
        kind: "capacity".to_string(),
        field_types: FieldTypeTable::new()
            .with_all(CAPACITY_FIELDS, CoercionKind::Bytes)
            .with_all(COUNT_FIELDS, CoercionKind::Integer),
        identifying_tags: vec!["id".to_string(), "name".to_string()],
    }
}
