use crate::shared::coercion::{CoercionKind, FieldTypeTable};
use crate::shared::parser::{Delimiter, OutputFormat};
use crate::shared::point::MeasurementSchema;

/// Volumes (virtual disks), one line per volume.
pub const VOLUME_LISTING_COMMAND: &str = "lsvdisk -bytes -delim ,";

pub const VOLUME_LISTING_FORMAT: OutputFormat = OutputFormat::Tabular(Delimiter::Char(','));

pub const VOLUME_DETAIL_FORMAT: OutputFormat = OutputFormat::Vertical(Delimiter::Char(','));

/// Listing column holding the identifier handed to the detail query.
pub const VOLUME_ID_FIELD: &str = "id";

/// Full attribute set of one volume.
pub fn volume_detail_command(id: &str) -> String {
    format!("{} {}", VOLUME_LISTING_COMMAND, id)
}

/// Identifiers end up on a remote command line.
pub fn is_valid_volume_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

const CAPACITY_FIELDS: [&str; 6] = [
    "capacity",
    "virtual_capacity",
    "used_capacity",
    "real_capacity",
    "free_capacity",
    "uncompressed_used_capacity",
];

const COUNT_FIELDS: [&str; 2] = ["copy_count", "fc_map_count"];

pub fn volume_schema() -> MeasurementSchema {
    MeasurementSchema {
        prefix: "volume_".to_string(),
        kind: "capacity".to_string(),
        field_types: FieldTypeTable::new()
            .with_all(CAPACITY_FIELDS, CoercionKind::Bytes)
            .with_all(COUNT_FIELDS, CoercionKind::Integer),
        identifying_tags: vec![
            "id".to_string(),
            "name".to_string(),
            "vdisk_UID".to_string(),
            "status".to_string(),
            "mdisk_grp_name".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_command_carries_id() {
        assert_eq!(volume_detail_command("17"), "lsvdisk -bytes -delim , 17");
    }

    #[test]
    fn test_volume_id_validation() {
        assert!(is_valid_volume_id("0"));
        assert!(is_valid_volume_id("vol_01-a"));
        assert!(!is_valid_volume_id(""));
        assert!(!is_valid_volume_id("1;reboot"));
        assert!(!is_valid_volume_id("1 2"));
    }
}
