mod collector;
mod models;

pub use collector::VolumeCollector;
pub use models::{
    is_valid_volume_id, volume_detail_command, volume_schema, VOLUME_DETAIL_FORMAT,
    VOLUME_ID_FIELD, VOLUME_LISTING_COMMAND, VOLUME_LISTING_FORMAT,
};
