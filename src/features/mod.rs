pub mod pool;
pub mod volume;

use crate::shared::traits::EntityCollector;

/// Entity collectors in the order their commands are issued.
pub fn default_collectors() -> Vec<Box<dyn EntityCollector>> {
    vec![
        Box::new(pool::PoolCollector::new()),
        Box::new(volume::VolumeCollector::new()),
    ]
}
