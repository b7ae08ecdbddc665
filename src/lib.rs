pub mod features;
pub mod shared;

// Re-export commonly used items from features
pub use features::default_collectors;
pub use features::pool::PoolCollector;
pub use features::volume::VolumeCollector;

// Re-export shared functionality
pub use shared::coercion::{coerce, CoercionKind, FieldTypeTable, TypedRecord, TypedValue};
pub use shared::collector::RunCollector;
pub use shared::config::{Config, DatabaseConfig, SshSettings, Target};
pub use shared::error::{
    AppError,
    CollectionError,
    ConfigError,
    ExecError,
    ParseError,
    StorageError,
};
pub use shared::executor::SshExecutor;
pub use shared::parser::{parse_output, Delimiter, OutputFormat, Record};
pub use shared::point::{build_point, CollectionBatch, FieldValue, MeasurementSchema, Point};
pub use shared::storage::{publish_batches, InfluxDbStorage, PublishSummary};
pub use shared::traits::{
    BatchPublisher,
    Clock,
    EntityCollector,
    RemoteExecutor,
    RemoteSession,
    SystemClock,
    TimestampPolicy,
};
