use async_trait::async_trait;
use crate::features::pool::models::{pool_schema, POOL_LISTING_COMMAND, POOL_LISTING_FORMAT};
use crate::shared::coercion::coerce;
use crate::shared::collector::run_command;
use crate::shared::error::CollectionError;
use crate::shared::parser::parse_output;
use crate::shared::point::{build_point, MeasurementSchema, Point};
use crate::shared::traits::{CollectionContext, EntityCollector, RemoteSession};
use log::debug;

pub struct PoolCollector {
    schema: MeasurementSchema,
}

impl PoolCollector {
    pub fn new() -> Self {
        Self::with_schema(pool_schema())
    }

    pub fn with_schema(schema: MeasurementSchema) -> Self {
        Self { schema }
    }
}

impl Default for PoolCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityCollector for PoolCollector {
    fn name(&self) -> &str {
        "pool"
    }

    async fn collect(
        &self,
        session: &mut dyn RemoteSession,
        ctx: &CollectionContext<'_>,
    ) -> Result<Vec<Point>, CollectionError> {
        let output = match run_command(session, &ctx.target.name, POOL_LISTING_COMMAND).await? {
            Some(output) => output,
            None => return Ok(Vec::new()),
        };
        let timestamp = ctx.timestamp();

        let records = parse_output(&output, &POOL_LISTING_FORMAT);
        debug!("{}: {} pools listed", ctx.target.name, records.len());

        Ok(records
            .iter()
            .map(|record| {
                let typed = coerce(record, &self.schema.field_types);
                build_point(&typed, &self.schema, &ctx.target_tags, timestamp)
            })
            .collect())
    }
}
