use async_trait::async_trait;
use crate::features::volume::models::{
    is_valid_volume_id, volume_detail_command, volume_schema, VOLUME_DETAIL_FORMAT,
    VOLUME_ID_FIELD, VOLUME_LISTING_COMMAND, VOLUME_LISTING_FORMAT,
};
use crate::shared::coercion::coerce;
use crate::shared::collector::run_command;
use crate::shared::error::CollectionError;
use crate::shared::parser::parse_output;
use crate::shared::point::{build_point, MeasurementSchema, Point};
use crate::shared::traits::{CollectionContext, EntityCollector, RemoteSession};
use log::{debug, warn};

/// Lists volumes, then queries each one's details.
///
/// The listing only tells which volumes exist; points are built from the
/// per-volume detail output, one remote call per volume.
pub struct VolumeCollector {
    schema: MeasurementSchema,
}

impl VolumeCollector {
    pub fn new() -> Self {
        Self::with_schema(volume_schema())
    }

    pub fn with_schema(schema: MeasurementSchema) -> Self {
        Self { schema }
    }

    async fn list_volume_ids(
        &self,
        session: &mut dyn RemoteSession,
        ctx: &CollectionContext<'_>,
    ) -> Result<Vec<String>, CollectionError> {
        let output = match run_command(session, &ctx.target.name, VOLUME_LISTING_COMMAND).await? {
            Some(output) => output,
            None => return Ok(Vec::new()),
        };

        let ids = parse_output(&output, &VOLUME_LISTING_FORMAT)
            .iter()
            .filter_map(|record| record.get(VOLUME_ID_FIELD))
            .filter(|id| {
                if is_valid_volume_id(id) {
                    true
                } else {
                    if !id.is_empty() {
                        warn!("{}: ignoring volume id {:?}", ctx.target.name, id);
                    }
                    false
                }
            })
            .map(str::to_string)
            .collect::<Vec<_>>();

        debug!("{}: {} volumes listed", ctx.target.name, ids.len());
        Ok(ids)
    }

    async fn collect_volume(
        &self,
        session: &mut dyn RemoteSession,
        ctx: &CollectionContext<'_>,
        id: &str,
    ) -> Result<Option<Point>, CollectionError> {
        let command = volume_detail_command(id);
        let output = match run_command(session, &ctx.target.name, &command).await? {
            Some(output) => output,
            None => return Ok(None),
        };
        let timestamp = ctx.timestamp();

        let point = parse_output(&output, &VOLUME_DETAIL_FORMAT)
            .first()
            .map(|record| {
                let typed = coerce(record, &self.schema.field_types);
                build_point(&typed, &self.schema, &ctx.target_tags, timestamp)
            });
        if point.is_none() {
            warn!("{}: empty details for volume {}", ctx.target.name, id);
        }
        Ok(point)
    }
}

impl Default for VolumeCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityCollector for VolumeCollector {
    fn name(&self) -> &str {
        "volume"
    }

    async fn collect(
        &self,
        session: &mut dyn RemoteSession,
        ctx: &CollectionContext<'_>,
    ) -> Result<Vec<Point>, CollectionError> {
        let ids = self.list_volume_ids(session, ctx).await?;

        let mut points = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(point) = self.collect_volume(session, ctx, id).await? {
                points.push(point);
            }
        }
        Ok(points)
    }
}
