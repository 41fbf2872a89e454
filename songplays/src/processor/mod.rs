pub mod catalog;
pub mod events;
pub mod fact;
pub mod source;
pub mod surrogate;
pub mod types;
pub mod udf;
pub mod writer;

pub use catalog::CatalogTransformer;
pub use events::EventTransformer;
pub use fact::FactBuilder;
pub use source::{JsonRecordSource, RecordSource, with_nested_listing};
pub use types::{OutputTable, RunPhase, RunSummary, TableWriteSummary};
pub use udf::register_udfs;
pub use writer::{TableWriter, apply_partition_policy};

use crate::storage::{S3Manager, StorageLocation};
use common::Result;
use common::config::{PipelineConfig, Settings};
use datafusion::execution::context::SessionContext;
use datafusion::prelude::SessionConfig;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Runs the two-phase songplays job over one session context.
///
/// Phase one turns catalog records into the songs and artists tables. Phase
/// two turns event records into users, time and songplays, joining against
/// the songs and artists tables as they were written to storage.
pub struct SongplaysProcessor {
    ctx: Arc<SessionContext>,
    config: PipelineConfig,
    run_id: Uuid,
    source: Arc<dyn RecordSource>,
    catalog: CatalogTransformer,
    events: EventTransformer,
    fact: FactBuilder,
    writer: TableWriter,
}

impl SongplaysProcessor {
    pub async fn new(settings: &Settings) -> Result<Self> {
        let input = StorageLocation::parse(&settings.pipeline.input_root)?;
        let source = JsonRecordSource::new(
            &input,
            &settings.pipeline.song_data,
            &settings.pipeline.log_data,
        )?;
        let processor = Self::with_source(settings, Arc::new(source)).await?;

        S3Manager::new(settings.storage.clone())
            .prepare_location(&processor.ctx, &input)
            .await?;
        Ok(processor)
    }

    /// Builds a processor reading from `source` instead of the configured input root.
    pub async fn with_source(settings: &Settings, source: Arc<dyn RecordSource>) -> Result<Self> {
        let config = settings.pipeline.clone();

        let mut session_config = with_nested_listing(SessionConfig::new());
        if let Some(partitions) = config.target_partitions {
            session_config = session_config.with_target_partitions(partitions);
        }
        let ctx = Arc::new(SessionContext::new_with_config(session_config));
        register_udfs(&ctx, config.start_time_timezone)?;

        let output = StorageLocation::parse(&config.output_root)?;
        S3Manager::new(settings.storage.clone())
            .prepare_location(&ctx, &output)
            .await?;

        let run_id = Uuid::new_v4();
        let writer = TableWriter::new(ctx.clone(), output, &config.compression, run_id)?;

        Ok(Self {
            catalog: CatalogTransformer::new(),
            events: EventTransformer::new(ctx.clone()),
            fact: FactBuilder::new(ctx.clone()),
            ctx,
            config,
            run_id,
            source,
            writer,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn session_context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn writer(&self) -> &TableWriter {
        &self.writer
    }

    pub async fn run(&self, phase: RunPhase) -> Result<RunSummary> {
        info!(
            run_id = %self.run_id,
            ?phase,
            input = %self.config.input_root,
            output = %self.config.output_root,
            timezone = %self.config.start_time_timezone,
            "Pipeline: starting run"
        );

        let mut tables = Vec::new();
        if phase.includes_song_data() {
            tables.extend(self.process_song_data().await?);
        }
        // Songs and artists are complete on storage before this point
        if phase.includes_log_data() {
            tables.extend(self.process_log_data().await?);
        }

        info!(run_id = %self.run_id, tables = tables.len(), "Pipeline: run complete");
        Ok(RunSummary {
            run_id: self.run_id,
            tables,
        })
    }

    pub async fn process_song_data(&self) -> Result<Vec<TableWriteSummary>> {
        info!("Pipeline: processing song data");
        let catalog = self.source.read_catalog(&self.ctx).await?;

        let songs = self.catalog.songs_table(catalog.clone())?;
        let artists = self.catalog.artists_table(catalog)?;

        Ok(vec![
            self.writer.write_table(OutputTable::Songs, songs).await?,
            self.writer.write_table(OutputTable::Artists, artists).await?,
        ])
    }

    pub async fn process_log_data(&self) -> Result<Vec<TableWriteSummary>> {
        info!("Pipeline: processing log data");
        let raw = self.source.read_events(&self.ctx).await?;
        let plays = self.events.filter_next_song(raw)?;

        let users = self.events.users_table(plays.clone())?;
        let users_summary = self.writer.write_table(OutputTable::Users, users).await?;

        let plays = self.events.with_time_columns(plays)?;
        let time = self.events.time_table(plays.clone())?;
        let time = apply_partition_policy(time, OutputTable::Time, self.config.null_partition_policy).await?;
        let time_summary = self
            .writer
            .write_table(OutputTable::Time, time.clone())
            .await?;

        let songs = self.writer.read_table(OutputTable::Songs).await?;
        let artists = self.writer.read_table(OutputTable::Artists).await?;
        let songplays = self
            .fact
            .build_songplays(plays, songs, artists, time)
            .await?;
        let songplays = apply_partition_policy(
            songplays,
            OutputTable::Songplays,
            self.config.null_partition_policy,
        )
        .await?;
        let songplays_summary = self
            .writer
            .write_table(OutputTable::Songplays, songplays)
            .await?;

        Ok(vec![users_summary, time_summary, songplays_summary])
    }
}
