use crate::schema::{EVENT_RECORD_SCHEMA, SONG_RECORD_SCHEMA};
use crate::storage::StorageLocation;
use arrow::datatypes::Schema;
use async_trait::async_trait;
use common::Result;
use datafusion::prelude::*;
use tracing::info;

/// Session settings the JSON source relies on. Input files sit in plain
/// nested directories (`song_data/A/B/C/*.json`), which DataFusion skips
/// unless subdirectory listing is enabled.
pub fn with_nested_listing(config: SessionConfig) -> SessionConfig {
    config.set_bool("datafusion.execution.listing_table_ignore_subdirectory", false)
}

/// Yields raw catalog and event records as DataFrames.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn read_catalog(&self, ctx: &SessionContext) -> Result<DataFrame>;
    async fn read_events(&self, ctx: &SessionContext) -> Result<DataFrame>;
}

/// Newline-delimited JSON files below an input root. Directories are listed
/// recursively, so `song_data/` covers `song_data/*/*/*/*.json`.
pub struct JsonRecordSource {
    song_data_uri: String,
    log_data_uri: String,
}

impl JsonRecordSource {
    pub fn new(input: &StorageLocation, song_data: &str, log_data: &str) -> Result<Self> {
        Ok(Self {
            song_data_uri: input.directory(song_data)?,
            log_data_uri: input.directory(log_data)?,
        })
    }

    pub fn song_data_uri(&self) -> &str {
        &self.song_data_uri
    }

    pub fn log_data_uri(&self) -> &str {
        &self.log_data_uri
    }

    async fn read(&self, ctx: &SessionContext, uri: &str, schema: &Schema) -> Result<DataFrame> {
        let options = NdJsonReadOptions::default()
            .schema(schema)
            .file_extension(".json");
        Ok(ctx.read_json(uri, options).await?)
    }
}

#[async_trait]
impl RecordSource for JsonRecordSource {
    async fn read_catalog(&self, ctx: &SessionContext) -> Result<DataFrame> {
        info!(uri = %self.song_data_uri, "Source: reading catalog records");
        self.read(ctx, &self.song_data_uri, &SONG_RECORD_SCHEMA).await
    }

    async fn read_events(&self, ctx: &SessionContext) -> Result<DataFrame> {
        info!(uri = %self.log_data_uri, "Source: reading event records");
        self.read(ctx, &self.log_data_uri, &EVENT_RECORD_SCHEMA).await
    }
}
