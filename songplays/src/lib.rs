pub mod processor;
pub mod schema;
pub mod storage;

#[cfg(test)]
mod test_utils;

use common::Result;
use common::config::Settings;
use processor::{RunPhase, RunSummary, SongplaysProcessor};
use tracing::info;

/// Runs the songplays job end to end with already-loaded settings.
pub async fn run_songplays_pipeline(settings: &Settings, phase: RunPhase) -> Result<RunSummary> {
    let processor = SongplaysProcessor::new(settings).await?;
    let summary = processor.run(phase).await?;

    for table in &summary.tables {
        info!(
            table = %table.table,
            rows = table.rows,
            location = %table.location,
            "Pipeline: table summary"
        );
    }
    Ok(summary)
}
