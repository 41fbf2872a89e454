use common::Result;
use datafusion::prelude::*;
use tracing::debug;

/// Projects raw catalog records into the songs and artists tables.
pub struct CatalogTransformer;

impl CatalogTransformer {
    pub fn new() -> Self {
        Self
    }

    pub fn songs_table(&self, catalog: DataFrame) -> Result<DataFrame> {
        debug!("Catalog: projecting songs table");
        let songs = catalog
            .select(vec![
                col("song_id"),
                col("title"),
                col("artist_id"),
                col("year"),
                col("duration"),
            ])?
            .distinct()?;
        Ok(songs)
    }

    pub fn artists_table(&self, catalog: DataFrame) -> Result<DataFrame> {
        debug!("Catalog: projecting artists table");
        let artists = catalog
            .select(vec![
                col("artist_id"),
                col("artist_name").alias("name"),
                col("artist_location").alias("location"),
                col("artist_latitude").alias("latitude"),
                col("artist_longitude").alias("longitude"),
            ])?
            .distinct()?;
        Ok(artists)
    }
}

impl Default for CatalogTransformer {
    fn default() -> Self {
        Self::new()
    }
}
