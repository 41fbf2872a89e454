use super::surrogate::with_surrogate_ids;
use common::Result;
use datafusion::common::JoinType;
use datafusion::prelude::*;
use std::sync::Arc;
use tracing::debug;

/// Joins song plays against songs, artists and time to build the songplays fact table.
pub struct FactBuilder {
    ctx: Arc<SessionContext>,
}

impl FactBuilder {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    /// `events` must already be filtered to NextSong and carry `start_time`.
    /// `songs` and `artists` are the tables as read back from storage.
    pub async fn build_songplays(
        &self,
        events: DataFrame,
        songs: DataFrame,
        artists: DataFrame,
        time: DataFrame,
    ) -> Result<DataFrame> {
        // The event side keeps none of its own calendar columns, so year/month
        // can only come from the time table.
        let events = events.select(vec![
            col("start_time"),
            ident("userId"),
            col("level"),
            ident("sessionId"),
            col("location"),
            ident("userAgent"),
            col("song"),
            col("artist"),
        ])?;
        let songs = songs.select(vec![col("song_id"), col("title")])?;
        let artists = artists.select(vec![col("artist_id"), col("name")])?;
        let time = time.select(vec![
            col("start_time").alias("time_start_time"),
            col("year"),
            col("month"),
        ])?;

        debug!("Fact: joining events to songs, artists and time");
        let joined = events
            .join(songs, JoinType::Inner, &["song"], &["title"], None)?
            .join(artists, JoinType::Inner, &["artist"], &["name"], None)?
            .join(time, JoinType::Left, &["start_time"], &["time_start_time"], None)?;

        let projected = joined.select(vec![
            col("start_time"),
            ident("userId").alias("user_id"),
            col("level"),
            col("song_id"),
            col("artist_id"),
            ident("sessionId").alias("session_id"),
            col("location"),
            ident("userAgent").alias("user_agent"),
            col("year"),
            col("month"),
        ])?;

        let songplays = with_surrogate_ids(&self.ctx, projected, "songplay_id")
            .await?
            .distinct()?;
        Ok(songplays)
    }
}
