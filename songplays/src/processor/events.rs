use super::udf::{EPOCH_MS_TO_TIMESTAMP, TO_START_TIME};
use arrow::datatypes::DataType;
use common::Result;
use datafusion::execution::FunctionRegistry;
use datafusion::functions::expr_fn::date_part;
use datafusion::prelude::*;
use std::sync::Arc;
use tracing::debug;

pub const NEXT_SONG_PAGE: &str = "NextSong";

/// Derives the users and time tables from raw event records.
///
/// Expects the event-time UDFs to be registered on the context (see
/// [`super::udf::register_udfs`]).
pub struct EventTransformer {
    ctx: Arc<SessionContext>,
}

impl EventTransformer {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    /// Keeps song plays only; every event-derived table starts from this set.
    pub fn filter_next_song(&self, events: DataFrame) -> Result<DataFrame> {
        Ok(events.filter(col("page").eq(lit(NEXT_SONG_PAGE)))?)
    }

    /// One row per distinct (user_id, first_name, last_name, gender, level).
    /// A user who upgraded from free to paid appears twice.
    pub fn users_table(&self, events: DataFrame) -> Result<DataFrame> {
        debug!("Events: projecting users table");
        let users = events
            .select(vec![
                ident("userId").alias("user_id"),
                ident("firstName").alias("first_name"),
                ident("lastName").alias("last_name"),
                col("gender"),
                col("level"),
            ])?
            .distinct()?;
        Ok(users)
    }

    /// Adds `timestamp`, `start_time` and the calendar columns derived from `start_time`.
    pub fn with_time_columns(&self, events: DataFrame) -> Result<DataFrame> {
        let to_timestamp = self.ctx.udf(EPOCH_MS_TO_TIMESTAMP)?;
        let to_start_time = self.ctx.udf(TO_START_TIME)?;

        let df = events
            .with_column(
                "timestamp",
                to_timestamp.call(vec![cast(col("ts"), DataType::Int64)]),
            )?
            .with_column("start_time", to_start_time.call(vec![col("timestamp")]))?
            .with_column("hour", calendar_part("hour"))?
            .with_column("day", calendar_part("day"))?
            .with_column("week", calendar_part("week"))?
            .with_column("month", calendar_part("month"))?
            .with_column("year", calendar_part("year"))?
            // DataFusion's dow is 0 = Sunday; shift to 1 = Sunday .. 7 = Saturday
            .with_column("weekday", calendar_part("dow") + lit(1i32))?;
        Ok(df)
    }

    pub fn time_table(&self, events: DataFrame) -> Result<DataFrame> {
        debug!("Events: projecting time table");
        let time = events
            .select(vec![
                col("start_time"),
                col("hour"),
                col("day"),
                col("week"),
                col("month"),
                col("year"),
                col("weekday"),
            ])?
            .distinct()?;
        Ok(time)
    }
}

fn calendar_part(part: &str) -> Expr {
    cast(date_part(lit(part), col("start_time")), DataType::Int32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::udf::register_udfs;
    use crate::schema::EVENT_RECORD_SCHEMA;
    use crate::test_utils::*;
    use common::config::StartTimeZone;

    const SAMPLE_TS: i64 = 1541990258796;

    fn transformer(timezone: StartTimeZone) -> (Arc<SessionContext>, EventTransformer) {
        let ctx = Arc::new(SessionContext::new());
        register_udfs(&ctx, timezone).unwrap();
        (ctx.clone(), EventTransformer::new(ctx))
    }

    fn events(ctx: &SessionContext, lines: &[String]) -> DataFrame {
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        ndjson_frame(ctx, EVENT_RECORD_SCHEMA.clone(), &lines)
    }

    #[tokio::test]
    async fn test_filter_keeps_next_song_only() {
        let (ctx, transformer) = transformer(StartTimeZone::Utc);
        let df = events(
            &ctx,
            &[
                event_record("Home", "10", "free", "", "", SAMPLE_TS),
                event_record("NextSong", "26", "free", "Sehr kosmisch", "Harmonia", SAMPLE_TS),
            ],
        );

        let filtered = transformer.filter_next_song(df).unwrap();
        let batches = filtered.collect().await.unwrap();

        assert_eq!(row_count(&batches), 1);
        assert_eq!(strings(&batches, "userId"), vec![Some("26".to_string())]);
    }

    #[tokio::test]
    async fn test_users_level_change_keeps_both_rows() {
        let (ctx, transformer) = transformer(StartTimeZone::Utc);
        let df = events(
            &ctx,
            &[
                event_record("NextSong", "26", "free", "A", "B", SAMPLE_TS),
                event_record("NextSong", "26", "free", "C", "D", SAMPLE_TS + 1000),
                event_record("NextSong", "26", "paid", "E", "F", SAMPLE_TS + 2000),
            ],
        );

        let users = transformer.users_table(df).unwrap();
        let batches = collect_sorted(users, &["level"]).await;

        assert_eq!(row_count(&batches), 2);
        assert_eq!(strings(&batches, "user_id"), vec![Some("26".to_string()), Some("26".to_string())]);
        assert_eq!(strings(&batches, "level"), vec![Some("free".to_string()), Some("paid".to_string())]);
        assert_eq!(strings(&batches, "first_name"), vec![Some("Ryan".to_string()), Some("Ryan".to_string())]);
    }

    #[tokio::test]
    async fn test_time_decomposition_utc() {
        let (ctx, transformer) = transformer(StartTimeZone::Utc);
        let df = events(&ctx, &[event_record("NextSong", "26", "free", "A", "B", SAMPLE_TS)]);

        let with_time = transformer.with_time_columns(df).unwrap();
        let time = transformer.time_table(with_time).unwrap();
        let batches = time.collect().await.unwrap();

        assert_eq!(row_count(&batches), 1);
        // 2018-11-12T02:37:38.796Z was a Monday
        assert_eq!(ints(&batches, "start_time"), vec![Some(SAMPLE_TS)]);
        assert_eq!(ints(&batches, "hour"), vec![Some(2)]);
        assert_eq!(ints(&batches, "day"), vec![Some(12)]);
        assert_eq!(ints(&batches, "week"), vec![Some(46)]);
        assert_eq!(ints(&batches, "month"), vec![Some(11)]);
        assert_eq!(ints(&batches, "year"), vec![Some(2018)]);
        assert_eq!(ints(&batches, "weekday"), vec![Some(2)]);
    }

    #[tokio::test]
    async fn test_time_decomposition_follows_timezone_policy() {
        let offset = chrono::FixedOffset::west_opt(5 * 3600).unwrap();
        let (ctx, transformer) = transformer(StartTimeZone::Fixed(offset));
        let df = events(&ctx, &[event_record("NextSong", "26", "free", "A", "B", SAMPLE_TS)]);

        let with_time = transformer.with_time_columns(df).unwrap();
        let batches = transformer.time_table(with_time).unwrap().collect().await.unwrap();

        // 21:37 on Sunday 2018-11-11 at UTC-05:00
        assert_eq!(ints(&batches, "hour"), vec![Some(21)]);
        assert_eq!(ints(&batches, "day"), vec![Some(11)]);
        assert_eq!(ints(&batches, "week"), vec![Some(45)]);
        assert_eq!(ints(&batches, "weekday"), vec![Some(1)]);
    }

    #[tokio::test]
    async fn test_time_rows_deduplicated() {
        let (ctx, transformer) = transformer(StartTimeZone::Utc);
        let df = events(
            &ctx,
            &[
                event_record("NextSong", "26", "free", "A", "B", SAMPLE_TS),
                event_record("NextSong", "80", "paid", "C", "D", SAMPLE_TS),
                event_record("NextSong", "80", "paid", "C", "D", SAMPLE_TS + 60_000),
            ],
        );

        let with_time = transformer.with_time_columns(df).unwrap();
        let batches = transformer.time_table(with_time).unwrap().collect().await.unwrap();

        assert_eq!(row_count(&batches), 2);
    }
}
