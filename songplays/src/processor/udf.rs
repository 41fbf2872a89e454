use crate::schema::start_time_type;
use chrono::{DateTime, Local};
use common::Result;
use common::config::StartTimeZone;
use datafusion::arrow::array::{Array, Int64Array, TimestampMillisecondArray};
use datafusion::arrow::datatypes::DataType;
use datafusion::common::DataFusionError;
use datafusion::execution::context::SessionContext;
use datafusion::logical_expr::{ColumnarValue, ScalarUDF, Volatility, create_udf};
use std::sync::Arc;

pub const EPOCH_MS_TO_TIMESTAMP: &str = "epoch_ms_to_timestamp";
pub const TO_START_TIME: &str = "to_start_time";

/// Registers the event-time UDFs with the SessionContext
pub fn register_udfs(ctx: &SessionContext, timezone: StartTimeZone) -> Result<()> {
    ctx.register_udf(epoch_ms_to_timestamp_udf());
    ctx.register_udf(to_start_time_udf(timezone));
    Ok(())
}

/// Millisecond epoch integer to a UTC timestamp.
pub fn epoch_ms_to_timestamp_udf() -> ScalarUDF {
    create_udf(
        EPOCH_MS_TO_TIMESTAMP,
        vec![DataType::Int64],
        start_time_type(),
        Volatility::Immutable,
        Arc::new(convert_epoch_millis),
    )
}

/// UTC timestamp to wall-clock time under `timezone`.
pub fn to_start_time_udf(timezone: StartTimeZone) -> ScalarUDF {
    create_udf(
        TO_START_TIME,
        vec![start_time_type()],
        start_time_type(),
        Volatility::Immutable,
        Arc::new(move |args: &[ColumnarValue]| convert_to_start_time(args, timezone)),
    )
}

/// Shifts a UTC instant to the wall clock of `timezone`, kept as a naive millisecond value.
pub fn wall_clock_millis(timezone: StartTimeZone, utc_millis: i64) -> Option<i64> {
    let utc = DateTime::from_timestamp_millis(utc_millis)?;
    let wall_clock = match timezone {
        StartTimeZone::Utc => utc.naive_utc(),
        StartTimeZone::Local => utc.with_timezone(&Local).naive_local(),
        StartTimeZone::Fixed(offset) => utc.with_timezone(&offset).naive_local(),
    };
    Some(wall_clock.and_utc().timestamp_millis())
}

fn convert_epoch_millis(args: &[ColumnarValue]) -> datafusion::error::Result<ColumnarValue> {
    let arrays = ColumnarValue::values_to_arrays(args)?;
    let int_array = arrays[0]
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| DataFusionError::Internal("Expected int64 array".to_string()))?;

    // Out-of-range epochs become null rather than a bogus instant
    let result: TimestampMillisecondArray = int_array
        .iter()
        .map(|opt_ts| opt_ts.and_then(|ts| DateTime::from_timestamp_millis(ts).map(|dt| dt.timestamp_millis())))
        .collect();

    Ok(ColumnarValue::Array(Arc::new(result)))
}

fn convert_to_start_time(
    args: &[ColumnarValue],
    timezone: StartTimeZone,
) -> datafusion::error::Result<ColumnarValue> {
    let arrays = ColumnarValue::values_to_arrays(args)?;
    let ts_array = arrays[0]
        .as_any()
        .downcast_ref::<TimestampMillisecondArray>()
        .ok_or_else(|| DataFusionError::Internal("Expected timestamp(ms) array".to_string()))?;

    let result: TimestampMillisecondArray = ts_array
        .iter()
        .map(|opt_ts| opt_ts.and_then(|ts| wall_clock_millis(timezone, ts)))
        .collect();

    Ok(ColumnarValue::Array(Arc::new(result)))
}
