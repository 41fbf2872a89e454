//! Fixture helpers shared by the unit tests.

use arrow::array::{Array, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, SchemaRef};
use arrow::json::ReaderBuilder;
use arrow::record_batch::RecordBatch;
use datafusion::prelude::*;
use std::io::Cursor;

/// Decode newline-delimited JSON into a DataFrame using the given raw schema.
pub fn ndjson_frame(ctx: &SessionContext, schema: SchemaRef, lines: &[&str]) -> DataFrame {
    let data = lines.join("\n");
    let reader = ReaderBuilder::new(schema.clone())
        .build(Cursor::new(data.into_bytes()))
        .unwrap();
    let batches: Vec<RecordBatch> = reader.collect::<Result<_, _>>().unwrap();
    let batch = arrow::compute::concat_batches(&schema, &batches).unwrap();
    ctx.read_batch(batch).unwrap()
}

pub fn song_record(song_id: &str, title: &str, artist_id: &str, artist_name: &str, duration: f64) -> String {
    serde_json::json!({
        "num_songs": 1,
        "artist_id": artist_id,
        "artist_latitude": null,
        "artist_longitude": null,
        "artist_location": "",
        "artist_name": artist_name,
        "song_id": song_id,
        "title": title,
        "duration": duration,
        "year": 0
    })
    .to_string()
}

pub fn event_record(page: &str, user_id: &str, level: &str, song: &str, artist: &str, ts: i64) -> String {
    serde_json::json!({
        "artist": artist,
        "auth": "Logged In",
        "firstName": "Ryan",
        "gender": "M",
        "itemInSession": 0,
        "lastName": "Smith",
        "length": 200.0,
        "level": level,
        "location": "San Jose-Sunnyvale-Santa Clara, CA",
        "method": "PUT",
        "page": page,
        "registration": 1541016707796.0,
        "sessionId": 583,
        "song": song,
        "status": 200,
        "ts": ts,
        "userAgent": "Mozilla/5.0 (X11; Linux x86_64)",
        "userId": user_id
    })
    .to_string()
}

pub async fn collect_sorted(df: DataFrame, sort_cols: &[&str]) -> Vec<RecordBatch> {
    let sort = sort_cols.iter().map(|c| col(*c).sort(true, true)).collect();
    df.sort(sort).unwrap().collect().await.unwrap()
}

pub fn row_count(batches: &[RecordBatch]) -> usize {
    batches.iter().map(|b| b.num_rows()).sum()
}

fn column_as(batches: &[RecordBatch], name: &str, to: &DataType) -> Vec<std::sync::Arc<dyn Array>> {
    batches
        .iter()
        .map(|b| {
            let idx = b.schema().index_of(name).unwrap();
            cast(b.column(idx), to).unwrap()
        })
        .collect()
}

pub fn strings(batches: &[RecordBatch], name: &str) -> Vec<Option<String>> {
    column_as(batches, name, &DataType::Utf8)
        .iter()
        .flat_map(|a| {
            let a = a.as_any().downcast_ref::<StringArray>().unwrap();
            a.iter().map(|v| v.map(str::to_string)).collect::<Vec<_>>()
        })
        .collect()
}

pub fn ints(batches: &[RecordBatch], name: &str) -> Vec<Option<i64>> {
    column_as(batches, name, &DataType::Int64)
        .iter()
        .flat_map(|a| {
            let a = a.as_any().downcast_ref::<Int64Array>().unwrap();
            a.iter().collect::<Vec<_>>()
        })
        .collect()
}

pub fn floats(batches: &[RecordBatch], name: &str) -> Vec<Option<f64>> {
    column_as(batches, name, &DataType::Float64)
        .iter()
        .flat_map(|a| {
            let a = a.as_any().downcast_ref::<Float64Array>().unwrap();
            a.iter().collect::<Vec<_>>()
        })
        .collect()
}
