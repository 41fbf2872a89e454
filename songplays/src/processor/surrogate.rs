use arrow::array::{ArrayRef, Int64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use common::Result;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use std::sync::Arc;

/// Bits reserved for the row index inside one partition.
const ROW_BITS: u32 = 33;

/// Id of the `row`-th row of partition `partition`: partition index in the
/// upper bits, row index in the lower 33. Unique and increasing, not contiguous.
pub fn surrogate_id(partition: usize, row: u64) -> i64 {
    ((partition as i64) << ROW_BITS) + row as i64
}

/// Prepends an Int64 `column` holding a per-row surrogate id to every batch.
pub fn assign_surrogate_ids(
    schema: &SchemaRef,
    partitions: Vec<Vec<RecordBatch>>,
    column: &str,
) -> Result<(SchemaRef, Vec<Vec<RecordBatch>>)> {
    let mut fields = vec![Arc::new(Field::new(column, DataType::Int64, false))];
    fields.extend(schema.fields().iter().cloned());
    let output_schema = Arc::new(Schema::new(fields));

    let mut output = Vec::with_capacity(partitions.len());
    for (partition, batches) in partitions.into_iter().enumerate() {
        let mut next_row = 0_u64;
        let mut with_ids = Vec::with_capacity(batches.len());
        for batch in batches {
            let rows = batch.num_rows() as u64;
            let ids: Int64Array = (next_row..next_row + rows)
                .map(|row| surrogate_id(partition, row))
                .collect();
            next_row += rows;

            let mut columns: Vec<ArrayRef> = vec![Arc::new(ids)];
            columns.extend(batch.columns().iter().cloned());
            with_ids.push(RecordBatch::try_new(output_schema.clone(), columns)?);
        }
        output.push(with_ids);
    }

    Ok((output_schema, output))
}

/// Executes `df` and returns it with a surrogate id column in front.
pub async fn with_surrogate_ids(
    ctx: &SessionContext,
    df: DataFrame,
    column: &str,
) -> Result<DataFrame> {
    let schema: SchemaRef = df.schema().inner().clone();
    let partitions = df.collect_partitioned().await?;
    let (output_schema, partitions) = assign_surrogate_ids(&schema, partitions, column)?;
    let table = MemTable::try_new(output_schema, partitions)?;
    Ok(ctx.read_table(Arc::new(table))?)
}
