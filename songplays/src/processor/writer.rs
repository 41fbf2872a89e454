use super::types::{OutputTable, SuccessMarker, TableWriteSummary};
use crate::storage::StorageLocation;
use arrow::array::{Array, UInt64Array};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::Utc;
use common::config::NullPartitionPolicy;
use common::{Error, Result};
use datafusion::common::config::TableParquetOptions;
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::datasource::listing::ListingTableUrl;
use datafusion::functions::expr_fn::{coalesce, nullif};
use datafusion::prelude::*;
use futures::{StreamExt, TryStreamExt};
use object_store::{ObjectStore, PutPayload};
use parquet::basic::Compression;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// Directory value used for null partition keys; reads back as null.
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Writes output tables as Hive-partitioned Parquet below the output root.
/// Every write replaces whatever the table directory held before.
pub struct TableWriter {
    ctx: Arc<SessionContext>,
    output: StorageLocation,
    compression: String,
    run_id: Uuid,
}

impl TableWriter {
    pub fn new(
        ctx: Arc<SessionContext>,
        output: StorageLocation,
        compression: &str,
        run_id: Uuid,
    ) -> Result<Self> {
        Compression::from_str(compression).map_err(|e| {
            Error::InvalidInput(format!("unsupported parquet compression '{}': {}", compression, e))
        })?;

        Ok(Self {
            ctx,
            output,
            compression: compression.to_string(),
            run_id,
        })
    }

    pub fn table_uri(&self, table: OutputTable) -> Result<String> {
        self.output.directory(table.as_str())
    }

    pub async fn write_table(&self, table: OutputTable, df: DataFrame) -> Result<TableWriteSummary> {
        let uri = self.table_uri(table)?;
        let table_url = ListingTableUrl::parse(&uri)?;
        let store = self.ctx.runtime_env().object_store(&table_url)?;

        let removed = self.clear_table(&store, &table_url, &uri).await?;
        debug!(table = %table, removed, "Writer: cleared previous output");

        let partition_by: Vec<String> = table
            .partition_columns()
            .iter()
            .map(|c| c.to_string())
            .collect();
        let write_options = DataFrameWriteOptions::new().with_partition_by(partition_by.clone());

        info!(table = %table, uri = %uri, partitions = ?partition_by, "Writer: writing table");
        let written = encode_partition_columns(df, table)?
            .write_parquet(&uri, write_options, Some(self.parquet_options(table)))
            .await?;
        let rows = written_row_count(&written);

        self.write_marker(&store, &table_url, table, rows, &partition_by)
            .await?;
        info!(table = %table, rows, "Writer: table written");

        Ok(TableWriteSummary {
            table,
            location: uri,
            rows,
            partition_columns: partition_by,
        })
    }

    /// Opens a fresh read of a previously written table, with partition
    /// columns restored to their original types and order.
    pub async fn read_table(&self, table: OutputTable) -> Result<DataFrame> {
        let uri = self.table_uri(table)?;
        let file_schema = table.file_schema();
        let partition_cols = table
            .partition_columns()
            .iter()
            .map(|c| (c.to_string(), DataType::Utf8))
            .collect();

        let options = ParquetReadOptions::default()
            .schema(&file_schema)
            .table_partition_cols(partition_cols);

        debug!(table = %table, uri = %uri, "Writer: reading table back");
        let df = self.ctx.read_parquet(uri, options).await?;
        decode_partition_columns(df, table)
    }

    fn parquet_options(&self, table: OutputTable) -> TableParquetOptions {
        let mut options = TableParquetOptions::new();
        options.global.compression = Some(self.compression.clone());
        options
            .key_value_metadata
            .insert("songplays.run_id".to_string(), Some(self.run_id.to_string()));
        options
            .key_value_metadata
            .insert("songplays.table".to_string(), Some(table.as_str().to_string()));
        options
    }

    async fn clear_table(
        &self,
        store: &Arc<dyn ObjectStore>,
        table_url: &ListingTableUrl,
        uri: &str,
    ) -> Result<usize> {
        let locations = store
            .list(Some(table_url.prefix()))
            .map_ok(|meta| meta.location)
            .boxed();
        let deleted: Vec<_> = store.delete_stream(locations).try_collect().await?;

        // A local filesystem keeps the partition directories of deleted files
        if !self.output.is_s3() {
            let dir = Url::parse(uri)?
                .to_file_path()
                .map_err(|_| Error::InvalidUri(format!("'{}' is not a local directory", uri)))?;
            if dir.is_dir() {
                prune_empty_dirs(&dir)?;
            }
        }
        Ok(deleted.len())
    }

    async fn write_marker(
        &self,
        store: &Arc<dyn ObjectStore>,
        table_url: &ListingTableUrl,
        table: OutputTable,
        rows: u64,
        partition_columns: &[String],
    ) -> Result<()> {
        let marker = SuccessMarker {
            run_id: self.run_id,
            table,
            rows,
            partition_columns: partition_columns.to_vec(),
            written_at: Utc::now(),
        };
        let marker_json = serde_json::to_vec_pretty(&marker)?;

        let marker_path = table_url.prefix().child(SUCCESS_MARKER);
        store
            .put(&marker_path, PutPayload::from(Bytes::from(marker_json)))
            .await?;
        Ok(())
    }
}

/// Applies `policy` to rows of `table` with a null partition key. Tables
/// without partition columns pass through.
pub async fn apply_partition_policy(
    df: DataFrame,
    table: OutputTable,
    policy: NullPartitionPolicy,
) -> Result<DataFrame> {
    let Some(null_key) = table
        .partition_columns()
        .iter()
        .map(|c| col(*c).is_null())
        .reduce(Expr::or)
    else {
        return Ok(df);
    };

    match policy {
        NullPartitionPolicy::Bucket => Ok(df),
        NullPartitionPolicy::Drop => {
            let dropped = df.clone().filter(null_key.clone())?.count().await?;
            if dropped > 0 {
                warn!(table = %table, rows = dropped, "Writer: dropping rows with null partition keys");
            }
            Ok(df.filter(!null_key)?)
        }
        NullPartitionPolicy::Error => {
            let rows = df.clone().filter(null_key)?.count().await?;
            if rows > 0 {
                return Err(Error::PartitionKeyNull {
                    table: table.as_str().to_string(),
                    rows,
                });
            }
            debug!(table = %table, "Writer: no rows with null partition keys");
            Ok(df)
        }
    }
}

/// Orders columns as the table schema does and turns partition keys into
/// strings, mapping null to [`DEFAULT_PARTITION`].
fn encode_partition_columns(df: DataFrame, table: OutputTable) -> Result<DataFrame> {
    let partitions = table.partition_columns();
    let exprs = table
        .schema()
        .fields()
        .iter()
        .map(|field| {
            let name = field.name().as_str();
            if partitions.contains(&name) {
                coalesce(vec![cast(col(name), DataType::Utf8), lit(DEFAULT_PARTITION)]).alias(name)
            } else {
                col(name)
            }
        })
        .collect::<Vec<_>>();
    Ok(df.select(exprs)?)
}

fn decode_partition_columns(df: DataFrame, table: OutputTable) -> Result<DataFrame> {
    let partitions = table.partition_columns();
    let exprs = table
        .schema()
        .fields()
        .iter()
        .map(|field| {
            let name = field.name().as_str();
            let data_type = field.data_type().clone();
            if partitions.contains(&name) {
                try_cast(nullif(col(name), lit(DEFAULT_PARTITION)), data_type).alias(name)
            } else {
                cast(col(name), data_type).alias(name)
            }
        })
        .collect::<Vec<_>>();
    Ok(df.select(exprs)?)
}

/// Removes every directory below `dir` that holds no files. Returns whether
/// `dir` itself ended up empty.
fn prune_empty_dirs(dir: &std::path::Path) -> std::io::Result<bool> {
    let mut empty = true;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() && prune_empty_dirs(&path)? {
            std::fs::remove_dir(&path)?;
        } else {
            empty = false;
        }
    }
    Ok(empty)
}

fn written_row_count(batches: &[RecordBatch]) -> u64 {
    batches
        .iter()
        .filter_map(|batch| batch.column_by_name("count"))
        .filter_map(|column| column.as_any().downcast_ref::<UInt64Array>())
        .flat_map(|counts| counts.iter().flatten())
        .sum()
}
