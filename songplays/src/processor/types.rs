use crate::schema;
use arrow::datatypes::{Schema, SchemaRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

// All output tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTable {
    Songs,
    Artists,
    Users,
    Time,
    Songplays,
}

impl OutputTable {
    pub const ALL: [OutputTable; 5] = [
        Self::Songs,
        Self::Artists,
        Self::Users,
        Self::Time,
        Self::Songplays,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Songs => "songs",
            Self::Artists => "artists",
            Self::Users => "users",
            Self::Time => "time",
            Self::Songplays => "songplays",
        }
    }

    /// Hive partition columns, outermost first.
    pub fn partition_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Songs => &["year", "artist_id"],
            Self::Time | Self::Songplays => &["year", "month"],
            Self::Artists | Self::Users => &[],
        }
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::new(match self {
            Self::Songs => schema::songs_schema(),
            Self::Artists => schema::artists_schema(),
            Self::Users => schema::users_schema(),
            Self::Time => schema::time_schema(),
            Self::Songplays => schema::songplays_schema(),
        })
    }

    /// Columns physically stored in the Parquet files (schema minus partition columns).
    pub fn file_schema(&self) -> Schema {
        let partitions = self.partition_columns();
        let fields: Vec<_> = self
            .schema()
            .fields()
            .iter()
            .filter(|f| !partitions.contains(&f.name().as_str()))
            .map(|f| f.as_ref().clone())
            .collect();
        Schema::new(fields)
    }
}

impl fmt::Display for OutputTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which half of the job to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    All,
    /// Catalog records only: songs and artists.
    SongData,
    /// Event records only: users, time and songplays. Reads songs and artists
    /// written by an earlier run.
    LogData,
}

impl RunPhase {
    pub fn includes_song_data(&self) -> bool {
        matches!(self, Self::All | Self::SongData)
    }

    pub fn includes_log_data(&self) -> bool {
        matches!(self, Self::All | Self::LogData)
    }
}

impl FromStr for RunPhase {
    type Err = common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "song-data" => Ok(Self::SongData),
            "log-data" => Ok(Self::LogData),
            other => Err(common::Error::InvalidInput(format!(
                "unknown phase '{}': expected all, song-data or log-data",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableWriteSummary {
    pub table: OutputTable,
    pub location: String,
    pub rows: u64,
    pub partition_columns: Vec<String>,
}

/// Contents of the `_SUCCESS` file written next to each table's data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessMarker {
    pub run_id: Uuid,
    pub table: OutputTable,
    pub rows: u64,
    pub partition_columns: Vec<String>,
    pub written_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub tables: Vec<TableWriteSummary>,
}

impl RunSummary {
    pub fn rows(&self, table: OutputTable) -> Option<u64> {
        self.tables.iter().find(|t| t.table == table).map(|t| t.rows)
    }
}
