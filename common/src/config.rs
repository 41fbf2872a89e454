use chrono::FixedOffset;
use config::{Config, ConfigError};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_input_root")]
    pub input_root: String,
    #[serde(default = "default_output_root")]
    pub output_root: String,
    #[serde(default = "default_song_data")]
    pub song_data: String,
    #[serde(default = "default_log_data")]
    pub log_data: String,
    #[serde(default)]
    pub start_time_timezone: StartTimeZone,
    #[serde(default)]
    pub null_partition_policy: NullPartitionPolicy,
    #[serde(default = "default_compression")]
    pub compression: String,
    /// Overrides DataFusion's `target_partitions` when set.
    #[serde(default)]
    pub target_partitions: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_root: default_input_root(),
            output_root: default_output_root(),
            song_data: default_song_data(),
            log_data: default_log_data(),
            start_time_timezone: StartTimeZone::default(),
            null_partition_policy: NullPartitionPolicy::default(),
            compression: default_compression(),
            target_partitions: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    /// Custom S3 endpoint (MinIO, localstack). AWS default when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_s3_region")]
    pub region: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
    #[serde(default = "default_verify_buckets")]
    pub verify_buckets: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_s3_region(),
            access_key: None,
            secret_key: None,
            allow_http: false,
            verify_buckets: default_verify_buckets(),
        }
    }
}

/// Timezone in which the UTC event instant is re-read to produce `start_time`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "String")]
pub enum StartTimeZone {
    Utc,
    /// Process-local timezone.
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl FromStr for StartTimeZone {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utc" | "z" => Ok(Self::Utc),
            "local" => Ok(Self::Local),
            other => parse_fixed_offset(other).map(Self::Fixed).ok_or_else(|| {
                ConfigError::Message(format!(
                    "invalid start_time_timezone '{}': expected 'utc', 'local' or '+HH:MM'",
                    s
                ))
            }),
        }
    }
}

impl TryFrom<String> for StartTimeZone {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for StartTimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utc => write!(f, "utc"),
            Self::Local => write!(f, "local"),
            Self::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

// Accepts "+08:00", "-0530", "+09".
fn parse_fixed_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// What to do with fact rows whose `year`/`month` partition keys are null.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NullPartitionPolicy {
    /// Keep the rows under the default Hive partition.
    #[default]
    Bucket,
    Drop,
    Error,
}

impl FromStr for NullPartitionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bucket" => Ok(Self::Bucket),
            "drop" => Ok(Self::Drop),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::Message(format!(
                "invalid null_partition_policy '{}': expected bucket, drop or error",
                s
            ))),
        }
    }
}

fn default_input_root() -> String {
    "s3://udacity-dend/".to_string()
}

fn default_output_root() -> String {
    "output/".to_string()
}

fn default_song_data() -> String {
    "song_data/".to_string()
}

fn default_log_data() -> String {
    "log_data/".to_string()
}

fn default_compression() -> String {
    "snappy".to_string()
}

fn default_s3_region() -> String {
    "us-west-2".to_string()
}

fn default_verify_buckets() -> bool {
    true
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        Self::load(path, None)
    }

    /// `env` replaces the process environment when given.
    fn load(path: &str, env: Option<config::Map<String, String>>) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .source(env),
            );

        // Build the configuration
        let config = builder.build()?;

        let settings: Settings = config.try_deserialize()?;

        debug!(
            input_root = %settings.pipeline.input_root,
            output_root = %settings.pipeline.output_root,
            timezone = %settings.pipeline.start_time_timezone,
            "Loaded pipeline settings"
        );

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_start_time_zone() {
        assert_eq!("UTC".parse::<StartTimeZone>().unwrap(), StartTimeZone::Utc);
        assert_eq!("local".parse::<StartTimeZone>().unwrap(), StartTimeZone::Local);
        assert_eq!(
            "+08:00".parse::<StartTimeZone>().unwrap(),
            StartTimeZone::Fixed(FixedOffset::east_opt(8 * 3600).unwrap())
        );
        assert_eq!(
            "-0530".parse::<StartTimeZone>().unwrap(),
            StartTimeZone::Fixed(FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap())
        );
        assert!("Europe/Paris".parse::<StartTimeZone>().is_err());
        assert!("+25:00".parse::<StartTimeZone>().is_err());
        assert!("+08:75".parse::<StartTimeZone>().is_err());
    }

    #[test]
    fn test_parse_null_partition_policy() {
        assert_eq!("drop".parse::<NullPartitionPolicy>().unwrap(), NullPartitionPolicy::Drop);
        assert_eq!("Error".parse::<NullPartitionPolicy>().unwrap(), NullPartitionPolicy::Error);
        assert!("skip".parse::<NullPartitionPolicy>().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let settings = Settings::new("does/not/exist/songplays").unwrap();
        assert_eq!(settings.pipeline.song_data, "song_data/");
        assert_eq!(settings.pipeline.log_data, "log_data/");
        assert_eq!(settings.pipeline.start_time_timezone, StartTimeZone::Local);
        assert_eq!(settings.pipeline.null_partition_policy, NullPartitionPolicy::Bucket);
        assert_eq!(settings.storage.region, "us-west-2");
        assert!(settings.storage.verify_buckets);
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("songplays.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[pipeline]
input_root = "data/"
output_root = "s3://analytics/sparkify/"
start_time_timezone = "utc"
null_partition_policy = "drop"
target_partitions = 4

[storage]
endpoint = "http://localhost:9000"
access_key = "minio"
secret_key = "minio123"
allow_http = true
"#
        )
        .unwrap();

        let settings = Settings::new(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.pipeline.input_root, "data/");
        assert_eq!(settings.pipeline.output_root, "s3://analytics/sparkify/");
        assert_eq!(settings.pipeline.start_time_timezone, StartTimeZone::Utc);
        assert_eq!(settings.pipeline.null_partition_policy, NullPartitionPolicy::Drop);
        assert_eq!(settings.pipeline.target_partitions, Some(4));
        assert_eq!(settings.pipeline.compression, "snappy");
        assert_eq!(settings.storage.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(settings.storage.access_key.as_deref(), Some("minio"));
        assert!(settings.storage.allow_http);
    }

    #[test]
    fn test_env_override_uses_single_underscore_after_prefix() {
        let env = config::Map::from([
            ("APP_STORAGE__SECRET_KEY".to_string(), "from-env".to_string()),
            ("APP_PIPELINE__OUTPUT_ROOT".to_string(), "documented-form/".to_string()),
            ("APP__STORAGE__REGION".to_string(), "eu-west-1".to_string()),
        ]);

        let settings = Settings::load("does/not/exist/songplays", Some(env)).unwrap();
        assert_eq!(settings.storage.secret_key.as_deref(), Some("from-env"));
        assert_eq!(settings.pipeline.output_root, "documented-form/");
        assert_eq!(settings.storage.region, "us-west-2");
    }
}
