pub mod location;

pub use location::StorageLocation;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::Credentials;
use common::Result;
use common::config::StorageSettings;
use dashmap::DashMap;
use datafusion::execution::context::SessionContext;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Builds and caches per-bucket S3 clients for the session.
#[derive(Clone)]
pub struct S3Manager {
    pub config: StorageSettings,
    client_cache: Arc<DashMap<String, Arc<S3Client>>>,
    object_store_cache: Arc<DashMap<String, Arc<AmazonS3>>>,
}

impl S3Manager {
    pub fn new(config: StorageSettings) -> Self {
        Self {
            config,
            client_cache: Arc::new(DashMap::new()),
            object_store_cache: Arc::new(DashMap::new()),
        }
    }

    pub async fn get_client(&self, bucket: &str) -> Result<Arc<S3Client>> {
        if let Some(client) = self.client_cache.get(bucket) {
            return Ok(client.clone());
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()));

        // Explicit keys win; otherwise the standard AWS credential chain applies
        if let (Some(access_key), Some(secret_key)) = (&self.config.access_key, &self.config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "songplays-settings",
            ));
        }
        if let Some(endpoint) = &self.config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.config.endpoint.is_some())
            .build();

        let client = Arc::new(S3Client::from_conf(s3_config));
        self.client_cache.insert(bucket.to_string(), client.clone());
        Ok(client)
    }

    pub fn get_object_store(&self, bucket: &str) -> Result<Arc<AmazonS3>> {
        if let Some(store) = self.object_store_cache.get(bucket) {
            return Ok(store.clone());
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(&self.config.region)
            .with_allow_http(self.config.allow_http);
        if let Some(access_key) = &self.config.access_key {
            builder = builder.with_access_key_id(access_key);
        }
        if let Some(secret_key) = &self.config.secret_key {
            builder = builder.with_secret_access_key(secret_key);
        }
        if let Some(endpoint) = &self.config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        let store = Arc::new(builder.build()?);
        self.object_store_cache
            .insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    pub fn register_object_store(&self, ctx: &SessionContext, bucket: &str) -> Result<()> {
        let store = self.get_object_store(bucket)?;
        let url = Url::parse(&format!("s3://{}", bucket))?;
        ctx.runtime_env().register_object_store(&url, store);
        debug!(bucket, "Registered S3 object store");
        Ok(())
    }

    /// Verifies that a bucket exists and is accessible
    pub async fn verify_bucket_exists(&self, bucket: &str) -> Result<()> {
        let client = self.get_client(bucket).await?;

        match client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!(bucket, "Bucket is accessible");
                Ok(())
            }
            Err(e) => Err(common::Error::Storage(format!(
                "Cannot access bucket '{}': {}",
                bucket, e
            ))),
        }
    }

    /// Registers the object store behind `location` with the session. Local
    /// paths need nothing: DataFusion serves `file://` by default.
    pub async fn prepare_location(
        &self,
        ctx: &SessionContext,
        location: &StorageLocation,
    ) -> Result<()> {
        let Some(bucket) = location.bucket() else {
            return Ok(());
        };
        self.register_object_store(ctx, bucket)?;
        if self.config.verify_buckets {
            self.verify_bucket_exists(bucket).await?;
        }
        Ok(())
    }
}
