//! S3-compatible object client (MinIO, AWS S3, and the like).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use cask_types::ByteRange;
use tracing::debug;

use crate::client::{ClientConnector, ObjectClient, PutObject};
use crate::error::{StoreError, StoreResult};
use crate::settings::RemoteSettings;
use crate::traits::FetchStream;

/// Region used for signing when none is configured.
const SIGNING_REGION: &str = "us-east-1";

/// Connector producing [`S3Client`]s with path-style addressing.
#[derive(Clone, Copy, Debug, Default)]
pub struct S3Connector;

impl ClientConnector for S3Connector {
    fn connect(&self, settings: &RemoteSettings) -> StoreResult<Arc<dyn ObjectClient>> {
        Ok(Arc::new(S3Client::new(settings)))
    }
}

/// [`ObjectClient`] backed by `aws-sdk-s3`.
#[derive(Clone, Debug)]
pub struct S3Client {
    client: Client,
}

impl S3Client {
    pub fn new(settings: &RemoteSettings) -> Self {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "cask",
        );
        let region = settings
            .region
            .clone()
            .unwrap_or_else(|| SIGNING_REGION.to_string());
        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(settings.endpoint_url())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .behavior_version(BehaviorVersion::latest())
            .build();
        Self {
            client: Client::from_conf(config),
        }
    }

    /// Wrap an already configured SDK client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectClient for S3Client {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if status_of(&e) == Some(404) => Ok(false),
            Err(e) => Err(sdk_failure("HEAD bucket", &e)),
        }
    }

    async fn create_bucket(&self, bucket: &str, region: Option<&str>) -> StoreResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if let Some(region) = region.filter(|r| *r != SIGNING_REGION) {
            let config = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region))
                .build();
            request = request.create_bucket_configuration(config);
        }
        request
            .send()
            .await
            .map_err(|e| sdk_failure("CREATE bucket", &e))?;
        Ok(())
    }

    async fn put_object(&self, request: PutObject) -> StoreResult<()> {
        let body = ByteStream::from_path(&request.source)
            .await
            .map_err(|e| StoreError::transport(format!("cannot stream {}: {e}", request.source.display())))?;
        let size = i64::try_from(request.size)
            .map_err(|_| StoreError::InvalidInput(format!("object too large: {} bytes", request.size)))?;

        let metadata: HashMap<String, String> = request.metadata.into_iter().collect();
        let tagging = (!request.tags.is_empty()).then(|| {
            form_urlencoded::Serializer::new(String::new())
                .extend_pairs(request.tags.iter())
                .finish()
        });

        self.client
            .put_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .body(body)
            .content_length(size)
            .set_content_type(request.content_type)
            .set_metadata((!metadata.is_empty()).then_some(metadata))
            .set_tagging(tagging)
            .set_expires(request.expires.map(DateTime::from))
            .send()
            .await
            .map_err(|e| sdk_failure("PUT", &e))?;
        debug!(bucket = %request.bucket, key = %request.key, "object put");
        Ok(())
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> StoreResult<FetchStream> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .set_range(range.map(|r| r.to_header()))
            .send()
            .await
            .map_err(|e| match status_of(&e) {
                Some(404) => StoreError::NotFound(format!("{bucket}/{key}")),
                Some(416) => StoreError::InvalidInput(format!(
                    "range not satisfiable for {bucket}/{key}"
                )),
                _ => sdk_failure("GET", &e),
            })?;
        Ok(Box::pin(response.body.into_async_read()))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_failure("DELETE", &e))?;
        Ok(())
    }
}

fn status_of<E>(err: &SdkError<E>) -> Option<u16> {
    match err {
        SdkError::ServiceError(e) => Some(e.raw().status().as_u16()),
        _ => None,
    }
}

fn sdk_failure<E>(operation: &str, err: &SdkError<E>) -> StoreError
where
    E: std::error::Error + 'static,
{
    StoreError::transport(format!("S3 {operation} failed: {}", DisplayErrorContext(err)))
}
