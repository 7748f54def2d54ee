//! S3-compatible object store backed by `aws-sdk-s3`.
//!
//! Aliyun OSS, AWS S3 and MinIO all speak this API; the endpoint in the
//! configuration decides which one we talk to.

use async_trait::async_trait;
use aws_sdk_s3::config::{
    BehaviorVersion, Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation,
};
use aws_sdk_s3::primitives::{ByteStream, DateTime as SmithyDateTime};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::{encode_key, DynObjectStore, ObjectInfo, ObjectStore, StoreFactory, SEPARATOR};
use crate::config::StoreConfig;
use crate::error::StoreError;

/// Store client for one bucket.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    endpoint_host: String,
}

impl S3ObjectStore {
    /// Build a client with static credentials for `config`.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        for (field, value) in [
            ("region", &config.region),
            ("accessKeyId", &config.access_key_id),
            ("accessKeySecret", &config.access_key_secret),
            ("bucket", &config.bucket),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::InvalidConfig(format!("{} is empty", field)));
            }
        }

        let endpoint = config.endpoint_url();
        reqwest::Url::parse(&endpoint)
            .map_err(|e| StoreError::InvalidConfig(format!("endpoint {}: {}", endpoint, e)))?;

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.access_key_secret,
            None,
            None,
            "oss-agent-tools",
        );

        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(false)
            // OSS and other S3-compatible services reject the default
            // flexible checksums on PutObject.
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket.clone(),
            endpoint_host: config.endpoint_host(),
        })
    }
}

fn to_chrono(time: Option<&SmithyDateTime>) -> Option<DateTime<Utc>> {
    time.and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>, StoreError> {
        let req = self.client.head_object().bucket(&self.bucket).key(key);

        match req.send().await {
            Ok(ho) => Ok(Some(ObjectInfo::new(
                key,
                ho.content_length().unwrap_or(0).max(0) as u64,
                to_chrono(ho.last_modified()),
            ))),
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_not_found() {
                        return Ok(None);
                    }
                }

                Err(StoreError::Remote(format!(
                    "failed to head_object: {}, {}",
                    key, err
                )))
            }
        }
    }

    async fn copy(&self, source: &str, destination: &str) -> Result<(), StoreError> {
        let copy_source = format!("{}/{}", self.bucket, encode_key(source));
        debug!(source = %source, destination = %destination, "copy_object");

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source)
            .key(destination)
            .send()
            .await
            .map_err(|err| {
                StoreError::Remote(format!(
                    "failed to copy_object from: {} to: {}, {}",
                    source, destination, err
                ))
            })?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        debug!(key = %key, "delete_object");

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| StoreError::Remote(format!("failed to delete_object: {}, {}", key, err)))?;

        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .delimiter(SEPARATOR.to_string());

            if let Some(tok) = continuation_token {
                req = req.continuation_token(tok);
            }

            let lo = req.send().await.map_err(|err| {
                StoreError::Remote(format!("failed to list_objects at: {}, {}", prefix, err))
            })?;

            for o in lo.contents() {
                objects.push(ObjectInfo::new(
                    o.key().unwrap_or(""),
                    o.size().unwrap_or(0).max(0) as u64,
                    to_chrono(o.last_modified()),
                ));
            }

            continuation_token = lo.next_continuation_token().map(|tok| tok.to_string());
            if continuation_token.is_none() {
                break;
            }
        }

        debug!(prefix = %prefix, count = objects.len(), "list_objects");
        Ok(objects)
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<u64, StoreError> {
        let local_err = |message: String| StoreError::LocalFile {
            path: path.display().to_string(),
            message,
        };

        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| local_err(e.to_string()))?
            .len();
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| local_err(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(size as i64)
            .body(body)
            .send()
            .await
            .map_err(|err| StoreError::Remote(format!("failed to put_object at: {}, {}", key, err)))?;

        debug!(key = %key, size, "put_object");
        Ok(size)
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "https://{}.{}/{}",
            self.bucket,
            self.endpoint_host,
            encode_key(key)
        )
    }
}

/// Connects an [`S3ObjectStore`] per configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct S3StoreFactory;

impl StoreFactory for S3StoreFactory {
    fn connect(&self, config: &StoreConfig) -> Result<DynObjectStore, StoreError> {
        Ok(Arc::new(S3ObjectStore::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_config() -> StoreConfig {
        StoreConfig {
            region: "oss-cn-hangzhou".to_string(),
            access_key_id: "id".to_string(),
            access_key_secret: "secret".to_string(),
            bucket: "assets".to_string(),
            endpoint: None,
        }
    }

    #[test]
    fn test_new_rejects_empty_fields() {
        let mut config = store_config();
        config.access_key_id = " ".to_string();

        let result = S3ObjectStore::new(&config);
        assert!(matches!(result, Err(StoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_new_rejects_bad_endpoint() {
        let mut config = store_config();
        config.endpoint = Some("https://exa mple.com:abc".to_string());

        let result = S3ObjectStore::new(&config);
        assert!(matches!(result, Err(StoreError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_object_url() {
        let store = S3ObjectStore::new(&store_config()).unwrap();
        assert_eq!(
            store.object_url("images/logo v2.png"),
            "https://assets.oss-cn-hangzhou.aliyuncs.com/images/logo%20v2.png"
        );
    }

    #[tokio::test]
    async fn test_checksums_only_when_required() {
        let store = S3ObjectStore::new(&store_config()).unwrap();
        let sdk_config = store.client.config();

        assert!(matches!(
            sdk_config.request_checksum_calculation(),
            Some(RequestChecksumCalculation::WhenRequired)
        ));
        assert!(matches!(
            sdk_config.response_checksum_validation(),
            Some(ResponseChecksumValidation::WhenRequired)
        ));
    }

    #[test]
    fn test_to_chrono() {
        let time = SmithyDateTime::from_secs(1_700_000_000);
        let converted = to_chrono(Some(&time)).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
        assert!(to_chrono(None).is_none());
    }
}
