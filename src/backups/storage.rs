//! S3-compatible object store for backup archives.
//!
//! Path-style addressing plus an optional endpoint override keeps MinIO
//! and other self-hosted stores working with the same code path.

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::ServiceError;

/// Durable archive storage. The backup engine only ever needs these three
/// operations; the seam keeps retention and restore logic testable without
/// a live bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ServiceError>;
    async fn download(&self, key: &str) -> Result<Vec<u8>, ServiceError>;
    async fn delete(&self, key: &str) -> Result<(), ServiceError>;
}

pub struct BackupStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl BackupStorage {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "siteguard-env",
        );
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }

    /// Archives are namespaced per website so retention never crosses
    /// tenant boundaries.
    pub fn object_key(website_id: Uuid, file_name: &str) -> String {
        format!("backups/{website_id}/{file_name}")
    }
}

#[async_trait]
impl ObjectStore for BackupStorage {
    async fn upload(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ServiceError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        debug!(%key, "object uploaded");
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, ServiceError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        let data = object
            .body
            .collect()
            .await
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        debug!(%key, "object deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_are_namespaced_per_website() {
        let id = Uuid::nil();
        assert_eq!(
            BackupStorage::object_key(id, "backup-x-1.tar.gz"),
            format!("backups/{id}/backup-x-1.tar.gz")
        );
    }
}
