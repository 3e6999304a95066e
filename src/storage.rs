use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region, RequestChecksumCalculation},
    presigning::PresigningConfig,
    Client,
};

use crate::config::AwsConfig;

#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Presigned PUT for exactly this key and content type.
    async fn presign_put(&self, key: &str, content_type: &str, expires: Duration) -> anyhow::Result<String>;

    /// Where the object can be read once uploaded.
    fn public_url(&self, key: &str) -> String;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    endpoint: Option<String>,
}

impl Storage {
    pub async fn new(aws: &AwsConfig, bucket: &str) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(aws.region.clone()))
            .load()
            .await;

        // A presigned URL must not commit to a checksum of a body it never saw.
        let mut conf = S3ConfigBuilder::from(&shared)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired);
        if let Some(endpoint) = &aws.s3_endpoint {
            conf = conf.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::info!(%bucket, endpoint = ?aws.s3_endpoint, "s3 client ready");
        Ok(Self {
            client: Client::from_conf(conf.build()),
            bucket: bucket.to_string(),
            endpoint: aws.s3_endpoint.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn presign_put(&self, key: &str, content_type: &str, expires: Duration) -> anyhow::Result<String> {
        let req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type);
        let presigned = req
            .presigned(PresigningConfig::expires_in(expires)?)
            .await
            .context("s3 presign_put")?;
        Ok(presigned.uri().to_string())
    }

    fn public_url(&self, key: &str) -> String {
        public_object_url(&self.bucket, self.endpoint.as_deref(), key)
    }
}

/// Virtual-hosted AWS URL, or path-style under a custom endpoint.
pub(crate) fn public_object_url(bucket: &str, endpoint: Option<&str>, key: &str) -> String {
    match endpoint {
        Some(ep) => format!("{}/{}/{}", ep.trim_end_matches('/'), bucket, key),
        None => format!("https://{bucket}.s3.amazonaws.com/{key}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_on_aws() {
        assert_eq!(
            public_object_url("my-blog", None, "uploads/abc-1"),
            "https://my-blog.s3.amazonaws.com/uploads/abc-1"
        );
    }

    #[test]
    fn public_url_on_custom_endpoint() {
        assert_eq!(
            public_object_url("media", Some("http://localhost:9000/"), "uploads/k"),
            "http://localhost:9000/media/uploads/k"
        );
    }
}
