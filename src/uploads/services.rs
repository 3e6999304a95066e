use std::{sync::Arc, time::Duration};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::storage::StorageClient;

const UPLOAD_URL_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    pub url: String,
    pub key: String,
    pub public_url: String,
}

/// Hands out write-only upload URLs. `storage` is `None` when no bucket is
/// configured.
#[derive(Clone)]
pub struct UploadService {
    storage: Option<Arc<dyn StorageClient>>,
}

impl UploadService {
    pub fn new(storage: Option<Arc<dyn StorageClient>>) -> Self {
        Self { storage }
    }

    pub async fn presigned_url(&self, content_type: Option<&str>) -> AppResult<PresignedUpload> {
        let storage = self
            .storage
            .as_ref()
            .ok_or_else(|| AppError::Config("AWS_S3_BUCKET_NAME not configured".into()))?;

        let content_type = content_type
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        let key = object_key(Uuid::new_v4(), OffsetDateTime::now_utc());

        let url = storage
            .presign_put(&key, content_type, UPLOAD_URL_TTL)
            .await
            .map_err(|e| {
                error!(error = %e, %key, "could not generate presigned URL");
                AppError::Internal(e)
            })?;

        info!(%key, %content_type, "upload url issued");
        Ok(PresignedUpload {
            url,
            public_url: storage.public_url(&key),
            key,
        })
    }
}

fn object_key(id: Uuid, now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    format!("uploads/{id}-{millis}")
}
