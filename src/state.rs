use crate::auth::{
    jwt::JwtKeys,
    repo::{DynamoUserRepo, UserRepo},
    services::AuthService,
};
use crate::blogs::{
    repo::{BlogRepo, DynamoBlogRepo},
    services::BlogService,
};
use crate::config::{AppConfig, DataBackend};
use crate::memory::{MemoryBlogRepo, MemoryUserRepo};
use crate::storage::{Storage, StorageClient};
use crate::uploads::services::UploadService;
use crate::dynamo;
use std::sync::Arc;

/// Everything handlers need, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub auth: AuthService,
    pub blogs: BlogService,
    pub uploads: UploadService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let (users, blogs): (Arc<dyn UserRepo>, Arc<dyn BlogRepo>) = match config.backend {
            DataBackend::DynamoDb => {
                let client = dynamo::connect(&config.aws).await?;
                (
                    Arc::new(DynamoUserRepo::new(client.clone(), &config.users_table)),
                    Arc::new(DynamoBlogRepo::new(client, &config.blogs_table)),
                )
            }
            DataBackend::Memory => {
                tracing::warn!("using in-memory tables; data is lost on restart");
                (
                    Arc::new(MemoryUserRepo::default()),
                    Arc::new(MemoryBlogRepo::default()),
                )
            }
        };

        let storage = match &config.aws.bucket {
            Some(bucket) => Some(Arc::new(Storage::new(&config.aws, bucket).await?) as Arc<dyn StorageClient>),
            None => {
                tracing::warn!("AWS_S3_BUCKET_NAME not set; uploads disabled");
                None
            }
        };

        Self::from_parts(config, users, blogs, storage)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        blogs: Arc<dyn BlogRepo>,
        storage: Option<Arc<dyn StorageClient>>,
    ) -> anyhow::Result<Self> {
        let jwt = JwtKeys::from_config(&config.jwt);
        Ok(Self {
            auth: AuthService::new(users, jwt.clone())?,
            blogs: BlogService::new(blogs),
            uploads: UploadService::new(storage),
            jwt,
            config,
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with_auth(crate::config::AuthMode::Bearer)
    }

    #[cfg(test)]
    pub fn fake_with_auth(auth_mode: crate::config::AuthMode) -> Self {
        use crate::config::{AwsConfig, JwtConfig};
        use async_trait::async_trait;
        use std::time::Duration;

        #[derive(Clone)]
        struct FakeStorage;
        #[async_trait]
        impl StorageClient for FakeStorage {
            async fn presign_put(&self, k: &str, _ct: &str, _e: Duration) -> anyhow::Result<String> {
                Ok(format!("https://fake.local/{}?X-Amz-Signature=fake", k))
            }
            fn public_url(&self, k: &str) -> String {
                format!("https://fake.local/{}", k)
            }
        }

        let config = Arc::new(AppConfig {
            backend: DataBackend::Memory,
            aws: AwsConfig {
                region: "ap-southeast-1".into(),
                dynamodb_endpoint: None,
                s3_endpoint: None,
                bucket: Some("fake".into()),
            },
            users_table: "Users".into(),
            blogs_table: "Blogs".into(),
            jwt: JwtConfig {
                secret: "test".into(),
                ttl_minutes: 5,
            },
            auth_mode,
        });

        Self::from_parts(
            config,
            Arc::new(MemoryUserRepo::default()),
            Arc::new(MemoryBlogRepo::default()),
            Some(Arc::new(FakeStorage) as Arc<dyn StorageClient>),
        )
        .expect("fake state")
    }
}
