use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

/// Which guard protects the mutating routes. Exactly one per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    Bearer,
    /// `None` means no secret was configured; every request is rejected.
    SharedSecret(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBackend {
    DynamoDb,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub dynamodb_endpoint: Option<String>,
    pub s3_endpoint: Option<String>,
    pub bucket: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: DataBackend,
    pub aws: AwsConfig,
    pub users_table: String,
    pub blogs_table: String,
    pub jwt: JwtConfig,
    pub auth_mode: AuthMode,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: non_empty_var("JWT_SECRET").context("JWT_SECRET must be set")?,
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
        };

        let auth_mode = parse_auth_mode(
            std::env::var("AUTH_MODE").ok().as_deref(),
            non_empty_var("ADMIN_SECRET"),
        )?;

        let backend = match std::env::var("DATA_BACKEND").ok().as_deref() {
            None | Some("dynamodb") => DataBackend::DynamoDb,
            Some("memory") => DataBackend::Memory,
            Some(other) => anyhow::bail!("unknown DATA_BACKEND {other:?}"),
        };

        let aws = AwsConfig {
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "ap-southeast-1".into()),
            dynamodb_endpoint: non_empty_var("DYNAMODB_ENDPOINT"),
            s3_endpoint: non_empty_var("S3_ENDPOINT"),
            bucket: non_empty_var("AWS_S3_BUCKET_NAME"),
        };

        Ok(Self {
            backend,
            aws,
            users_table: std::env::var("USERS_TABLE_NAME").unwrap_or_else(|_| "Users".into()),
            blogs_table: std::env::var("BLOG_TABLE_NAME").unwrap_or_else(|_| "Blogs".into()),
            jwt,
            auth_mode,
        })
    }

    /// Mode label safe to log; never includes the secret.
    pub fn auth_mode_name(&self) -> &'static str {
        match self.auth_mode {
            AuthMode::Bearer => "bearer",
            AuthMode::SharedSecret(Some(_)) => "shared-secret",
            AuthMode::SharedSecret(None) => "shared-secret (unconfigured, rejecting all)",
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_auth_mode(mode: Option<&str>, admin_secret: Option<String>) -> anyhow::Result<AuthMode> {
    match mode.map(str::to_ascii_lowercase).as_deref() {
        None | Some("bearer") | Some("jwt") => Ok(AuthMode::Bearer),
        Some("shared-secret") | Some("shared_secret") => Ok(AuthMode::SharedSecret(admin_secret)),
        Some(other) => anyhow::bail!("unknown AUTH_MODE {other:?}"),
    }
}
