//! Object-store client shared by every writer
//!
//! One client is built per sink run and cloned into each writer context.
//! Credentials resolve in this order: static key pair, named profile, then the
//! ambient provider chain of the S3 service (environment, instance role).

use aws_credential_types::provider::ProvideCredentials;
use opendal::{ErrorKind, Operator};
use records2s3_config::{AwsConfig, SinkConfig, StorageBackend};

use crate::error::{Result, WriterError};

#[derive(Debug, Clone)]
pub struct StorageClient {
    operator: Operator,
    bucket: String,
}

struct ResolvedCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl StorageClient {
    /// Build a client from the sink configuration
    ///
    /// Probes the store before returning unless `verify_connection` is off.
    pub async fn connect(config: &SinkConfig) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(WriterError::configuration("bucket is required"));
        }

        tracing::info!(
            backend = %config.storage_backend,
            bucket = %config.bucket,
            "Initializing object storage"
        );

        let operator = match config.storage_backend {
            StorageBackend::Fs => fs_operator(config)?,
            StorageBackend::S3 => s3_operator(config).await?,
        };

        let client = Self::from_operator(operator, config.bucket.clone());
        if config.verify_connection {
            client.verify().await?;
        }
        Ok(client)
    }

    /// Wrap an existing operator, e.g. an in-memory one
    pub fn from_operator(operator: Operator, bucket: impl Into<String>) -> Self {
        Self {
            operator,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Probe the store once, classifying failures as auth or configuration
    pub async fn verify(&self) -> Result<()> {
        self.operator
            .check()
            .await
            .map_err(|e| check_error(&self.bucket, e))?;
        tracing::debug!(bucket = %self.bucket, "Object store reachable");
        Ok(())
    }

    pub(crate) async fn put(&self, key: &str, body: Vec<u8>) -> opendal::Result<()> {
        self.operator.write(key, body).await.map(|_| ())
    }
}

fn check_error(bucket: &str, e: opendal::Error) -> WriterError {
    if e.kind() == ErrorKind::PermissionDenied {
        WriterError::authentication(format!("access to '{}' denied: {}", bucket, e))
    } else {
        WriterError::configuration(format!(
            "object store for '{}' is unreachable: {}",
            bucket, e
        ))
    }
}

fn fs_operator(config: &SinkConfig) -> Result<Operator> {
    let path = config.storage_path.as_deref().ok_or_else(|| {
        WriterError::configuration("storage_path is required for the fs backend")
    })?;
    let root = format!("{}/{}", path.trim_end_matches('/'), config.bucket);

    let builder = opendal::services::Fs::default().root(&root);
    Ok(Operator::new(builder)
        .map_err(|e| {
            WriterError::configuration(format!("Failed to create filesystem operator: {}", e))
        })?
        .finish())
}

async fn s3_operator(config: &SinkConfig) -> Result<Operator> {
    let region = config
        .aws
        .aws_region
        .as_deref()
        .ok_or_else(|| WriterError::configuration("aws_region is required for the s3 backend"))?;

    let mut builder = opendal::services::S3::default()
        .bucket(&config.bucket)
        .region(region);

    if let Some(endpoint) = &config.aws.endpoint_url {
        builder = builder.endpoint(endpoint);
    }

    if let Some(creds) = resolve_credentials(&config.aws).await? {
        tracing::debug!(
            access_key_id = %redact_secret(&creds.access_key_id),
            "Using explicit S3 credentials"
        );
        builder = builder
            .access_key_id(&creds.access_key_id)
            .secret_access_key(&creds.secret_access_key);
        if let Some(token) = &creds.session_token {
            builder = builder.session_token(token);
        }
    }

    Ok(Operator::new(builder)
        .map_err(|e| WriterError::configuration(format!("Failed to create S3 operator: {}", e)))?
        .finish())
}

async fn resolve_credentials(aws: &AwsConfig) -> Result<Option<ResolvedCredentials>> {
    if let (Some(key), Some(secret)) = (&aws.aws_access_key, &aws.aws_secret_access_key) {
        return Ok(Some(ResolvedCredentials {
            access_key_id: key.clone(),
            secret_access_key: secret.clone(),
            session_token: aws.aws_session_token.clone(),
        }));
    }

    let Some(profile) = aws.aws_profile.as_deref() else {
        return Ok(None);
    };

    let provider = aws_config::profile::ProfileFileCredentialsProvider::builder()
        .profile_name(profile)
        .build();
    let creds = provider.provide_credentials().await.map_err(|e| {
        WriterError::authentication(format!(
            "Failed to load credentials for profile '{}': {}",
            profile, e
        ))
    })?;

    tracing::debug!(profile = %profile, "Resolved credentials from profile");
    Ok(Some(ResolvedCredentials {
        access_key_id: creds.access_key_id().to_string(),
        secret_access_key: creds.secret_access_key().to_string(),
        session_token: creds.session_token().map(str::to_string),
    }))
}

/// Keep the first four characters of a secret for log correlation
pub(crate) fn redact_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}
