use super::StorageGateway;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

/// S3-compatible gateway (MinIO in development). External http(s)
/// references are fetched over plain HTTP; anything else is treated as
/// an object key in the configured bucket.
pub struct S3Storage {
    client: Client,
    http: reqwest::Client,
    bucket: String,
    public_url: String,
}

impl S3Storage {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        public_url: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!("✅ Connected to S3 (MinIO)");

        Self {
            client,
            http: reqwest::Client::new(),
            bucket: bucket.to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_url(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("failed to download file")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "failed to download file: status code {}",
                response.status().as_u16()
            ));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .context("failed to create temp file")?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("failed to download file")?;
            file.write_all(&chunk).await.context("failed to save file")?;
        }
        file.flush().await.context("failed to save file")?;
        Ok(())
    }

    async fn fetch_object(&self, key: &str, dest: &Path) -> Result<()> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("failed to get object from bucket: {}", e))?;

        let mut reader = object.body.into_async_read();
        let mut file = tokio::fs::File::create(dest)
            .await
            .context("failed to create temp file")?;
        tokio::io::copy(&mut reader, &mut file)
            .await
            .context("failed to save file")?;
        Ok(())
    }
}

#[async_trait]
impl StorageGateway for S3Storage {
    fn is_fetchable(&self, reference: &str) -> bool {
        if reference.is_empty() {
            return false;
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return true;
        }
        // Anything else must be a bare object key, not some other scheme.
        !reference.contains("://")
    }

    async fn fetch(&self, reference: &str, dest_dir: &Path) -> Result<PathBuf> {
        let dest = dest_dir.join(format!("input-{}", Uuid::new_v4().as_simple()));
        debug!("downloading {} to {:?}", reference, dest);

        let result = if reference.starts_with("http://") || reference.starts_with("https://") {
            self.fetch_url(reference, &dest).await
        } else {
            self.fetch_object(reference, &dest).await
        };

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(e);
        }
        Ok(dest)
    }

    async fn upload(&self, local_path: &Path, name: &str, owner_id: Uuid) -> Result<String> {
        let key = format!("user_{}/{}", owner_id, name);
        debug!("uploading {:?} as {}", local_path, key);

        let body = ByteStream::from_path(local_path)
            .await
            .context("failed to open file for upload")?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| anyhow!("failed to upload file: {}", e))?;

        Ok(format!("{}/{}", self.public_url, key))
    }

    async fn delete(&self, local_path: &Path) -> Result<()> {
        match tokio::fs::remove_file(local_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow!("failed to delete file: {}", e)),
        }
    }
}
