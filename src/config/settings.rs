use crate::config::env::{self, EnvKey};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub storage_endpoint: String,
    pub storage_bucket: String,
    pub storage_region: String,
    pub storage_access_key: String,
    pub storage_secret_key: String,
    pub storage_public_url: String,
    pub transcoder_path: String,
    pub work_dir: String,
    /// 0 disables admission control entirely: every accepted job
    /// starts processing immediately.
    pub max_concurrent_jobs: usize,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 8000),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            jwt_secret: env::get(EnvKey::JwtSecret)?,
            storage_endpoint: env::get(EnvKey::StorageEndpoint)?,
            storage_bucket: env::get_or(EnvKey::StorageBucket, "ffmpeg-files"),
            storage_region: env::get_or(EnvKey::StorageRegion, "us-east-1"),
            storage_access_key: env::get(EnvKey::StorageAccessKey)?,
            storage_secret_key: env::get(EnvKey::StorageSecretKey)?,
            storage_public_url: env::get(EnvKey::StoragePublicUrl)?,
            transcoder_path: env::get_or(EnvKey::TranscoderPath, "/usr/bin/ffmpeg"),
            work_dir: env::get_or(EnvKey::WorkDir, "tmp"),
            max_concurrent_jobs: env::get_parsed(EnvKey::MaxConcurrentJobs, 0),
        })
    }
}
