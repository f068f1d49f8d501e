use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    JwtSecret,
    StorageEndpoint,
    StorageBucket,
    StorageRegion,
    StorageAccessKey,
    StorageSecretKey,
    StoragePublicUrl,
    TranscoderPath,
    WorkDir,
    MaxConcurrentJobs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::JwtSecret => "JWT_SECRET",
            EnvKey::StorageEndpoint => "S3_ENDPOINT",
            EnvKey::StorageBucket => "S3_BUCKET",
            EnvKey::StorageRegion => "S3_REGION",
            EnvKey::StorageAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::StorageSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::StoragePublicUrl => "S3_PUBLIC_URL",
            EnvKey::TranscoderPath => "FFMPEG_PATH",
            EnvKey::WorkDir => "WORK_DIR",
            EnvKey::MaxConcurrentJobs => "MAX_CONCURRENT_JOBS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
