use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub mod s3;

pub use s3::S3Storage;

/// File transfer between the job pipeline and the outside world.
///
/// References are caller-supplied strings; `is_fetchable` is the cheap
/// pre-flight check the executor runs before committing to a download.
/// `delete` is idempotent: deleting a path that is already gone is fine.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    fn is_fetchable(&self, reference: &str) -> bool;

    /// Fetches a reference into `dest_dir` and returns the local path.
    async fn fetch(&self, reference: &str, dest_dir: &Path) -> Result<PathBuf>;

    /// Uploads a produced file under a per-owner key and returns its
    /// externally resolvable URL.
    async fn upload(&self, local_path: &Path, name: &str, owner_id: Uuid) -> Result<String>;

    /// Removes a local temporary copy.
    async fn delete(&self, local_path: &Path) -> Result<()>;
}
