#![allow(dead_code)]

use anyhow::{Result, bail};
use async_trait::async_trait;
use ffmpeg_api::infrastructure::storage::StorageGateway;
use ffmpeg_api::modules::auth::repository::UserAccounting;
use ffmpeg_api::modules::jobs::executor::JobExecutor;
use ffmpeg_api::modules::jobs::model::{Job, JobRequest};
use ffmpeg_api::modules::jobs::store::JobStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::AtomicI64;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// In-memory job store with the same visibility contract as the
/// Postgres one: every write is immediately readable by any caller.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&job.uuid) {
            bail!("duplicate job {}", job.uuid);
        }
        jobs.insert(job.uuid, job.clone());
        Ok(())
    }

    async fn update(&self, job: &Job) -> Result<()> {
        self.jobs.lock().unwrap().insert(job.uuid, job.clone());
        Ok(())
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<Job>> {
        Ok(self.jobs.lock().unwrap().get(&uuid).cloned())
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<Job>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.owner_id == owner_id)
            .cloned()
            .collect())
    }
}

/// Filesystem stand-in for the S3 gateway: references are absolute
/// local paths, uploads land in a scratch directory keyed like the
/// bucket layout.
pub struct LocalStorage {
    uploads: TempDir,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self {
            uploads: tempfile::tempdir().unwrap(),
        }
    }

    pub fn uploaded_path(&self, owner_id: Uuid, name: &str) -> PathBuf {
        self.uploads
            .path()
            .join(format!("user_{}", owner_id))
            .join(name)
    }
}

#[async_trait]
impl StorageGateway for LocalStorage {
    fn is_fetchable(&self, reference: &str) -> bool {
        Path::new(reference).is_absolute()
    }

    async fn fetch(&self, reference: &str, dest_dir: &Path) -> Result<PathBuf> {
        let dest = dest_dir.join(format!("input-{}", Uuid::new_v4().simple()));
        tokio::fs::copy(reference, &dest).await?;
        Ok(dest)
    }

    async fn upload(&self, local_path: &Path, name: &str, owner_id: Uuid) -> Result<String> {
        let dir = self.uploads.path().join(format!("user_{}", owner_id));
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::copy(local_path, dir.join(name)).await?;
        Ok(format!("local://user_{}/{}", owner_id, name))
    }

    async fn delete(&self, local_path: &Path) -> Result<()> {
        match tokio::fs::remove_file(local_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct RecordingAccounting {
    pub usage: AtomicI64,
    pub bytes: AtomicI64,
}

#[async_trait]
impl UserAccounting for RecordingAccounting {
    async fn increment_usage(&self, _owner_id: Uuid) -> Result<()> {
        self.usage.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn increment_bytes_processed(&self, _owner_id: Uuid, bytes: i64) -> Result<()> {
        self.bytes.fetch_add(bytes, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

/// One fully wired pipeline with /bin/sh standing in for the
/// transcoder, so templates like `-c "cp {{in1}} {{out1}}"` exercise
/// the real spawn, stderr and exit handling without ffmpeg installed.
pub struct Harness {
    pub store: Arc<MemoryJobStore>,
    pub storage: Arc<LocalStorage>,
    pub accounting: Arc<RecordingAccounting>,
    pub executor: Arc<JobExecutor>,
    pub work_root: TempDir,
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryJobStore::default());
    let storage = Arc::new(LocalStorage::new());
    let accounting = Arc::new(RecordingAccounting::default());
    let work_root = tempfile::tempdir().unwrap();
    let executor = Arc::new(JobExecutor::new(
        store.clone(),
        accounting.clone(),
        storage.clone(),
        "/bin/sh",
        work_root.path(),
        0,
    ));
    Harness {
        store,
        storage,
        accounting,
        executor,
        work_root,
    }
}

pub fn job_request(
    command: &str,
    inputs: &[(&str, &str)],
    outputs: &[(&str, &str)],
) -> JobRequest {
    JobRequest {
        command: command.to_string(),
        input_files: inputs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        output_files: outputs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

pub async fn wait_for_terminal(store: &dyn JobStore, uuid: Uuid) -> Job {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(job) = store.find_by_uuid(uuid).await.unwrap() {
            if job.status.is_terminal() {
                return job;
            }
        }
        if tokio::time::Instant::now() > deadline {
            panic!("job {} never reached a terminal state", uuid);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
