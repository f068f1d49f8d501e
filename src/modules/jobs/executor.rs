use super::command::{self, CommandTemplate};
use super::model::{FileType, Job, JobRequest, JobState, OutputFileMetadata};
use super::progress;
use super::store::JobStore;
use crate::infrastructure::storage::StorageGateway;
use crate::modules::auth::repository::UserAccounting;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tokio::process::Command;
use tokio::sync::{Semaphore, mpsc};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Why a job run stopped early. The text ends up verbatim in the job's
/// error field; nothing here propagates to a caller since the caller
/// already detached at submission.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Malformed reference, unreachable source, missing declared input.
    #[error("{0}")]
    Input(String),
    /// The template resolved to an empty command.
    #[error("invalid transcoding command")]
    Config,
    /// The transcoder failed to launch or exited non-zero.
    #[error("{0}")]
    Execution(String),
    /// Expected output missing or unreadable, or its upload failed.
    #[error("{0}")]
    Output(String),
}

/// Job-scoped working directory, removed unconditionally when the run
/// ends regardless of outcome.
struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    fn create(root: &Path, job_uuid: Uuid) -> Result<Self, PipelineError> {
        let path = root.join(job_uuid.to_string());
        std::fs::create_dir_all(&path).map_err(|e| {
            PipelineError::Execution(format!("failed to create work directory: {}", e))
        })?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!("failed to remove work directory {:?}: {}", self.path, e);
        }
    }
}

struct RunStats {
    total_bytes: u64,
}

fn download_progress(completed: usize, total: usize) -> u8 {
    (completed as f64 / total as f64 * 25.0).round() as u8
}

fn upload_progress(completed: usize, total: usize) -> u8 {
    75 + (completed as f64 / total as f64 * 24.0).round() as u8
}

fn seconds_since(start: OffsetDateTime) -> f64 {
    (OffsetDateTime::now_utc() - start).as_seconds_f64()
}

/// Drives one job from PENDING to a terminal state.
///
/// Each run is the single owner of its job record: the progress monitor
/// and the subprocess wait are multiplexed into one task, so every
/// status/progress write is totally ordered and pollers always read a
/// consistent snapshot.
pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    accounting: Arc<dyn UserAccounting>,
    storage: Arc<dyn StorageGateway>,
    transcoder_path: String,
    work_root: PathBuf,
    gate: Option<Arc<Semaphore>>,
}

impl JobExecutor {
    /// `max_concurrent_jobs` of zero means no admission control: every
    /// accepted submission starts processing immediately.
    pub fn new(
        store: Arc<dyn JobStore>,
        accounting: Arc<dyn UserAccounting>,
        storage: Arc<dyn StorageGateway>,
        transcoder_path: impl Into<String>,
        work_root: impl Into<PathBuf>,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            store,
            accounting,
            storage,
            transcoder_path: transcoder_path.into(),
            work_root: work_root.into(),
            gate: match max_concurrent_jobs {
                0 => None,
                n => Some(Arc::new(Semaphore::new(n))),
            },
        }
    }

    /// Entry point for one detached job run. The job is already
    /// persisted in PENDING; the triggering request has returned by the
    /// time this does any real work, so nothing is ever returned to it.
    pub async fn run(self: Arc<Self>, mut job: Job, req: JobRequest) {
        let _permit = match &self.gate {
            Some(gate) => gate.clone().acquire_owned().await.ok(),
            None => None,
        };

        job.status = JobState::Processing;
        job.progress = 0;
        job.original_request = Some(req.clone());
        job.touch();
        // The one persistence failure that aborts the run: without this
        // write the client would poll a job that never leaves pending.
        if let Err(e) = self.store.update(&job).await {
            error!("failed to mark job {} as processing: {}", job.uuid, e);
            return;
        }
        info!("processing job {}", job.uuid);

        match self.execute(&mut job, &req).await {
            Ok(stats) => {
                job.status = JobState::Success;
                job.progress = 100;
                job.result = Some("Successfully processed files".to_string());
                job.total_seconds = Some(seconds_since(job.created_at));
                job.touch();
                if let Err(e) = self.store.update(&job).await {
                    error!("failed to update final status for job {}: {}", job.uuid, e);
                    return;
                }
                info!("job {} completed", job.uuid);

                // Best-effort accounting, never blocks or fails the job.
                let accounting = self.accounting.clone();
                let owner_id = job.owner_id;
                tokio::spawn(async move {
                    if let Err(e) = accounting.increment_usage(owner_id).await {
                        warn!("failed to increment usage count for {}: {}", owner_id, e);
                    }
                    if let Err(e) = accounting
                        .increment_bytes_processed(owner_id, stats.total_bytes as i64)
                        .await
                    {
                        warn!("failed to increment bytes processed for {}: {}", owner_id, e);
                    }
                });
            }
            Err(e) => self.fail(&mut job, &e.to_string()).await,
        }
    }

    async fn fail(&self, job: &mut Job, message: &str) {
        warn!("job {} failed: {}", job.uuid, message);
        job.status = JobState::Failed;
        job.error = Some(message.to_string());
        job.total_seconds = Some(seconds_since(job.created_at));
        job.touch();
        if let Err(e) = self.store.update(job).await {
            error!("failed to record failure for job {}: {}", job.uuid, e);
        }
    }

    async fn execute(&self, job: &mut Job, req: &JobRequest) -> Result<RunStats, PipelineError> {
        let workdir = WorkDir::create(&self.work_root, job.uuid)?;

        let mut fetched = Vec::new();
        let result = self
            .execute_in(job, req, workdir.path(), &mut fetched)
            .await;

        // Temporary input copies are scheduled for deletion no matter
        // how the run ended; delete is idempotent on missing paths.
        for path in fetched {
            if let Err(e) = self.storage.delete(&path).await {
                warn!("failed to delete temporary file {:?}: {}", path, e);
            }
        }

        result
    }

    async fn execute_in(
        &self,
        job: &mut Job,
        req: &JobRequest,
        workdir: &Path,
        fetched: &mut Vec<PathBuf>,
    ) -> Result<RunStats, PipelineError> {
        // Fetch every declared input into the work directory (0-25%).
        let total_inputs = req.input_files.len();
        let mut input_paths = BTreeMap::new();
        let mut input_bytes: u64 = 0;
        for (completed, (key, reference)) in req.input_files.iter().enumerate() {
            if !self.storage.is_fetchable(reference) {
                return Err(PipelineError::Input(format!(
                    "invalid reference for input file {}",
                    key
                )));
            }

            let path = self.storage.fetch(reference, workdir).await.map_err(|e| {
                PipelineError::Input(format!("failed to download input file {}: {}", key, e))
            })?;
            fetched.push(path.clone());

            let meta = tokio::fs::metadata(&path).await.map_err(|e| {
                PipelineError::Input(format!("failed to get input file size for {}: {}", key, e))
            })?;
            input_bytes += meta.len();
            input_paths.insert(key.clone(), path.to_string_lossy().into_owned());

            self.persist_progress(job, download_progress(completed + 1, total_inputs))
                .await;
        }

        // Destination paths only; the transcoder creates the files.
        let mut output_locals = BTreeMap::new();
        let mut output_paths = BTreeMap::new();
        for (key, filename) in &req.output_files {
            let path = workdir.join(filename);
            output_paths.insert(key.clone(), path.to_string_lossy().into_owned());
            output_locals.insert(key.clone(), path);
        }

        let resolved = CommandTemplate::new(&req.command).resolve(&input_paths, &output_paths);
        let args = command::tokenize(&resolved);
        if args.is_empty() {
            return Err(PipelineError::Config);
        }

        let transcode_seconds = self.transcode(job, &args, workdir).await?;
        job.transcode_seconds = Some(transcode_seconds);

        // Upload outputs and gather metadata (75-99%).
        self.persist_progress(job, 75).await;
        let total_outputs = output_locals.len();
        let mut output_bytes: u64 = 0;
        job.output_files = Some(BTreeMap::new());
        for (completed, (key, path)) in output_locals.iter().enumerate() {
            let meta = tokio::fs::metadata(path).await.map_err(|e| {
                PipelineError::Output(format!("failed to get output file size for {}: {}", key, e))
            })?;
            output_bytes += meta.len();

            let filename = req.output_files[key].as_str();
            let storage_url = self
                .storage
                .upload(path, filename, job.owner_id)
                .await
                .map_err(|e| {
                    PipelineError::Output(format!("failed to upload output file {}: {}", key, e))
                })?;

            let metadata = describe_output(path, meta.len(), storage_url);
            if let Some(files) = job.output_files.as_mut() {
                files.insert(key.clone(), metadata);
            }

            self.persist_progress(job, upload_progress(completed + 1, total_outputs))
                .await;
        }

        Ok(RunStats {
            total_bytes: input_bytes + output_bytes,
        })
    }

    /// Launches the transcoder and waits for it while funneling monitor
    /// updates through this task. Returns the subprocess wall-clock
    /// seconds on success.
    async fn transcode(
        &self,
        job: &mut Job,
        args: &[String],
        workdir: &Path,
    ) -> Result<f64, PipelineError> {
        // Exactly 25% before waiting on the subprocess.
        self.persist_progress(job, 25).await;

        let mut child = Command::new(&self.transcoder_path)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PipelineError::Execution(format!("failed to start transcoder: {}", e)))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| PipelineError::Execution("transcoder stderr unavailable".to_string()))?;

        let (tx, mut rx) = mpsc::channel(16);
        let monitor = tokio::spawn(progress::watch(stderr, tx));

        let started = Instant::now();
        tokio::pin! {
            let wait = child.wait();
        }
        let mut exit = None;
        // The monitor closes its channel when stderr does, which is
        // after exit; keep draining so no progress update is dropped.
        loop {
            tokio::select! {
                status = &mut wait, if exit.is_none() => {
                    exit = Some(status.map_err(|e| {
                        PipelineError::Execution(format!("failed to wait for transcoder: {}", e))
                    })?);
                }
                update = rx.recv() => match update {
                    Some(value) => self.persist_progress(job, value).await,
                    None => break,
                },
            }
        }
        let status = match exit {
            Some(status) => status,
            None => wait.await.map_err(|e| {
                PipelineError::Execution(format!("failed to wait for transcoder: {}", e))
            })?,
        };
        let _ = monitor.await;

        if !status.success() {
            return Err(PipelineError::Execution(format!(
                "transcoder failed: {}",
                status
            )));
        }
        Ok(started.elapsed().as_secs_f64())
    }

    /// Raises progress (never lowering it) and persists right away so
    /// pollers see near-real-time updates. A failed write is logged and
    /// the run continues best-effort.
    async fn persist_progress(&self, job: &mut Job, value: u8) {
        job.raise_progress(value);
        job.touch();
        if let Err(e) = self.store.update(job).await {
            error!("failed to update progress for job {}: {}", job.uuid, e);
        }
    }
}

fn describe_output(path: &Path, size_bytes: u64, storage_url: String) -> OutputFileMetadata {
    let file_format = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();
    let file_type = FileType::from_extension(&file_format);

    // Only decodes the image header, never the pixel data.
    let (width, height) = match file_type {
        FileType::Image => match image::image_dimensions(path) {
            Ok((w, h)) => (Some(w), Some(h)),
            Err(_) => (None, None),
        },
        _ => (None, None),
    };

    OutputFileMetadata {
        file_id: Uuid::new_v4(),
        size_mbytes: size_bytes as f64 / 1024.0 / 1024.0,
        file_type,
        file_format,
        storage_url,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_band() {
        assert_eq!(download_progress(1, 4), 6);
        assert_eq!(download_progress(2, 4), 13);
        assert_eq!(download_progress(4, 4), 25);
        assert_eq!(download_progress(1, 1), 25);
    }

    #[test]
    fn test_upload_band() {
        assert_eq!(upload_progress(1, 3), 83);
        assert_eq!(upload_progress(2, 3), 91);
        assert_eq!(upload_progress(3, 3), 99);
        assert_eq!(upload_progress(1, 1), 99);
    }

    #[test]
    fn test_workdir_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let uuid = Uuid::new_v4();
        let path = {
            let workdir = WorkDir::create(root.path(), uuid).unwrap();
            std::fs::write(workdir.path().join("leftover.bin"), b"x").unwrap();
            workdir.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_describe_output_classifies_by_extension() {
        let meta = describe_output(Path::new("/tmp/a/result.mp4"), 2 * 1024 * 1024, "u".into());
        assert_eq!(meta.file_type, FileType::Video);
        assert_eq!(meta.file_format, "mp4");
        assert_eq!(meta.size_mbytes, 2.0);
        assert!(meta.width.is_none());

        let meta = describe_output(Path::new("/tmp/a/noext"), 10, "u".into());
        assert_eq!(meta.file_type, FileType::Unknown);
        assert_eq!(meta.file_format, "");
    }
}
