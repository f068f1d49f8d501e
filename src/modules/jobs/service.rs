use super::dto::{JobResponse, TranscodeRequest, TranscodeResponse};
use super::model::{Job, JobRequest};
use crate::state::AppState;
use anyhow::{Context, Result, anyhow};
use uuid::Uuid;

pub struct JobService;

impl JobService {
    /// Creates the job record and detaches the executor run. The job
    /// must be durably created before this returns: the UUID is the
    /// client's only handle to later progress. Never waits on the run
    /// itself, and the run outlives the submitting request.
    pub async fn submit(
        state: AppState,
        owner_id: Uuid,
        req: TranscodeRequest,
    ) -> Result<TranscodeResponse> {
        let job = Job::new(owner_id);
        state.jobs.create(&job).await.context("failed to create job")?;

        let request = JobRequest {
            command: req.command,
            input_files: req.input_files,
            output_files: req.output_files,
        };

        let response = TranscodeResponse {
            uuid: job.uuid,
            status: job.status,
        };
        tokio::spawn(state.executor.clone().run(job, request));

        Ok(response)
    }

    /// Read-only job snapshot, only for the job's owner. A job that
    /// does not exist and a job owned by someone else produce the same
    /// error so job existence never leaks across users.
    pub async fn get_status(state: AppState, uuid: Uuid, owner_id: Uuid) -> Result<JobResponse> {
        match state.jobs.find_by_uuid(uuid).await? {
            Some(job) if job.owner_id == owner_id => Ok(job.into()),
            _ => Err(anyhow!("job not found")),
        }
    }

    pub async fn list_jobs(state: AppState, owner_id: Uuid) -> Result<Vec<JobResponse>> {
        let jobs = state.jobs.find_by_owner(owner_id).await?;
        Ok(jobs.into_iter().map(JobResponse::from).collect())
    }
}
