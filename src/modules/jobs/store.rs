use super::model::{Job, JobRequest, OutputFileMetadata};
use crate::infrastructure::db::pool::DbPool;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::FromRow;
use sqlx::types::Json;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use uuid::Uuid;

/// Durable persistence for job records.
///
/// `update` is an idempotent full overwrite of the record; writes must
/// be visible to subsequent reads from any caller. The executor keeps
/// writing to a job after the submitting request has ended, so
/// implementations must not tie their lifetime to a request scope.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &Job) -> Result<()>;
    async fn update(&self, job: &Job) -> Result<()>;
    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<Job>>;
    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<Job>>;
}

pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct JobRow {
    uuid: Uuid,
    owner_id: Uuid,
    status: String,
    progress: i32,
    result: Option<String>,
    error: Option<String>,
    original_request: Option<Json<JobRequest>>,
    output_files: Option<Json<BTreeMap<String, OutputFileMetadata>>>,
    transcode_seconds: Option<f64>,
    total_seconds: Option<f64>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Job {
            uuid: row.uuid,
            owner_id: row.owner_id,
            status: row.status.into(),
            progress: row.progress.clamp(0, 100) as u8,
            result: row.result,
            error: row.error,
            original_request: row.original_request.map(|j| j.0),
            output_files: row.output_files.map(|j| j.0),
            transcode_seconds: row.transcode_seconds,
            total_seconds: row.total_seconds,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str = "uuid, owner_id, status, progress, result, error, \
     original_request, output_files, transcode_seconds, total_seconds, \
     created_at, updated_at";

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: &Job) -> Result<()> {
        sqlx::query(
            "INSERT INTO jobs (uuid, owner_id, status, progress, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(job.uuid)
        .bind(job.owner_id)
        .bind(job.status.as_str())
        .bind(job.progress as i32)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, job: &Job) -> Result<()> {
        sqlx::query(
            "UPDATE jobs
             SET status = $2, progress = $3, result = $4, error = $5,
                 original_request = $6, output_files = $7,
                 transcode_seconds = $8, total_seconds = $9, updated_at = $10
             WHERE uuid = $1",
        )
        .bind(job.uuid)
        .bind(job.status.as_str())
        .bind(job.progress as i32)
        .bind(&job.result)
        .bind(&job.error)
        .bind(job.original_request.as_ref().map(Json))
        .bind(job.output_files.as_ref().map(Json))
        .bind(job.transcode_seconds)
        .bind(job.total_seconds)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM jobs WHERE uuid = $1"
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Job::from))
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM jobs WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Job::from).collect())
    }
}
