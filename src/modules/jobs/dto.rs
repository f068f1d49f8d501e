use super::model::{Job, JobState, OutputFileMetadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TranscodeRequest {
    /// Command template with `{{name}}` placeholders for declared
    /// input/output names.
    #[validate(length(min = 1, message = "Command is required"))]
    pub command: String,
    /// Input name -> fetchable reference (http(s) URL or object key).
    #[validate(length(min = 1, message = "At least one input file is required"))]
    pub input_files: BTreeMap<String, String>,
    /// Output name -> produced filename.
    #[validate(length(min = 1, message = "At least one output file is required"))]
    pub output_files: BTreeMap<String, String>,
}

impl TranscodeRequest {
    /// Input and output name sets must not collide, otherwise a
    /// placeholder would be ambiguous.
    pub fn colliding_name(&self) -> Option<&str> {
        self.input_files
            .keys()
            .find(|k| self.output_files.contains_key(k.as_str()))
            .map(|k| k.as_str())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TranscodeResponse {
    pub uuid: Uuid,
    pub status: JobState,
}

/// Wire snapshot of a job as seen by pollers.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobResponse {
    pub uuid: Uuid,
    pub status: JobState,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_files: Option<BTreeMap<String, OutputFileMetadata>>,
    #[serde(with = "time::serde::iso8601")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::iso8601")]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            uuid: job.uuid,
            status: job.status,
            progress: job.progress,
            error: job.error,
            result: job.result,
            output_files: job.output_files,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}
