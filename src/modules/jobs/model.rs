use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of a transcoding job. Advances monotonically, except that
/// Failed is reachable from any non-terminal state. On the wire Success
/// is reported as `completed`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    #[serde(rename = "completed")]
    Success,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Success => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Failed)
    }
}

impl From<String> for JobState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "processing" => JobState::Processing,
            "completed" => JobState::Success,
            "failed" => JobState::Failed,
            _ => JobState::Pending,
        }
    }
}

/// Coarse artifact classification derived from the file extension.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Video,
    Unknown,
}

impl FileType {
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "jpg" | "jpeg" | "png" | "gif" | "webp" => FileType::Image,
            "mp4" | "webm" | "mov" | "avi" => FileType::Video,
            _ => FileType::Unknown,
        }
    }
}

/// Describes one artifact produced by a job.
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct OutputFileMetadata {
    pub file_id: Uuid,
    pub size_mbytes: f64,
    pub file_type: FileType,
    pub file_format: String,
    pub storage_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// The resolved submission payload, retained on the job for audit.
///
/// Name maps are BTreeMaps so inputs and outputs are always processed in
/// lexicographic key order.
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct JobRequest {
    pub command: String,
    pub input_files: BTreeMap<String, String>,
    pub output_files: BTreeMap<String, String>,
}

/// Durable state of one submitted transcoding job.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Job {
    pub uuid: Uuid,
    pub owner_id: Uuid,
    pub status: JobState,
    pub progress: u8,
    pub result: Option<String>,
    pub error: Option<String>,
    pub original_request: Option<JobRequest>,
    pub output_files: Option<BTreeMap<String, OutputFileMetadata>>,
    pub transcode_seconds: Option<f64>,
    pub total_seconds: Option<f64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Job {
    pub fn new(owner_id: Uuid) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            uuid: Uuid::new_v4(),
            owner_id,
            status: JobState::Pending,
            progress: 0,
            result: None,
            error: None,
            original_request: None,
            output_files: None,
            transcode_seconds: None,
            total_seconds: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bumps the last-update timestamp; called before every persist.
    pub fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }

    /// Raises progress, never lowering it. Pollers must observe a
    /// non-decreasing sequence for the lifetime of the job.
    pub fn raise_progress(&mut self, value: u8) {
        self.progress = self.progress.max(value.min(100));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_status_strings() {
        assert_eq!(JobState::Pending.as_str(), "pending");
        assert_eq!(JobState::Processing.as_str(), "processing");
        assert_eq!(JobState::Success.as_str(), "completed");
        assert_eq!(JobState::Failed.as_str(), "failed");

        // serde must agree with as_str at the wire boundary
        assert_eq!(
            serde_json::to_string(&JobState::Success).unwrap(),
            "\"completed\""
        );
        assert_eq!(
            serde_json::from_str::<JobState>("\"completed\"").unwrap(),
            JobState::Success
        );
    }

    #[test]
    fn test_file_type_classification() {
        assert_eq!(FileType::from_extension("png"), FileType::Image);
        assert_eq!(FileType::from_extension("webp"), FileType::Image);
        assert_eq!(FileType::from_extension("mp4"), FileType::Video);
        assert_eq!(FileType::from_extension("avi"), FileType::Video);
        assert_eq!(FileType::from_extension("srt"), FileType::Unknown);
        assert_eq!(FileType::from_extension(""), FileType::Unknown);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut job = Job::new(Uuid::new_v4());
        job.raise_progress(25);
        assert_eq!(job.progress, 25);
        job.raise_progress(10);
        assert_eq!(job.progress, 25);
        job.raise_progress(120);
        assert_eq!(job.progress, 100);
    }
}
