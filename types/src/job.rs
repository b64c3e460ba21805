/*
 * Copyright 2024 Download Service Contributors
 */

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DownloadType {
    ProjectFiles,
    DatasetFiles,
    FullDataset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Init,
    Zipping,
    ReadyForDownloading,
    Cancelled,
    Succeed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::ReadyForDownloading | JobStatus::Cancelled)
    }
}

/// One resolved leaf destined for the staging folder / archive. Carries
/// enough of the originating node to reconstruct audit events and archive
/// paths without re-querying the catalogue.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileToZip {
    pub geid: String,
    pub location: String,
    pub project_code: Option<String>,
    pub operator: String,
    pub parent_folder: Option<String>,
    pub dataset_code: Option<String>,
}

/// An ordered (resource_key, operation) pair acquired for a job. Released in
/// reverse order of appearance on job end regardless of success.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LockEntry {
    pub resource_key: String,
    pub operation: String,
}

pub type LockedSet = Vec<LockEntry>;

/// Opaque payload attached to a status record: either a minted hand-off
/// token (`hash_code`) on success or an `error_msg` on failure. Kept as an
/// untyped JSON map the way the source system does, since the two shapes
/// never coexist and callers branch on `status` first.
pub type JobPayload = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DownloadJob {
    pub job_id: String,
    pub session_id: String,
    pub operator: String,
    pub project_code: Option<String>,
    pub dataset_code: Option<String>,
    pub primary_geid: String,
    pub download_type: DownloadType,
    pub files_to_zip: Vec<FileToZip>,
    pub contains_folder: bool,
    pub tmp_folder: String,
    pub result_path: String,
    pub status: JobStatus,
    #[serde(default)]
    pub payload: JobPayload,
    pub update_timestamp: i64,
}

impl DownloadJob {
    /// The `code` segment used in status-record keys and staging paths: the
    /// project code when present, otherwise the dataset code.
    pub fn code(&self) -> &str {
        self.project_code
            .as_deref()
            .or(self.dataset_code.as_deref())
            .unwrap_or("")
    }

    /// Formats the status-store key from §3: colon-separated, with the
    /// project/dataset code immediately after the action.
    pub fn status_key(&self, action: &str, source_path: &str) -> String {
        status_key(
            &self.session_id,
            &self.job_id,
            action,
            self.code(),
            &self.operator,
            source_path,
        )
    }
}

pub fn status_key(
    session_id: &str,
    job_id: &str,
    action: &str,
    project_or_dataset: &str,
    operator: &str,
    source_path: &str,
) -> String {
    format!(
        "dataaction:{}:{}:{}:{}:{}:{}",
        session_id, job_id, action, project_or_dataset, operator, source_path
    )
}

/// Builds a prefix-query pattern with `*` wildcard segments, matching the
/// status store's scan-and-filter semantics for any segment left `None`.
pub fn status_key_pattern(
    session_id: Option<&str>,
    job_id: Option<&str>,
    action: Option<&str>,
    project_or_dataset: Option<&str>,
    operator: Option<&str>,
    source_path: Option<&str>,
) -> String {
    let seg = |v: Option<&str>| v.unwrap_or("*").to_string();
    format!(
        "dataaction:{}:{}:{}:{}:{}:{}",
        seg(session_id),
        seg(job_id),
        seg(action),
        seg(project_or_dataset),
        seg(operator),
        seg(source_path),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_key_matches_layout() {
        let k = status_key("sess", "job1", "data_download", "proj", "alice", "a/b.txt");
        assert_eq!(k, "dataaction:sess:job1:data_download:proj:alice:a/b.txt");
    }

    #[test]
    fn status_key_pattern_wildcards_missing_segments() {
        let p = status_key_pattern(Some("sess"), None, Some("data_download"), Some("proj"), Some("alice"), None);
        assert_eq!(p, "dataaction:sess:*:data_download:proj:alice:*");
    }

    #[test]
    fn code_prefers_project_over_dataset() {
        let job = DownloadJob {
            job_id: "1".into(),
            session_id: "s".into(),
            operator: "op".into(),
            project_code: Some("proj".into()),
            dataset_code: Some("ds".into()),
            primary_geid: "g".into(),
            download_type: DownloadType::ProjectFiles,
            files_to_zip: vec![],
            contains_folder: false,
            tmp_folder: "/tmp/x".into(),
            result_path: "/tmp/x.zip".into(),
            status: JobStatus::Zipping,
            payload: JobPayload::new(),
            update_timestamp: 0,
        };
        assert_eq!(job.code(), "proj");
    }
}
