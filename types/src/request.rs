/*
 * Copyright 2024 Download Service Contributors
 */

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One entry of the legacy `POST /v1/download/pre/` body: a pre-resolved
/// local filesystem path rather than a geid.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LegacyFileEntry {
    pub full_path: String,
    pub project_code: String,
    pub geid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PreDownloadV1Request {
    pub files: Vec<LegacyFileEntry>,
    pub operator: String,
    pub session_id: String,
    pub project_code: String,
}

/// One entry of the `POST /v2/download/pre/` body: just a geid, resolved
/// against the catalogue.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GeidEntry {
    pub geid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PreDownloadV2Request {
    pub files: Vec<GeidEntry>,
    pub operator: String,
    pub session_id: String,
    #[serde(default)]
    pub project_code: Option<String>,
    #[serde(default)]
    pub dataset_geid: Option<String>,
    #[serde(default)]
    pub dataset_description: Option<String>,
    #[serde(default)]
    pub approval_request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FullDatasetPreDownloadRequest {
    pub dataset_geid: String,
    pub operator: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct StatusListQuery {
    pub project_code: Option<String>,
    pub operator: Option<String>,
    #[serde(default = "StatusListQuery::default_job_id")]
    pub job_id: String,
}

impl StatusListQuery {
    fn default_job_id() -> String {
        "*".to_string()
    }
}
