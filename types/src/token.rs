/*
 * Copyright 2024 Download Service Contributors
 */

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Claims carried by a file-redemption hand-off token (§3 HandoffToken).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DownloadClaims {
    pub geid: String,
    pub full_path: String,
    pub issuer: String,
    pub operator: String,
    pub session_id: String,
    pub job_id: String,
    pub project_code: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Claims for the dataset-version redemption path: same envelope, but
/// `location` (a store location string) replaces `full_path` since no
/// staging directory is involved.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatasetVersionClaims {
    pub geid: String,
    pub location: String,
    pub issuer: String,
    pub operator: String,
    pub session_id: String,
    pub job_id: String,
    pub project_code: Option<String>,
    pub iat: i64,
    pub exp: i64,
}
