/*
 * Copyright 2024 Download Service Contributors
 */

//! Download Orchestrator (C6): assembles a job from a request, then hands
//! staging and archiving off to a background worker. `pre_download_*`
//! covers §4.6 steps 1-8; `run_worker` covers §4.6.1.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use download_common::{unix_time_fractional, unix_time_secs};
use download_types::{DownloadClaims, DownloadJob, DownloadType, FileToZip, JobStatus, Location};
use serde_json::json;
use slog::{error, info, o, warn, Logger};

use crate::errors::{ApiError, OrInternal};
use crate::gateway::GatewayError;
use crate::state::AppState;

/// Everything the background worker needs that isn't already implied by
/// the persisted `DownloadJob`: the geids the caller originally asked for
/// (locking re-walks the tree rather than trusting the expanded leaf list)
/// and whether this is a full-dataset job.
pub struct WorkItem {
    pub job: DownloadJob,
    pub original_geids: Vec<String>,
    pub code: String,
    pub dataset_description: Option<String>,
    pub dataset_geid: Option<String>,
}

fn new_job_id() -> String {
    format!("data-download-{}", unix_time_secs())
}

fn staging_folder(staging_root: &std::path::Path, code: &str) -> PathBuf {
    staging_root.join(format!("{}_{}", code, unix_time_fractional()))
}

struct ResolvedEntity {
    file: FileToZip,
    object_key: String,
}

/// Resolves one requested geid into zero or more leaf `FileToZip` entries,
/// expanding folders via the catalogue. Archived nodes are never included
/// (§8 invariant 5).
async fn resolve_entity(
    state: &AppState,
    geid: &str,
    operator: &str,
) -> Result<(Vec<ResolvedEntity>, bool), ApiError> {
    let node = state.catalogue.get_node_by_geid(geid).await.or_internal("resolving entity")?;
    let data = node.data();
    if data.archived {
        return Ok((Vec::new(), false));
    }

    if !node.is_folder() {
        let loc = data.parsed_location().or_internal("parsing file location")?;
        let entry = ResolvedEntity {
            file: FileToZip {
                geid: data.geid.clone(),
                location: data.location.clone(),
                project_code: data.project_code.clone(),
                operator: operator.to_string(),
                parent_folder: None,
                dataset_code: data.dataset_code.clone(),
            },
            object_key: loc.object_key,
        };
        return Ok((vec![entry], false));
    }

    let leaves = state.catalogue.expand_folder(geid).await.or_internal("expanding folder")?;
    let contains_folder = !leaves.is_empty();
    let entries = leaves
        .into_iter()
        .filter_map(|leaf| {
            let loc = Location::parse(&leaf.location).ok()?;
            Some(ResolvedEntity {
                file: FileToZip {
                    geid: leaf.geid.clone(),
                    location: leaf.location.clone(),
                    project_code: leaf.project_code.clone(),
                    operator: operator.to_string(),
                    parent_folder: Some(geid.to_string()),
                    dataset_code: leaf.dataset_code.clone(),
                },
                object_key: loc.object_key,
            })
        })
        .collect();

    Ok((entries, contains_folder))
}

struct Plan {
    files_to_zip: Vec<FileToZip>,
    contains_folder: bool,
    single_object_key: Option<String>,
}

async fn build_plan(
    state: &AppState,
    geids: &[String],
    operator: &str,
    approved: Option<&HashSet<String>>,
) -> Result<Plan, ApiError> {
    let mut files_to_zip = Vec::new();
    let mut contains_folder = false;
    let mut single_object_key = None;

    for geid in geids {
        let (entries, folder) = resolve_entity(state, geid, operator).await?;
        contains_folder |= folder;
        for entry in entries {
            if let Some(approved) = approved {
                if !approved.contains(&entry.file.geid) {
                    continue;
                }
            }
            if files_to_zip.is_empty() {
                single_object_key = Some(entry.object_key.clone());
            }
            files_to_zip.push(entry.file);
        }
    }

    Ok(Plan { files_to_zip, contains_folder, single_object_key })
}

/// §4.6 step 5: a multi-file or folder-expanded plan zips to
/// `tmp_folder.zip`; a true single file resolves to `tmp_folder/<object_key>`
/// (§8 scenario S1).
fn result_path_for(tmp_folder: &std::path::Path, plan: &Plan) -> String {
    let multi = plan.files_to_zip.len() > 1 || plan.contains_folder;
    if multi {
        format!("{}.zip", tmp_folder.display())
    } else {
        let key = plan.single_object_key.clone().unwrap_or_default();
        tmp_folder.join(&key).display().to_string()
    }
}

fn mint_claims(
    job: &DownloadJob,
    geid: &str,
    issuer: &str,
    expire_minutes: i64,
) -> DownloadClaims {
    let now = unix_time_secs() as i64;
    DownloadClaims {
        geid: geid.to_string(),
        full_path: job.result_path.clone(),
        issuer: issuer.to_string(),
        operator: job.operator.clone(),
        session_id: job.session_id.clone(),
        job_id: job.job_id.clone(),
        project_code: job.project_code.clone(),
        iat: now,
        exp: now + expire_minutes * 60,
    }
}

/// §4.6 steps 1-8 for the object-store pre-download path (`/v2/download/pre/`).
#[allow(clippy::too_many_arguments)]
pub async fn pre_download_v2(
    state: &Arc<AppState>,
    log: &Logger,
    geids: Vec<String>,
    operator: String,
    session_id: String,
    project_code: Option<String>,
    dataset_geid: Option<String>,
    dataset_description: Option<String>,
    approval_request_id: Option<String>,
) -> Result<DownloadJob, ApiError> {
    if project_code.is_none() && dataset_geid.is_none() {
        return Err(ApiError::invalid_file_amount("one of project_code or dataset_geid is required"));
    }
    if geids.is_empty() {
        return Err(ApiError::invalid_file_amount("files must not be empty"));
    }

    let dataset_code = match &dataset_geid {
        Some(dg) => Some(state.catalogue.get_dataset_node(dg).await.or_internal("resolving dataset_geid")?.code),
        None => None,
    };

    let approved = match &approval_request_id {
        Some(request_id) => state.approval.as_ref().map(|a| a.approved_geids(request_id)),
        None => None,
    };

    let plan = build_plan(state, &geids, &operator, approved.as_ref()).await?;
    if plan.files_to_zip.is_empty() {
        return Err(ApiError::invalid_file_amount("no resolvable, approved files in request"));
    }

    let code = project_code.clone().or_else(|| dataset_code.clone()).unwrap_or_default();
    let tmp_folder = staging_folder(&state.staging_root, &code);
    let result_path = result_path_for(&tmp_folder, &plan);

    let job_id = new_job_id();
    let primary_geid = geids[0].clone();
    let download_type = if dataset_geid.is_some() { DownloadType::DatasetFiles } else { DownloadType::ProjectFiles };

    let mut job = DownloadJob {
        job_id: job_id.clone(),
        session_id: session_id.clone(),
        operator: operator.clone(),
        project_code: project_code.clone(),
        dataset_code: dataset_code.clone(),
        primary_geid: primary_geid.clone(),
        download_type,
        files_to_zip: plan.files_to_zip,
        contains_folder: plan.contains_folder,
        tmp_folder: tmp_folder.display().to_string(),
        result_path,
        status: JobStatus::Zipping,
        payload: Default::default(),
        update_timestamp: unix_time_secs() as i64,
    };

    let claims = mint_claims(&job, &primary_geid, &state.config.token.secret, state.config.token.expire_minutes);
    let token = state.token.generate_download(&claims).or_internal("minting hand-off token")?;

    let mut payload = serde_json::Map::new();
    payload.insert("hash_code".to_string(), json!(token));
    job.payload = payload;

    state
        .status
        .set_job(&job, "data_download", &job.result_path)
        .await
        .or_internal("persisting status record")?;

    let item =
        WorkItem { job: job.clone(), original_geids: geids, code, dataset_description, dataset_geid: dataset_geid.clone() };
    if state.work_tx.send(item).await.is_err() {
        warn!(log, "worker pool channel closed; job will not be staged"; "job_id" => job_id);
    }

    Ok(job)
}

/// `/v2/dataset/download/pre` -- the `full_dataset` variant: no explicit
/// file list, the whole dataset is resolved and staged. Grounded in the
/// original's `dataset_pre_download`, which walks the `Dataset -> {File,
/// Folder}` relation directly rather than resolving the dataset geid as a
/// File/Folder node, and always turns on the description-file write.
pub async fn pre_download_full_dataset(
    state: &Arc<AppState>,
    log: &Logger,
    dataset_geid: String,
    operator: String,
    session_id: String,
) -> Result<DownloadJob, ApiError> {
    let dataset_node = state.catalogue.get_dataset_node(&dataset_geid).await.or_internal("resolving dataset")?;
    let dataset_code = dataset_node.code;

    let leaves = state.catalogue.expand_folder(&dataset_geid).await.or_internal("expanding dataset")?;
    let files_to_zip: Vec<FileToZip> = leaves
        .into_iter()
        .map(|leaf| FileToZip {
            geid: leaf.geid,
            location: leaf.location,
            project_code: leaf.project_code,
            operator: operator.clone(),
            parent_folder: Some(dataset_geid.clone()),
            dataset_code: leaf.dataset_code,
        })
        .collect();
    let contains_folder = !files_to_zip.is_empty();

    let tmp_folder = staging_folder(&state.staging_root, &dataset_code);
    let result_path = format!("{}.zip", tmp_folder.display());

    let job_id = new_job_id();
    let mut job = DownloadJob {
        job_id: job_id.clone(),
        session_id: session_id.clone(),
        operator: operator.clone(),
        project_code: None,
        dataset_code: Some(dataset_code.clone()),
        primary_geid: dataset_geid.clone(),
        download_type: DownloadType::FullDataset,
        files_to_zip,
        contains_folder,
        tmp_folder: tmp_folder.display().to_string(),
        result_path,
        status: JobStatus::Zipping,
        payload: Default::default(),
        update_timestamp: unix_time_secs() as i64,
    };

    let claims = mint_claims(&job, &dataset_geid, &state.config.token.secret, state.config.token.expire_minutes);
    let token = state.token.generate_download(&claims).or_internal("minting hand-off token")?;
    let mut payload = serde_json::Map::new();
    payload.insert("hash_code".to_string(), json!(token));
    job.payload = payload;

    state
        .status
        .set_job(&job, "data_download", &job.result_path)
        .await
        .or_internal("persisting status record")?;

    let item = WorkItem {
        job: job.clone(),
        original_geids: vec![dataset_geid.clone()],
        code: dataset_code,
        dataset_description: Some("true".to_string()),
        dataset_geid: Some(dataset_geid),
    };
    if state.work_tx.send(item).await.is_err() {
        warn!(log, "worker pool channel closed; job will not be staged"; "job_id" => job_id);
    }

    Ok(job)
}

/// §4.6.1: the background worker. Acquires locks, stages every file, and
/// on success transitions the record to `READY_FOR_DOWNLODING` (sic kept
/// as `READY_FOR_DOWNLOADING` in our enum); on failure transitions to
/// `CANCELLED`. Locks are always released, regardless of outcome.
pub async fn run_worker(log: &Logger, state: &Arc<AppState>, item: WorkItem) {
    let log = log.new(o!("job_id" => item.job.job_id.clone()));
    let mut job = item.job;

    let (locked, lock_err) = state.locks.recursive_lock(&state.catalogue, &item.code, &item.original_geids).await;
    if let Some(e) = lock_err {
        warn!(log, "lock acquisition failed, aborting job"; "error" => e.to_string());
        finish_job(&log, state, &mut job, Err(e.to_string())).await;
        state.locks.release_all(&locked).await;
        return;
    }

    let result = stage_and_archive(&log, state, &mut job, &item.dataset_description, &item.dataset_geid).await;

    match result {
        Ok(()) => finish_job(&log, state, &mut job, Ok(())).await,
        Err(e) => {
            error!(log, "job failed"; "error" => e.to_string());
            finish_job(&log, state, &mut job, Err(e.to_string())).await;
        }
    }

    state.locks.release_all(&locked).await;
}

async fn stage_and_archive(
    log: &Logger,
    state: &Arc<AppState>,
    job: &mut DownloadJob,
    dataset_description: &Option<String>,
    dataset_geid: &Option<String>,
) -> anyhow::Result<()> {
    let tmp_folder = PathBuf::from(&job.tmp_folder);
    tokio::fs::create_dir_all(&tmp_folder).await?;

    for entry in &job.files_to_zip {
        let loc = Location::parse(&entry.location)?;
        let dst = tmp_folder.join(&loc.object_key);
        match state.gateway.fget(&loc.bucket, &loc.object_key, &dst).await {
            Ok(()) => {}
            Err(GatewayError::NoSuchKey { .. }) => {
                warn!(log, "skipping missing object"; "location" => entry.location.clone());
            }
            Err(e) => return Err(e.into()),
        }
    }

    if job.download_type == DownloadType::FullDataset {
        write_dataset_schemas(log, state, job).await?;
    }

    if let (Some(_), Some(geid)) = (dataset_description, dataset_geid) {
        write_dataset_description(log, state, job, geid).await?;
    }

    if job.files_to_zip.len() > 1 || job.contains_folder {
        let zip_path = PathBuf::from(&job.result_path);
        let tmp_folder = tmp_folder.clone();
        tokio::task::spawn_blocking(move || crate::archive::zip_directory(&tmp_folder, &zip_path)).await??;
    }

    let geid_for_audit = dataset_geid.as_deref().unwrap_or(&job.primary_geid);
    if job.download_type == DownloadType::DatasetFiles {
        let source_entry: Vec<String> =
            job.files_to_zip.iter().map(|f| dataset_relative_name(&f.location)).collect();
        state
            .audit
            .publish(
                "DATASET_FILEDOWNLOAD_SUCCEED",
                state.audit.dataset_download_payload(geid_for_audit, &job.operator, "data_download", source_entry),
                "activity",
                "dataset.download",
                "data_download_events",
                "topic",
            )
            .await?;
    } else if job.download_type == DownloadType::FullDataset {
        state
            .audit
            .publish(
                "DATASET_DOWNLOAD_SUCCEED",
                state.audit.dataset_download_payload(
                    geid_for_audit,
                    &job.operator,
                    "data_download",
                    job.files_to_zip.iter().map(|f| dataset_relative_name(&f.location)).collect(),
                ),
                "activity",
                "dataset.download",
                "data_download_events",
                "topic",
            )
            .await?;
    }

    Ok(())
}

/// Filenames "derived from each location (segments after the 7th `/`)"
/// per §4.6.1 step 6 -- a location like `scheme://host/bucket/a/b/c.txt`
/// has its first six `/` in `scheme://host/bucket/`, so the 7th-and-later
/// segments are the path under the bucket.
fn dataset_relative_name(location: &str) -> String {
    location.splitn(8, '/').last().unwrap_or(location).to_string()
}

/// Writes `<dataset_code>_description.json` into the staging folder when
/// the request carried `dataset_description` (§4 of SPEC_FULL, grounded in
/// the original's `zip_worker` `dataset_description` branch).
async fn write_dataset_description(
    log: &Logger,
    state: &Arc<AppState>,
    job: &DownloadJob,
    dataset_geid: &str,
) -> anyhow::Result<()> {
    let node = state.catalogue.get_dataset_node(dataset_geid).await?;
    let tmp_folder = PathBuf::from(&job.tmp_folder);
    tokio::fs::create_dir_all(&tmp_folder).await?;

    let description = json!({
        "authors": node.authors,
        "collection_method": node.collection_method,
        "creator": node.creator,
        "description": node.description,
        "license": node.license,
        "modality": node.modality,
        "name": node.name,
        "tags": node.tags,
        "type": node.dataset_type,
    });

    let path = tmp_folder.join(format!("{}_description.json", node.code));
    let body = serde_json::to_vec_pretty(&description)?;
    tokio::fs::write(&path, body).await?;
    info!(log, "wrote dataset description"; "path" => path.display().to_string());

    Ok(())
}

async fn write_dataset_schemas(
    log: &Logger,
    state: &Arc<AppState>,
    job: &DownloadJob,
) -> anyhow::Result<()> {
    let dataset_code = job.dataset_code.as_deref().unwrap_or_default();
    let tmp_folder = PathBuf::from(&job.tmp_folder);

    for (standard, prefix) in [
        (state.config.dataset_schema.default_standard.as_str(), "default"),
        ("open_minds", "openMINDS"),
    ] {
        match state.schema.fetch(dataset_code, standard).await {
            Ok(files) => {
                for f in files {
                    let path = tmp_folder.join(format!("{prefix}_{}", f.name));
                    let body = serde_json::to_vec_pretty(&f.content)?;
                    tokio::fs::write(path, body).await?;
                }
            }
            Err(e) => warn!(log, "schema fetch failed"; "standard" => standard, "error" => e.to_string()),
        }
    }

    Ok(())
}

async fn finish_job(
    log: &Logger,
    state: &Arc<AppState>,
    job: &mut DownloadJob,
    outcome: Result<(), String>,
) {
    job.update_timestamp = unix_time_secs() as i64;
    match outcome {
        Ok(()) => {
            job.status = JobStatus::ReadyForDownloading;
            info!(log, "job ready for downloading"; "result_path" => job.result_path.clone());
        }
        Err(error_msg) => {
            job.status = JobStatus::Cancelled;
            job.payload.insert("error_msg".to_string(), json!(error_msg));
        }
    }

    if let Err(e) = state.status.set_job(job, "data_download", &job.result_path).await {
        error!(log, "failed to persist final job status"; "error" => e.to_string());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dataset_relative_name_strips_scheme_host_and_bucket() {
        let loc = "http://minio:9000/bucket/a/b/c.txt";
        assert_eq!(dataset_relative_name(loc), "c.txt");
    }

    #[test]
    fn job_id_has_expected_prefix() {
        assert!(new_job_id().starts_with("data-download-"));
    }

    /// §8 scenario S1: a single non-folder file resolves to
    /// `<tmp_folder>/<object_key>`, not a zip.
    #[test]
    fn result_path_for_single_file_is_not_a_zip() {
        let tmp_folder = std::path::Path::new("/staging/proj_1700000000");
        let plan = Plan {
            files_to_zip: vec![FileToZip {
                geid: "g1".into(),
                location: "http://h/bucket/a/b.txt".into(),
                project_code: Some("proj".into()),
                operator: "alice".into(),
                parent_folder: None,
                dataset_code: None,
            }],
            contains_folder: false,
            single_object_key: Some("a/b.txt".to_string()),
        };

        assert_eq!(result_path_for(tmp_folder, &plan), "/staging/proj_1700000000/a/b.txt");
    }

    /// §8 scenario S2: a folder expansion yielding two files zips the whole
    /// staging folder.
    #[test]
    fn result_path_for_folder_expansion_is_a_zip() {
        let tmp_folder = std::path::Path::new("/staging/proj_1700000000");
        let plan = Plan {
            files_to_zip: vec![
                FileToZip {
                    geid: "g1".into(),
                    location: "http://h/bucket/a/b.txt".into(),
                    project_code: Some("proj".into()),
                    operator: "alice".into(),
                    parent_folder: Some("folder1".into()),
                    dataset_code: None,
                },
                FileToZip {
                    geid: "g2".into(),
                    location: "http://h/bucket/a/c.txt".into(),
                    project_code: Some("proj".into()),
                    operator: "alice".into(),
                    parent_folder: Some("folder1".into()),
                    dataset_code: None,
                },
            ],
            contains_folder: true,
            single_object_key: Some("a/b.txt".to_string()),
        };

        assert_eq!(result_path_for(tmp_folder, &plan), "/staging/proj_1700000000.zip");
    }
}
