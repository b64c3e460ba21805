/*
 * Copyright 2024 Download Service Contributors
 */

//! Legacy pre-download surface (§6): operates on already-local filesystem
//! paths rather than object-store geids, and the status/redemption
//! endpoints shared between the legacy and object-store flows.

use std::path::Path;

use download_types::request::{PreDownloadV1Request, StatusListQuery};
use download_types::{status_key_pattern, DownloadClaims, DownloadJob, DownloadType, FileToZip, JobStatus};
use hyper::Body;
use serde_json::json;

use super::prelude::*;

fn header_str<'a>(rqctx: &'a RequestContext<Arc<AppState>>, name: &str) -> Option<&'a str> {
    rqctx.request.headers().get(name).and_then(|v| v.to_str().ok())
}

#[endpoint {
    method = POST,
    path = "/v1/download/pre/",
}]
pub(crate) async fn pre_download_v1(
    rqctx: RequestContext<Arc<AppState>>,
    body: TypedBody<PreDownloadV1Request>,
) -> DSResult<HttpResponseOk<Envelope<DownloadJob>>> {
    let c = rqctx.context();
    let log = &rqctx.log;
    let req = body.into_inner();

    if req.files.is_empty() {
        return Err(ApiError::invalid_file_amount("files must not be empty").into());
    }

    let mut not_found = Vec::new();
    let mut files_to_zip = Vec::new();
    for f in &req.files {
        if Path::new(&f.full_path).exists() {
            files_to_zip.push(FileToZip {
                geid: f.geid.clone(),
                location: f.full_path.clone(),
                project_code: Some(f.project_code.clone()),
                operator: req.operator.clone(),
                parent_folder: None,
                dataset_code: None,
            });
        } else {
            not_found.push(f.full_path.clone());
        }
    }

    if !not_found.is_empty() {
        return Err(ApiError::file_not_found(format!("{:?}", not_found)).into());
    }

    let multi = files_to_zip.len() > 1;
    let job_id = format!("data-download-{}", download_common::unix_time_secs());
    let result_path = if multi {
        files_to_zip[0].location.clone() + ".zip"
    } else {
        files_to_zip[0].location.clone()
    };

    let mut job = DownloadJob {
        job_id: job_id.clone(),
        session_id: req.session_id.clone(),
        operator: req.operator.clone(),
        project_code: Some(req.project_code.clone()),
        dataset_code: None,
        primary_geid: req.files[0].geid.clone(),
        download_type: DownloadType::ProjectFiles,
        files_to_zip,
        contains_folder: false,
        tmp_folder: String::new(),
        result_path,
        status: if multi { JobStatus::Zipping } else { JobStatus::ReadyForDownloading },
        payload: Default::default(),
        update_timestamp: download_common::unix_time_secs() as i64,
    };

    let claims = DownloadClaims {
        geid: job.primary_geid.clone(),
        full_path: job.result_path.clone(),
        issuer: "SERVICE DATA DOWNLOAD".to_string(),
        operator: job.operator.clone(),
        session_id: job.session_id.clone(),
        job_id: job.job_id.clone(),
        project_code: job.project_code.clone(),
        iat: download_common::unix_time_secs() as i64,
        exp: download_common::unix_time_secs() as i64 + c.config.token.expire_minutes * 60,
    };
    let token = c.token.generate_download(&claims).or_internal("minting hand-off token")?;
    job.payload.insert("hash_code".to_string(), json!(token));

    c.status.set_job(&job, "data_download", &job.result_path).await.or_internal("persisting status record")?;

    if multi {
        let zip_dst = job.result_path.clone();
        let files: Vec<String> = job.files_to_zip.iter().map(|f| f.location.clone()).collect();
        let log = log.clone();
        let handle = tokio::task::spawn_blocking(move || zip_ad_hoc_files(&files, std::path::Path::new(&zip_dst)));
        tokio::task::spawn(async move {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(log, "legacy zip assembly failed"; "error" => e.to_string()),
                Err(e) => error!(log, "legacy zip worker panicked"; "error" => e.to_string()),
            }
        });
    }

    Ok(HttpResponseOk(Envelope::ok(job)))
}

fn zip_ad_hoc_files(files: &[String], dst: &Path) -> anyhow::Result<()> {
    use std::io::{Read, Write};
    let f = std::fs::File::create(dst)?;
    let mut zw = zip::ZipWriter::new(f);
    let options = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut buf = Vec::new();
    for path in files {
        let p = Path::new(path);
        let name = p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| path.clone());
        zw.start_file(name, options)?;
        buf.clear();
        std::fs::File::open(p).and_then(|mut f| f.read_to_end(&mut buf))?;
        zw.write_all(&buf)?;
    }
    zw.finish()?;
    Ok(())
}

#[endpoint {
    method = GET,
    path = "/v1/downloads/status",
}]
pub(crate) async fn downloads_status_list(
    rqctx: RequestContext<Arc<AppState>>,
    query: TypedQuery<StatusListQuery>,
) -> DSResult<HttpResponseOk<Envelope<Vec<serde_json::Value>>>> {
    let c = rqctx.context();
    let q = query.into_inner();
    let session_id = header_str(&rqctx, "session-id").map(|s| s.to_string());

    let pattern = status_key_pattern(
        session_id.as_deref(),
        Some(q.job_id.as_str()),
        Some("data_download"),
        q.project_code.as_deref(),
        q.operator.as_deref(),
        None,
    );

    let records = c.status.mget_by_prefix(&pattern).await.or_internal("querying status store")?;
    if records.is_empty() {
        return Err(ApiError::job_not_found("no matching status records").into());
    }

    let total = records.len() as u32;
    Ok(HttpResponseOk(Envelope::ok_list(records, total)))
}

#[derive(Deserialize, JsonSchema)]
pub(crate) struct TokenPath {
    token: String,
}

#[endpoint {
    method = GET,
    path = "/v1/download/status/{token}",
}]
pub(crate) async fn download_status_by_token(
    rqctx: RequestContext<Arc<AppState>>,
    path: TypedPath<TokenPath>,
) -> DSResult<HttpResponseOk<Envelope<serde_json::Value>>> {
    let c = rqctx.context();
    let p = path.into_inner();

    let claims = c.token.verify_download(&p.token).map_err(|e| token_error(&e))?;

    let pattern = status_key_pattern(
        Some(&claims.session_id),
        Some(&claims.job_id),
        Some("data_download"),
        claims.project_code.as_deref(),
        Some(&claims.operator),
        Some(&claims.full_path),
    );
    let mut records = c.status.mget_by_prefix(&pattern).await.or_internal("querying status store")?;

    if records.is_empty() {
        return Err(ApiError::job_not_found(format!("no record for source {}", claims.full_path)).into());
    }

    Ok(HttpResponseOk(Envelope::ok(records.remove(0))))
}

pub(crate) fn token_error(e: &crate::token::TokenError) -> HttpError {
    let api: ApiError = match e {
        crate::token::TokenError::Expired => ApiError::token_expired(e.to_string()),
        crate::token::TokenError::Forged(_) => ApiError::forged_token(e.to_string()),
        crate::token::TokenError::Invalid(_) => ApiError::invalid_token(e.to_string()),
    };
    api.into()
}

#[endpoint {
    method = GET,
    path = "/v1/download/{token}",
}]
pub(crate) async fn download_redeem(
    rqctx: RequestContext<Arc<AppState>>,
    path: TypedPath<TokenPath>,
) -> DSResult<hyper::Response<Body>> {
    let c = rqctx.context();
    let log = &rqctx.log;
    let p = path.into_inner();

    let claims = c.token.verify_download(&p.token).map_err(|e| token_error(&e))?;

    let full_path = std::path::Path::new(&claims.full_path);
    if !full_path.is_file() {
        return Err(ApiError::file_not_found(format!("[File not found] {}", claims.full_path)).into());
    }

    let display_name = full_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();

    c.audit
        .publish(
            "data_download",
            c.audit.data_download_payload(
                "data_download",
                &claims.operator,
                &claims.full_path,
                "success",
                &display_name,
                claims.project_code.as_deref(),
                &claims.full_path,
            ),
            "activity",
            "file.download",
            "data_download_events",
            "topic",
        )
        .await
        .or_internal("publishing audit event")?;

    let pattern = status_key_pattern(
        Some(&claims.session_id),
        Some(&claims.job_id),
        Some("data_download"),
        claims.project_code.as_deref(),
        Some(&claims.operator),
        None,
    );
    for mut record in c.status.mget_by_prefix(&pattern).await.or_internal("loading status records")? {
        if let Some(obj) = record.as_object_mut() {
            obj.insert("status".to_string(), json!("SUCCEED"));
            if let (Some(session_id), Some(job_id)) =
                (obj.get("session_id").and_then(|v| v.as_str()), obj.get("job_id").and_then(|v| v.as_str()))
            {
                let source = obj
                    .get("result_path")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&claims.full_path)
                    .to_string();
                // DownloadJob::code() prefers project_code, falling back to
                // dataset_code -- re-keying with project_code alone would
                // write a brand-new key for dataset-only jobs and leave the
                // real ZIPPING record never transitioned to SUCCEED.
                let code = obj
                    .get("project_code")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .or_else(|| obj.get("dataset_code").and_then(|v| v.as_str()))
                    .unwrap_or_default()
                    .to_string();
                let key = download_types::status_key(
                    session_id,
                    job_id,
                    "data_download",
                    &code,
                    obj.get("operator").and_then(|v| v.as_str()).unwrap_or_default(),
                    &source,
                );
                c.status.set(&key, &record).await.warn_on_err(log, "failed to update status record to SUCCEED");
            }
        }
    }

    let file = tokio::fs::File::open(full_path).await.or_internal("opening staged file")?;
    let meta = file.metadata().await.or_internal("statting staged file")?;
    let stream = tokio_util::io::ReaderStream::new(file);
    let body = Body::wrap_stream(stream);

    hyper::Response::builder()
        .header(hyper::header::CONTENT_LENGTH, meta.len())
        .header(hyper::header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", display_name))
        .body(body)
        .map_err(|e| HttpError::for_internal_error(e.to_string()))
}

#[endpoint {
    method = DELETE,
    path = "/v1/download/status",
}]
pub(crate) async fn download_status_delete(
    rqctx: RequestContext<Arc<AppState>>,
) -> DSResult<HttpResponseDeleted> {
    let c = rqctx.context();
    let session_id = header_str(&rqctx, "session-id")
        .ok_or_else(|| {
            HttpError::for_client_error(
                None,
                StatusCode::BAD_REQUEST,
                "Session-Id header is required".to_string(),
            )
        })?
        .to_string();

    let pattern = status_key_pattern(Some(&session_id), None, Some("data_download"), None, None, None);
    c.status.mdelete_by_prefix(&pattern).await.or_internal("deleting status records")?;

    Ok(HttpResponseDeleted())
}
