/*
 * Copyright 2024 Download Service Contributors
 */

//! Direct streaming surface (§4.6.2, supplemented from
//! `original_source/app/routers/v2/api_object_get.py`): redeems a geid
//! straight from the catalogue and object store with no job, no hand-off
//! token, and no staging directory that survives the request -- a File
//! streams its bytes, a Folder is staged into a throwaway temp directory,
//! zipped, streamed, and discarded.

use download_types::Node;
use hyper::Body;

use super::prelude::*;
use crate::archive;

#[derive(Deserialize, JsonSchema)]
pub(crate) struct ObjectPath {
    geid: String,
}

/// `GET /v2/object/{geid}`: single-version dataset files stream directly,
/// bypassing the job/lock/token machinery entirely (§4.6.2, third bullet).
#[endpoint {
    method = GET,
    path = "/v2/object/{geid}",
}]
pub(crate) async fn object_get(
    rqctx: RequestContext<Arc<AppState>>,
    path: TypedPath<ObjectPath>,
) -> DSResult<hyper::Response<Body>> {
    let c = rqctx.context();
    let log = &rqctx.log;
    let p = path.into_inner();

    let node = c.catalogue.get_node_by_geid(&p.geid).await.or_internal("resolving object").or_500()?;

    match node {
        Node::File(data) => file_stream(c, &data).await,
        Node::Folder(data) => folder_stream(c, log, &data.geid).await,
    }
}

async fn file_stream(c: &Arc<AppState>, data: &download_types::NodeData) -> DSResult<hyper::Response<Body>> {
    let loc = data.parsed_location().or_internal("parsing object location").or_500()?;
    let (stream, size) = c.gateway.get_stream(&loc.bucket, &loc.object_key).await.or_internal("streaming object").or_500()?;

    let body = Body::wrap_stream(stream);
    hyper::Response::builder()
        .header(hyper::header::CONTENT_LENGTH, size)
        .header(hyper::header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", loc.file_name()))
        .body(body)
        .map_err(|e| HttpError::for_internal_error(e.to_string()))
}

/// Stages every non-archived leaf under `geid` into a throwaway directory,
/// zips it, streams the archive back, then removes the directory -- no
/// `DownloadJob`, no status record, no hand-off token (§4.6.2).
async fn folder_stream(c: &Arc<AppState>, log: &Logger, geid: &str) -> DSResult<hyper::Response<Body>> {
    let leaves = c.catalogue.expand_folder(geid).await.or_internal("expanding folder").or_500()?;

    let tmp_folder = c.staging_root.join(format!("object_{}_{}", geid, download_common::unix_time_fractional()));
    tokio::fs::create_dir_all(&tmp_folder).await.or_internal("creating throwaway staging directory").or_500()?;

    for leaf in &leaves {
        let loc = leaf.parsed_location().or_internal("parsing leaf location").or_500()?;
        let dst = tmp_folder.join(&loc.object_key);
        if let Err(e) = c.gateway.fget(&loc.bucket, &loc.object_key, &dst).await {
            warn!(log, "skipping object in ad-hoc folder stream"; "geid" => &leaf.geid, "error" => e.to_string());
        }
    }

    let zip_path = std::path::PathBuf::from(format!("{}.zip", tmp_folder.display()));
    let zip_src = tmp_folder.clone();
    let zip_dst = zip_path.clone();
    tokio::task::spawn_blocking(move || archive::zip_directory(&zip_src, &zip_dst))
        .await
        .or_internal("zip worker panicked")
        .or_500()?
        .or_internal("zipping folder")
        .or_500()?;

    let file = tokio::fs::File::open(&zip_path).await.or_internal("opening ad-hoc archive").or_500()?;
    let meta = file.metadata().await.or_internal("statting ad-hoc archive").or_500()?;
    let stream = tokio_util::io::ReaderStream::new(file);
    let body = Body::wrap_stream(stream);

    let folder_name = zip_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();

    let resp = hyper::Response::builder()
        .header(hyper::header::CONTENT_LENGTH, meta.len())
        .header(hyper::header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", folder_name))
        .body(body)
        .map_err(|e| HttpError::for_internal_error(e.to_string()));

    if let Err(e) = tokio::fs::remove_dir_all(&tmp_folder).await {
        warn!(log, "failed to clean up ad-hoc staging directory"; "path" => tmp_folder.display().to_string(), "error" => e.to_string());
    }

    resp
}
