/*
 * Copyright 2024 Download Service Contributors
 */

//! Object-store pre-download surface (§6): `/v2/download/pre/`,
//! `/v2/dataset/download/pre`, and the dataset-version redemption endpoint
//! that streams directly from the object store with no staging directory.

use download_types::request::{FullDatasetPreDownloadRequest, GeidEntry, PreDownloadV2Request};
use download_types::{DownloadJob, Location};
use hyper::Body;

use super::prelude::*;
use crate::orchestrator;

fn header_str<'a>(rqctx: &'a RequestContext<Arc<AppState>>, name: &str) -> Option<&'a str> {
    rqctx.request.headers().get(name).and_then(|v| v.to_str().ok())
}

#[endpoint {
    method = POST,
    path = "/v2/download/pre/",
}]
pub(crate) async fn pre_download_v2(
    rqctx: RequestContext<Arc<AppState>>,
    body: TypedBody<PreDownloadV2Request>,
) -> DSResult<HttpResponseOk<Envelope<DownloadJob>>> {
    let c = rqctx.context();
    let log = rqctx.log.clone();
    let req = body.into_inner();

    // Authorization/Refresh-Token are forwarded as opaque credentials to
    // whatever downstream collaborator needs them; authorization itself is
    // assumed enforced upstream (spec Non-goals).
    let _auth = header_str(&rqctx, "authorization");
    let _refresh = header_str(&rqctx, "refresh-token");

    let geids: Vec<String> = req.files.iter().map(|f: &GeidEntry| f.geid.clone()).collect();

    let job = orchestrator::pre_download_v2(
        c,
        &log,
        geids,
        req.operator,
        req.session_id,
        req.project_code,
        req.dataset_geid,
        req.dataset_description,
        req.approval_request_id,
    )
    .await
    .map_err(HttpError::from)?;

    Ok(HttpResponseOk(Envelope::ok(job)))
}

#[endpoint {
    method = POST,
    path = "/v2/dataset/download/pre",
}]
pub(crate) async fn pre_download_full_dataset(
    rqctx: RequestContext<Arc<AppState>>,
    body: TypedBody<FullDatasetPreDownloadRequest>,
) -> DSResult<HttpResponseOk<Envelope<DownloadJob>>> {
    let c = rqctx.context();
    let log = rqctx.log.clone();
    let req = body.into_inner();

    let job = orchestrator::pre_download_full_dataset(c, &log, req.dataset_geid, req.operator, req.session_id)
        .await
        .map_err(HttpError::from)?;

    Ok(HttpResponseOk(Envelope::ok(job)))
}

#[derive(Deserialize, JsonSchema)]
pub(crate) struct DatasetTokenPath {
    token: String,
}

/// `GET /v2/dataset/download/{token}`: verifies the dataset-version variant
/// of the hand-off token (carries `location` rather than `full_path`) and
/// streams the object directly from the store -- no staging directory, per
/// §4.6.2.
#[endpoint {
    method = GET,
    path = "/v2/dataset/download/{token}",
}]
pub(crate) async fn dataset_download_redeem(
    rqctx: RequestContext<Arc<AppState>>,
    path: TypedPath<DatasetTokenPath>,
) -> DSResult<hyper::Response<Body>> {
    let c = rqctx.context();
    let p = path.into_inner();

    let claims = c.token.verify_dataset_version(&p.token).map_err(|e| super::v1::token_error(&e))?;
    let loc = Location::parse(&claims.location).or_internal("parsing dataset-version location").or_500()?;

    let (stream, size) =
        c.gateway.get_stream(&loc.bucket, &loc.object_key).await.or_internal("streaming object").or_500()?;

    let body = Body::wrap_stream(stream);
    hyper::Response::builder()
        .header(hyper::header::CONTENT_LENGTH, size)
        .header(hyper::header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", loc.file_name()))
        .body(body)
        .map_err(|e| HttpError::for_internal_error(e.to_string()))
}

#[cfg(test)]
mod test {
    use download_types::request::PreDownloadV2Request;

    #[test]
    fn pre_download_v2_request_rejects_missing_codes_at_orchestrator_level() {
        // project_code/dataset_geid both absent is rejected by the
        // orchestrator, not at deserialization -- the request type allows it
        // so the 400 carries the taxonomy's INVALID_FILE_AMOUNT code.
        let req = PreDownloadV2Request {
            files: vec![],
            operator: "alice".into(),
            session_id: "sess".into(),
            project_code: None,
            dataset_geid: None,
            dataset_description: None,
            approval_request_id: None,
        };
        assert!(req.project_code.is_none() && req.dataset_geid.is_none());
    }
}
