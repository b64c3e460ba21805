/*
 * Copyright 2024 Download Service Contributors
 */

pub(crate) use std::result::Result as SResult;
pub(crate) use std::sync::Arc;

pub(crate) use dropshot::{
    endpoint, HttpError, HttpResponseDeleted, HttpResponseOk, Path as TypedPath,
    Query as TypedQuery, RequestContext, TypedBody,
};
pub(crate) use http::StatusCode;
pub(crate) use schemars::JsonSchema;
pub(crate) use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
pub(crate) use slog::{debug, error, info, o, warn, Logger};

pub(crate) use download_common::ResultExt;
pub(crate) use download_types::Envelope;

pub(crate) use crate::errors::{ApiError, MakeInternalError, OrInternal};
pub(crate) use crate::state::AppState;

pub(crate) type DSResult<T> = SResult<T, HttpError>;
