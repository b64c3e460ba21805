/*
 * Copyright 2024 Download Service Contributors
 */

use std::result::Result as SResult;

use dropshot::HttpError;
use download_types::ErrorCode;
use http::StatusCode;

/// The uniform wrapper from §4.7: every orchestrator/component failure
/// carries one of the taxonomy codes from §7 plus a human-readable detail,
/// and is translated at the HTTP boundary into the matching status with
/// `error_code` set to the taxonomy string.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {detail}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> ApiError {
        ApiError { code, detail: detail.into() }
    }

    pub fn file_not_found(detail: impl Into<String>) -> ApiError {
        ApiError::new(ErrorCode::FileNotFound, detail)
    }

    pub fn invalid_file_amount(detail: impl Into<String>) -> ApiError {
        ApiError::new(ErrorCode::InvalidFileAmount, detail)
    }

    pub fn job_not_found(detail: impl Into<String>) -> ApiError {
        ApiError::new(ErrorCode::JobNotFound, detail)
    }

    pub fn forged_token(detail: impl Into<String>) -> ApiError {
        ApiError::new(ErrorCode::ForgedToken, detail)
    }

    pub fn token_expired(detail: impl Into<String>) -> ApiError {
        ApiError::new(ErrorCode::TokenExpired, detail)
    }

    pub fn invalid_token(detail: impl Into<String>) -> ApiError {
        ApiError::new(ErrorCode::InvalidToken, detail)
    }

    pub fn internal(detail: impl Into<String>) -> ApiError {
        ApiError::new(ErrorCode::Internal, detail)
    }
}

impl From<ApiError> for HttpError {
    fn from(e: ApiError) -> HttpError {
        if e.code == ErrorCode::Internal {
            return HttpError::for_internal_error(e.detail);
        }
        let status = StatusCode::from_u16(e.code.http_status()).unwrap();
        HttpError::for_client_error(Some(e.code.as_str().to_string()), status, e.detail)
    }
}

/// Maps any anyhow-flavoured internal failure (catalogue RPC, object-store
/// I/O, and so on) to `ErrorCode::Internal`, the catch-all from §7.
pub trait OrInternal<T> {
    fn or_internal(self, context: &str) -> SResult<T, ApiError>;
}

impl<T, E: std::fmt::Display> OrInternal<T> for SResult<T, E> {
    fn or_internal(self, context: &str) -> SResult<T, ApiError> {
        self.map_err(|e| ApiError::internal(format!("{}: {}", context, e)))
    }
}

pub trait MakeInternalError<T> {
    fn or_500(self) -> SResult<T, HttpError>;
}

impl<T> MakeInternalError<T> for anyhow::Result<T> {
    fn or_500(self) -> SResult<T, HttpError> {
        self.map_err(|e| HttpError::for_internal_error(format!("internal error: {:?}", e)))
    }
}

impl<T> MakeInternalError<T> for SResult<T, ApiError> {
    fn or_500(self) -> SResult<T, HttpError> {
        self.map_err(HttpError::from)
    }
}
