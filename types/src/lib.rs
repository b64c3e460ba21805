/*
 * Copyright 2024 Download Service Contributors
 */

//! Wire and domain types shared between the server's components: the
//! catalogue's node shape, a download job's lifecycle, status-store keys,
//! hand-off token claims, and the HTTP request/response bodies.

pub mod envelope;
pub mod errors;
pub mod job;
pub mod location;
pub mod node;
pub mod request;
pub mod token;

pub use envelope::Envelope;
pub use errors::ErrorCode;
pub use job::{
    status_key, status_key_pattern, DownloadJob, DownloadType, FileToZip, JobPayload, JobStatus,
    LockEntry, LockedSet,
};
pub use location::{Location, LocationError};
pub use node::{DatasetNode, Node, NodeData};
pub use token::{DatasetVersionClaims, DownloadClaims};
