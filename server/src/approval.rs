/*
 * Copyright 2024 Download Service Contributors
 */

//! Approval Filter (C8): restricts a job's file set to entities approved
//! under a given request id. Only consulted when the caller supplies an
//! `approval_request_id`; a request id with no matching rows yields an
//! empty filter, which in turn yields an empty `files_to_zip` upstream.

use download_database::Database;
use slog::{info, Logger};

pub struct ApprovalFilter {
    db: Database,
    log: Logger,
}

impl ApprovalFilter {
    pub fn new(db: Database, log: Logger) -> ApprovalFilter {
        ApprovalFilter { db, log }
    }

    /// Returns the set of geids approved under `request_id`. Empty on no
    /// match or on a query error -- per §4.8 this silently yields an empty
    /// set rather than propagating, since the orchestrator's own validation
    /// step surfaces the resulting empty file list as a client error.
    pub fn approved_geids(&self, request_id: &str) -> std::collections::HashSet<String> {
        match self.db.get_approval_entities(request_id) {
            Ok(entities) => entities.into_keys().collect(),
            Err(e) => {
                info!(self.log, "approval lookup found nothing usable"; "request_id" => request_id, "error" => e.to_string());
                std::collections::HashSet::new()
            }
        }
    }
}
