/*
 * Copyright 2024 Download Service Contributors
 */

use std::collections::HashMap;

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::approval_entity;

/// One row of `approval_entity`: a single file or folder admitted into a
/// given approval request. `entity_type`/`review_status`/`copy_status` are
/// kept as plain `Text` rather than Diesel enum mappings -- the Approval
/// Filter (§4.8) only ever needs the `request_id -> entity_geid` set, the
/// same "loose" mapping the source's SQLAlchemy `Table.autoload_with`
/// reflection gives it.
#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = approval_entity)]
pub struct ApprovalEntity {
    pub id: Uuid,
    pub request_id: Uuid,
    pub entity_geid: String,
    pub entity_type: String,
    pub review_status: String,
    pub parent_geid: Option<String>,
    pub copy_status: String,
    pub name: String,
}

/// Mapping from entity geid to its approval row, as returned by
/// `get_approval_entities`. A geid absent from this map is not approved.
pub type ApprovalEntities = HashMap<String, ApprovalEntity>;
