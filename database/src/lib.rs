/*
 * Copyright 2024 Download Service Contributors
 */

//! The approval-request store (C8): a pooled Postgres connection used only
//! to look up which entities a given `approval_request_id` has admitted.

pub mod models;
pub mod schema;

use anyhow::{Context, Result};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use uuid::Uuid;

pub use models::{ApprovalEntities, ApprovalEntity};

type PgPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(database_url: &str, pool_size: u32) -> Result<Database> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .context("building approval database connection pool")?;
        Ok(Database { pool })
    }

    fn conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>> {
        self.pool.get().context("checking out approval database connection")
    }

    /// §4.8: a single SELECT against `approval_entity` filtered by
    /// `request_id`, returning an empty map on no match rather than an
    /// error -- the orchestrator treats that as "nothing approved".
    pub fn get_approval_entities(&self, request_id: &str) -> Result<ApprovalEntities> {
        use schema::approval_entity::dsl;

        let rid = Uuid::parse_str(request_id)
            .with_context(|| format!("parsing approval_request_id {:?}", request_id))?;

        let mut conn = self.conn()?;
        let rows = dsl::approval_entity
            .filter(dsl::request_id.eq(rid))
            .load::<ApprovalEntity>(&mut conn)
            .context("querying approval_entity")?;

        Ok(rows.into_iter().map(|row| (row.entity_geid.clone(), row)).collect())
    }
}
