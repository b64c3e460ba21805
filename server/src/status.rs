/*
 * Copyright 2024 Download Service Contributors
 */

//! Job Status Store (C5): a thin interface over redis holding ephemeral job
//! records keyed by the compound key from §3. Not the source of truth for
//! metadata -- only for job lifecycle state.

use anyhow::{Context, Result};
use download_types::DownloadJob;
use redis::AsyncCommands;

/// A `MultiplexedConnection` pipelines every caller's requests over one
/// TCP connection and is cheap to clone, so we open it once at startup and
/// hand out clones instead of pooling distinct connections.
#[derive(Clone)]
pub struct StatusStore {
    conn: redis::aio::MultiplexedConnection,
}

impl StatusStore {
    pub async fn new(redis_url: &str) -> Result<StatusStore> {
        let client = redis::Client::open(redis_url).context("opening redis client")?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .context("opening redis async connection")?;
        Ok(StatusStore { conn })
    }

    pub async fn set(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(value).context("encoding status record")?;
        let _: () = conn.set(key, body).await.context("writing status record")?;
        Ok(())
    }

    pub async fn set_job(&self, job: &DownloadJob, action: &str, source_path: &str) -> Result<()> {
        let key = job.status_key(action, source_path);
        let value = serde_json::to_value(job).context("encoding job")?;
        self.set(&key, &value).await
    }

    /// Scans for every key matching `pattern` (with `*` segments) and
    /// returns the decoded values. §9: wildcard queries are scanned and
    /// filtered in memory, the same tradeoff any ordered/scannable KV store
    /// implies; we use `SCAN` rather than `KEYS` to avoid blocking redis on
    /// a large keyspace.
    pub async fn mget_by_prefix(&self, pattern: &str) -> Result<Vec<serde_json::Value>> {
        let mut conn = self.conn.clone();
        let mut out = Vec::new();
        let mut iter: redis::AsyncIter<String> =
            conn.scan_match(pattern).await.context("scanning status store")?;

        let mut keys = Vec::new();
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        drop(iter);

        if keys.is_empty() {
            return Ok(out);
        }

        let values: Vec<Option<String>> = conn.mget(&keys).await.context("mget status records")?;
        for v in values.into_iter().flatten() {
            out.push(serde_json::from_str(&v).context("decoding status record")?);
        }
        Ok(out)
    }

    /// Prefix-delete used by `DELETE /v1/download/status`, scoped to a
    /// single session.
    pub async fn mdelete_by_prefix(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let mut iter: redis::AsyncIter<String> =
            conn.scan_match(pattern).await.context("scanning status store for delete")?;

        let mut keys = Vec::new();
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        drop(iter);

        if keys.is_empty() {
            return Ok(0);
        }
        let n: u64 = conn.del(&keys).await.context("deleting status records")?;
        Ok(n)
    }
}
