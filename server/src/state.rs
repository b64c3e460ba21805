/*
 * Copyright 2024 Download Service Contributors
 */

//! The process-wide application state handed to every dropshot handler,
//! mirroring the teacher's `Central`: one `Arc<AppState>` cloned into every
//! background task and every request context.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use download_common::ConfigFile;
use slog::{o, Logger};
use tokio::sync::{mpsc, Mutex};

use crate::approval::ApprovalFilter;
use crate::audit::AuditPublisher;
use crate::catalogue::Catalogue;
use crate::gateway::Gateway;
use crate::locks::LockCoordinator;
use crate::orchestrator::WorkItem;
use crate::schema_client::SchemaClient;
use crate::status::StatusStore;
use crate::token::TokenService;

pub struct AppState {
    pub config: ConfigFile,
    pub staging_root: PathBuf,
    pub catalogue: Catalogue,
    pub locks: LockCoordinator,
    pub gateway: Gateway,
    pub token: TokenService,
    pub status: StatusStore,
    pub audit: AuditPublisher,
    pub schema: SchemaClient,
    pub approval: Option<ApprovalFilter>,
    pub work_tx: mpsc::Sender<WorkItem>,
}

impl AppState {
    pub fn log_for(&self, log: &Logger, component: &str) -> Logger {
        log.new(o!("component" => component.to_string()))
    }
}

/// Spawns `count` worker tasks pulling from a shared receiver, the
/// task-per-job pool from §5 / §9: pre-download enqueues, workers dequeue,
/// with no shared mutable state across jobs beyond the lock service and the
/// status store.
pub fn spawn_worker_pool(
    log: Logger,
    state: Arc<AppState>,
    rx: mpsc::Receiver<WorkItem>,
    count: usize,
) -> Vec<tokio::task::JoinHandle<()>> {
    let rx = Arc::new(Mutex::new(rx));
    let mut handles = Vec::new();
    for i in 0..count {
        let rx = Arc::clone(&rx);
        let state = Arc::clone(&state);
        let log = log.new(o!("worker" => i));
        handles.push(tokio::task::spawn(async move {
            loop {
                let item = {
                    let mut guard = rx.lock().await;
                    guard.recv().await
                };
                match item {
                    Some(item) => crate::orchestrator::run_worker(&log, &state, item).await,
                    None => break,
                }
            }
        }));
    }
    handles
}
