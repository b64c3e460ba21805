/*
 * Copyright 2024 Download Service Contributors
 */

//! Download Service: assembles, locks, stages, archives, and hands off
//! download jobs against an object-store-backed metadata catalogue. See
//! `AppState` for the collaborators every endpoint shares.

use std::process::exit;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use download_common::make_log;
use dropshot::{ApiDescription, ConfigDropshot, HttpServerStarter};
use getopts::Options;
use slog::o;
use tokio::sync::mpsc;

mod api;
mod approval;
mod archive;
mod audit;
mod catalogue;
mod errors;
mod gateway;
mod locks;
mod orchestrator;
mod schema_client;
mod state;
mod status;
mod token;

use approval::ApprovalFilter;
use audit::AuditPublisher;
use catalogue::Catalogue;
use locks::LockCoordinator;
use schema_client::SchemaClient;
use state::AppState;
use status::StatusStore;
use token::TokenService;

#[tokio::main]
async fn main() -> Result<()> {
    let mut opts = Options::new();
    opts.optopt("b", "", "bind address:port", "BIND_ADDRESS");
    opts.optopt("f", "", "configuration file", "CONFIG");
    opts.optopt("S", "", "dump OpenAPI schema", "FILE");

    let p = match opts.parse(std::env::args().skip(1)) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("ERROR: usage: {}", e);
            eprintln!("       {}", opts.usage("usage"));
            exit(1);
        }
    };

    let mut ad = ApiDescription::new();
    ad.register(api::v1::pre_download_v1).api_check()?;
    ad.register(api::v1::downloads_status_list).api_check()?;
    ad.register(api::v1::download_status_by_token).api_check()?;
    ad.register(api::v1::download_redeem).api_check()?;
    ad.register(api::v1::download_status_delete).api_check()?;
    ad.register(api::v2::pre_download_v2).api_check()?;
    ad.register(api::v2::pre_download_full_dataset).api_check()?;
    ad.register(api::v2::dataset_download_redeem).api_check()?;
    ad.register(api::object::object_get).api_check()?;

    if let Some(s) = p.opt_str("S") {
        let mut f = std::fs::OpenOptions::new().create_new(true).write(true).open(&s)?;
        ad.openapi("Download Service", "1.0").write(&mut f)?;
        return Ok(());
    }

    let config_path = p.opt_str("f").ok_or_else(|| anyhow!("must specify configuration file (-f)"))?;
    let config = download_common::load_config(&config_path)?;

    let bind_address = p
        .opt_str("b")
        .unwrap_or_else(|| config.bind_address.clone())
        .parse()
        .context("parsing bind address")?;

    let log = make_log("download-service");

    std::fs::create_dir_all(&config.staging.root)
        .with_context(|| format!("creating staging root {:?}", config.staging.root))?;

    let catalogue = Catalogue::new(config.catalogue.base_url.clone(), log.new(o!("component" => "catalogue")));
    let locks = LockCoordinator::new(
        config.lock_service.base_url.clone(),
        config.zones.green_label.clone(),
        config.zones.core_label.clone(),
        log.new(o!("component" => "locks")),
    );
    let gateway_client = gateway::build_s3_client(&config).await.context("building object store client")?;
    let gateway = gateway::Gateway::new(gateway_client, log.new(o!("component" => "gateway")));
    let token = TokenService::new(config.token.secret.clone(), config.token.secondary_secret.clone());
    let status = StatusStore::new(&config.status_store.redis_url).await.context("connecting to status store")?;
    let audit = AuditPublisher::new(config.audit.base_url.clone());
    let schema = SchemaClient::new(config.dataset_schema.base_url.clone());

    let approval = if config.approval_db.database_url.is_empty() {
        None
    } else {
        let db = download_database::Database::new(&config.approval_db.database_url, config.approval_db.pool_size)
            .context("connecting to approval database")?;
        Some(ApprovalFilter::new(db, log.new(o!("component" => "approval"))))
    };

    let (work_tx, work_rx) = mpsc::channel(1024);
    let worker_pool_size = config.worker_pool_size();
    let staging_root = config.staging.root.clone();

    let state = Arc::new(AppState {
        config,
        staging_root,
        catalogue,
        locks,
        gateway,
        token,
        status,
        audit,
        schema,
        approval,
        work_tx,
    });

    let worker_handles =
        state::spawn_worker_pool(log.new(o!("component" => "worker_pool")), Arc::clone(&state), work_rx, worker_pool_size);
    let workers_task = tokio::task::spawn(async move {
        futures::future::join_all(worker_handles).await;
    });

    let server = HttpServerStarter::new(
        &ConfigDropshot { request_body_max_bytes: 10 * 1024 * 1024, bind_address, ..Default::default() },
        ad,
        state,
        &log,
    )
    .map_err(|e| anyhow!("server startup failure: {:?}", e))?;

    let server_task = server.start();

    loop {
        tokio::select! {
            _ = workers_task => bail!("worker pool stopped early"),
            _ = server_task => bail!("server stopped early"),
        }
    }
}
