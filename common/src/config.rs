/*
 * Copyright 2024 Download Service Contributors
 */

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top level configuration document for the download service, loaded from a
/// TOML file passed on the command line (`-f`), mirroring the shape of the
/// teacher's own `ConfigFile`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub bind_address: String,

    pub staging: StagingConfig,
    pub catalogue: CatalogueConfig,
    pub lock_service: LockServiceConfig,
    pub dataset_schema: SchemaConfig,
    pub audit: AuditConfig,
    pub approval_db: ApprovalDbConfig,
    pub object_store: ObjectStoreConfig,
    pub status_store: StatusStoreConfig,
    pub token: TokenConfig,
    pub zones: ZoneConfig,

    #[serde(default)]
    pub worker_pool_size: Option<usize>,
}

impl ConfigFile {
    pub fn worker_pool_size(&self) -> usize {
        self.worker_pool_size.unwrap_or(4)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogueConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockServiceConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    pub base_url: String,
    /// Which schema standard name to request alongside `"open_minds"`.
    /// §9 Open Question: the newer source variant uses `"default"` rather
    /// than `"vre"`; we take that value but keep it configurable.
    #[serde(default = "SchemaConfig::default_standard")]
    pub default_standard: String,
}

impl SchemaConfig {
    fn default_standard() -> String {
        "default".to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalDbConfig {
    /// Postgres connection string for the approval-request database.
    pub database_url: String,
    #[serde(default = "ApprovalDbConfig::default_pool_size")]
    pub pool_size: u32,
}

impl ApprovalDbConfig {
    fn default_pool_size() -> u32 {
        4
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusStoreConfig {
    pub redis_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    pub expire_minutes: i64,
    /// Accepted alongside `secret` during a rotation window (§9); tokens
    /// signed with this key still verify, but new tokens always use `secret`.
    #[serde(default)]
    pub secondary_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneConfig {
    pub green_label: String,
    pub core_label: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ObjectStoreCredentials {
    Static { access_key: String, secret_key: String },
    OidcClientGrants { identity_provider_url: String, client_id: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub region: String,
    #[serde(default)]
    pub https: bool,
    pub credentials: ObjectStoreCredentials,
}

pub fn load(path: &str) -> Result<ConfigFile> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration file {:?}", path))?;
    let c: ConfigFile = toml::from_str(&s)
        .with_context(|| format!("parsing configuration file {:?}", path))?;
    Ok(c)
}
