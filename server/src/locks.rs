/*
 * Copyright 2024 Download Service Contributors
 */

//! Lock Coordinator (C2): acquires read-locks on every object a job touches
//! and, on partial failure, lets the caller roll back whatever it already
//! holds (the "finally unlock" pattern from §9).

use anyhow::Context;
use download_common::ResultExt;
use download_types::{LockEntry, LockedSet, NodeData};
use serde_json::json;
use slog::{info, Logger};

use crate::catalogue::Catalogue;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock service rejected {resource_key:?}: {detail}")]
    Rejected { resource_key: String, detail: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub struct LockCoordinator {
    http: reqwest::Client,
    base_url: String,
    green_label: String,
    core_label: String,
    log: Logger,
}

impl LockCoordinator {
    pub fn new(base_url: String, green_label: String, core_label: String, log: Logger) -> LockCoordinator {
        LockCoordinator { http: reqwest::Client::new(), base_url, green_label, core_label, log }
    }

    pub async fn lock_resource(&self, resource_key: &str, operation: &str) -> Result<(), LockError> {
        let resp = self
            .http
            .post(format!("{}/v1/resource/lock", self.base_url))
            .json(&json!({ "resource_key": resource_key, "operation": operation }))
            .send()
            .await
            .context("calling lock service")?;

        if !resp.status().is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(LockError::Rejected { resource_key: resource_key.to_string(), detail });
        }
        Ok(())
    }

    pub async fn unlock_resource(&self, resource_key: &str, operation: &str) -> Result<(), LockError> {
        let resp = self
            .http
            .delete(format!("{}/v1/resource/lock", self.base_url))
            .json(&json!({ "resource_key": resource_key, "operation": operation }))
            .send()
            .await
            .context("calling lock service")?;

        if !resp.status().is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(LockError::Rejected { resource_key: resource_key.to_string(), detail });
        }
        Ok(())
    }

    /// §4.2: depth-first, pre-order recursive lock over the requested
    /// geids. Returns whatever was acquired alongside the first failure
    /// encountered -- it does NOT roll back; the orchestrator owns that via
    /// `release_all`.
    pub async fn recursive_lock(
        &self,
        catalogue: &Catalogue,
        code: &str,
        geids: &[String],
    ) -> (LockedSet, Option<LockError>) {
        let mut locked = Vec::new();
        for geid in geids {
            if let Some(e) = self.lock_one(catalogue, code, geid, &mut locked).await {
                return (locked, Some(e));
            }
        }
        (locked, None)
    }

    fn lock_one<'a>(
        &'a self,
        catalogue: &'a Catalogue,
        code: &'a str,
        geid: &'a str,
        locked: &'a mut LockedSet,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Option<LockError>> + 'a>> {
        Box::pin(async move {
            let node = match catalogue.get_node_by_geid(geid).await {
                Ok(n) => n,
                Err(e) => return Some(LockError::Other(e.into())),
            };
            let data = node.data();

            if data.archived {
                return None;
            }

            if !data.is_uploader_path() {
                let resource_key = resource_key(code, data, &self.green_label, &self.core_label);
                if let Err(e) = self.lock_resource(&resource_key, "read").await {
                    return Some(e);
                }
                locked.push(LockEntry { resource_key, operation: "read".to_string() });
                info!(self.log, "locked resource"; "resource_key" => locked.last().unwrap().resource_key.clone());
            }

            if node.is_folder() {
                let children = match catalogue.children(geid).await {
                    Ok(c) => c,
                    Err(e) => return Some(LockError::Other(e.into())),
                };
                for child in children {
                    if let Some(e) = self.lock_one(catalogue, code, &child.data().geid.clone(), locked).await {
                        return Some(e);
                    }
                }
            }

            None
        })
    }

    /// Finally-semantics release: every entry is unlocked regardless of
    /// earlier failures, with failures logged rather than propagated (§7:
    /// "lock-release failures are logged but do not prevent status
    /// updates").
    pub async fn release_all(&self, locked: &LockedSet) {
        for entry in locked {
            let msg = format!("failed to release lock on {}", entry.resource_key);
            self.unlock_resource(&entry.resource_key, &entry.operation).await.warn_on_err(&self.log, &msg);
        }
    }
}

/// `resource_key = bucket_prefix + code + "/" + display_path` (§3). `code`
/// is the job-level project or dataset code, not the node's own
/// `project_code` -- a dataset-scoped job locks under `dataset_code` even
/// for nodes whose `project_code` is absent.
pub fn resource_key(code: &str, data: &NodeData, green_label: &str, core_label: &str) -> String {
    format!("{}{}/{}", data.bucket_prefix(green_label, core_label), code, data.display_path)
}

#[cfg(test)]
mod test {
    use download_types::node::{LABEL_CORE_ZONE, LABEL_GREEN_ZONE};

    use super::*;

    fn node(labels: &[&str], project_code: &str, display_path: &str) -> NodeData {
        NodeData {
            geid: "g1".into(),
            display_path: display_path.into(),
            location: "http://h/bucket/k".into(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            archived: false,
            project_code: Some(project_code.into()),
            dataset_code: None,
        }
    }

    #[test]
    fn resource_key_uses_green_prefix() {
        let n = node(&[LABEL_GREEN_ZONE], "proj", "a/b.txt");
        assert_eq!(resource_key("proj", &n, LABEL_GREEN_ZONE, LABEL_CORE_ZONE), "gr-proj/a/b.txt");
    }

    #[test]
    fn resource_key_uses_core_prefix() {
        let n = node(&[LABEL_CORE_ZONE], "proj", "a/b.txt");
        assert_eq!(resource_key("proj", &n, LABEL_GREEN_ZONE, LABEL_CORE_ZONE), "core-proj/a/b.txt");
    }

    #[test]
    fn resource_key_has_no_prefix_by_default() {
        let n = node(&[], "proj", "a/b.txt");
        assert_eq!(resource_key("proj", &n, LABEL_GREEN_ZONE, LABEL_CORE_ZONE), "proj/a/b.txt");
    }

    #[test]
    fn resource_key_uses_job_code_not_node_project_code() {
        let mut n = node(&[], "node-proj", "a/b.txt");
        n.project_code = None;
        assert_eq!(resource_key("dataset-code", &n, LABEL_GREEN_ZONE, LABEL_CORE_ZONE), "dataset-code/a/b.txt");
    }

    fn test_log() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    fn file_node_body(geid: &str) -> serde_json::Value {
        serde_json::json!({
            "result": [{
                "geid": geid,
                "display_path": format!("a/{geid}.txt"),
                "location": format!("http://h/bucket/a/{geid}.txt"),
                "archived": false,
                "project_code": "proj",
                "dataset_code": null,
                "labels": ["File"],
            }],
        })
    }

    /// §8 scenario S4: the lock service rejects the second acquisition;
    /// `recursive_lock` returns the first entry already acquired alongside
    /// the error, without rolling it back itself.
    #[tokio::test]
    async fn recursive_lock_returns_partial_set_on_second_failure() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let catalogue_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/neo4j/nodes/geid/f1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file_node_body("f1")))
            .mount(&catalogue_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/neo4j/nodes/geid/f2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file_node_body("f2")))
            .mount(&catalogue_server)
            .await;

        let lock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/resource/lock"))
            .respond_with(|req: &wiremock::Request| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                if body["resource_key"] == "proj/a/f1.txt" {
                    ResponseTemplate::new(200)
                } else {
                    ResponseTemplate::new(409).set_body_string("resource already locked")
                }
            })
            .mount(&lock_server)
            .await;

        let catalogue = Catalogue::new(catalogue_server.uri(), test_log());
        let coordinator = LockCoordinator::new(
            lock_server.uri(),
            LABEL_GREEN_ZONE.to_string(),
            LABEL_CORE_ZONE.to_string(),
            test_log(),
        );

        let (locked, err) =
            coordinator.recursive_lock(&catalogue, "proj", &["f1".to_string(), "f2".to_string()]).await;

        assert!(err.is_some());
        assert_eq!(locked.len(), 1);
        assert_eq!(locked[0].resource_key, "proj/a/f1.txt");
    }

    #[tokio::test]
    async fn recursive_lock_acquires_every_entry_on_success() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let catalogue_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/neo4j/nodes/geid/f1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file_node_body("f1")))
            .mount(&catalogue_server)
            .await;

        let lock_server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/v1/resource/lock")).respond_with(ResponseTemplate::new(200)).mount(&lock_server).await;

        let catalogue = Catalogue::new(catalogue_server.uri(), test_log());
        let coordinator = LockCoordinator::new(
            lock_server.uri(),
            LABEL_GREEN_ZONE.to_string(),
            LABEL_CORE_ZONE.to_string(),
            test_log(),
        );

        let (locked, err) = coordinator.recursive_lock(&catalogue, "proj", &["f1".to_string()]).await;
        assert!(err.is_none());
        assert_eq!(locked.len(), 1);
    }
}
