/*
 * Copyright 2024 Download Service Contributors
 */

//! Audit Publisher (C9): emits structured events to the activity-log bus.
//! A publish failure aborts the containing step at job granularity (§4.9).

use anyhow::{Context, Result};
use serde_json::{json, Value};

pub struct AuditPublisher {
    http: reqwest::Client,
    base_url: String,
}

impl AuditPublisher {
    pub fn new(base_url: String) -> AuditPublisher {
        AuditPublisher { http: reqwest::Client::new(), base_url }
    }

    pub async fn publish(
        &self,
        event_type: &str,
        payload: Value,
        queue: &str,
        routing_key: &str,
        exchange_name: &str,
        exchange_type: &str,
    ) -> Result<()> {
        let body = json!({
            "event_type": event_type,
            "payload": payload,
            "queue": queue,
            "routing_key": routing_key,
            "exchange": { "name": exchange_name, "type": exchange_type },
        });

        self.http
            .post(format!("{}/v1/activity-logs", self.base_url))
            .json(&body)
            .send()
            .await
            .context("publishing audit event")?
            .error_for_status()
            .context("audit broker rejected event")?;

        Ok(())
    }

    /// Builds the `data_download` event emitted on single-file redemption
    /// (§4.6.2).
    pub fn data_download_payload(
        &self,
        action: &str,
        operator: &str,
        target: &str,
        outcome: &str,
        display_name: &str,
        project_code: Option<&str>,
        source: &str,
    ) -> Value {
        json!({
            "action": action,
            "operator": operator,
            "target": target,
            "outcome": outcome,
            "resource": "file",
            "display_name": display_name,
            "project_code": project_code,
            "extra": { "source": source },
        })
    }

    /// Builds the payload for `DATASET_FILEDOWNLOAD_SUCCEED` /
    /// `DATASET_DOWNLOAD_SUCCEED` events (§4.6.1 step 6, §8 scenario S6).
    /// §9 Open Question: the v2 dataset path must pass the actual resolved
    /// file list as `source_entry`, not the `dataset_geid` placeholder the
    /// older variant used.
    pub fn dataset_download_payload(
        &self,
        dataset_geid: &str,
        operator: &str,
        action: &str,
        source_entry: Vec<String>,
    ) -> Value {
        json!({
            "dataset_geid": dataset_geid,
            "operator": operator,
            "action": action,
            "resource": "dataset",
            "detail": { "source": source_entry },
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn data_download_payload_carries_source_under_extra() {
        let audit = AuditPublisher::new("http://broker".to_string());
        let p = audit.data_download_payload(
            "data_download",
            "alice",
            "/tmp/proj_1/a.txt",
            "success",
            "a.txt",
            Some("proj"),
            "/tmp/proj_1/a.txt",
        );
        assert_eq!(p["resource"], "file");
        assert_eq!(p["extra"]["source"], "/tmp/proj_1/a.txt");
        assert_eq!(p["project_code"], "proj");
    }

    #[test]
    fn dataset_download_payload_carries_resolved_file_list() {
        let audit = AuditPublisher::new("http://broker".to_string());
        let p = audit.dataset_download_payload(
            "dataset-geid-1",
            "alice",
            "data_download",
            vec!["a/b.txt".to_string(), "a/c.txt".to_string()],
        );
        assert_eq!(p["dataset_geid"], "dataset-geid-1");
        assert_eq!(p["detail"]["source"], json!(["a/b.txt", "a/c.txt"]));
    }
}
