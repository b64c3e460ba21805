/*
 * Copyright 2024 Download Service Contributors
 */

//! Metadata Resolver (C1): looks up catalogue nodes by geid and walks
//! folder subtrees down to their leaf files. The catalogue is authoritative
//! for path/label/archival metadata; every call here is an idempotent read.

use std::collections::HashSet;

use anyhow::{Context, Result};
use download_types::{DatasetNode, Node, NodeData};
use serde::Deserialize;
use slog::{warn, Logger};

#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("node {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Deserialize)]
struct NodeQueryResponse {
    result: Vec<RawNode>,
}

/// The outer `labels` field shadows the flattened `NodeData.labels` key during
/// deserialization (serde hands the flattened struct the leftover map, which
/// no longer has `"labels"` in it) -- `NodeData.labels` carries `#[serde(default)]`
/// for exactly this reason, and `node_from_raw` overwrites it with the outer
/// value afterwards.
#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(flatten)]
    data: NodeData,
    labels: Vec<String>,
}

pub struct Catalogue {
    http: reqwest::Client,
    base_url: String,
    log: Logger,
}

impl Catalogue {
    pub fn new(base_url: String, log: Logger) -> Catalogue {
        Catalogue { http: reqwest::Client::new(), base_url, log }
    }

    fn node_from_raw(raw: RawNode) -> Node {
        let kind = if raw.labels.iter().any(|l| l == "Folder") {
            "Folder"
        } else {
            "File"
        };
        let mut data = raw.data;
        data.labels = raw.labels;
        Node::from_catalogue_json(kind, data).expect("kind is always File or Folder")
    }

    async fn query_nodes(&self, url: &str) -> Result<Vec<Node>, CatalogueError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("querying catalogue at {}", url))?
            .error_for_status()
            .with_context(|| format!("catalogue returned error status for {}", url))?;

        let parsed: NodeQueryResponse = resp.json().await.context("decoding catalogue response")?;
        Ok(parsed.result.into_iter().map(Catalogue::node_from_raw).collect())
    }

    /// §4.1: fails with `NotFound` if the catalogue returns an empty list.
    pub async fn get_node_by_geid(&self, geid: &str) -> Result<Node, CatalogueError> {
        let url = format!("{}/v1/neo4j/nodes/geid/{}", self.base_url, geid);
        let mut nodes = self.query_nodes(&url).await?;
        if nodes.is_empty() {
            return Err(CatalogueError::NotFound(geid.to_string()));
        }
        Ok(nodes.remove(0))
    }

    /// One-hop expansion used by the Lock Coordinator to walk depth-first.
    pub async fn children(&self, geid: &str) -> Result<Vec<Node>, CatalogueError> {
        let url = format!("{}/v1/neo4j/nodes/{}/relations/children", self.base_url, geid);
        self.query_nodes(&url).await
    }

    /// §4.1: recursively follows the Folder→children relationship,
    /// returning only non-archived File leaves. Iterative with an explicit
    /// stack and a visited-geid guard, per §9 -- the catalogue's data model
    /// forbids cycles but a defensive walk costs nothing and survives a
    /// corrupt tree.
    pub async fn expand_folder(&self, geid: &str) -> Result<Vec<NodeData>, CatalogueError> {
        let mut out = Vec::new();
        let mut stack = vec![geid.to_string()];
        let mut visited = HashSet::new();

        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                warn!(self.log, "cycle detected while expanding folder"; "geid" => &current);
                continue;
            }

            for child in self.children(&current).await? {
                let data = child.data();
                if data.archived {
                    continue;
                }
                match child {
                    Node::File(d) => out.push(d),
                    Node::Folder(d) => stack.push(d.geid),
                }
            }
        }

        Ok(out)
    }

    /// Fetches the dataset node carrying description metadata (authors,
    /// license, modality, ...) for the `dataset_description` staging step
    /// (§4 of SPEC_FULL, grounded in the original's `nodes/Dataset/query`).
    pub async fn get_dataset_node(&self, dataset_geid: &str) -> Result<DatasetNode, CatalogueError> {
        let url = format!("{}/v1/neo4j/nodes/Dataset/query", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "global_entity_id": dataset_geid }))
            .send()
            .await
            .with_context(|| format!("querying dataset node {}", dataset_geid))?
            .error_for_status()
            .context("catalogue returned error status for dataset node query")?;

        let mut nodes: Vec<DatasetNode> = resp.json().await.context("decoding dataset node response")?;
        if nodes.is_empty() {
            return Err(CatalogueError::NotFound(dataset_geid.to_string()));
        }
        Ok(nodes.remove(0))
    }
}

#[cfg(test)]
mod test {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_log() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    fn json_node(geid: &str, labels: &[&str], archived: bool) -> serde_json::Value {
        serde_json::json!({
            "geid": geid,
            "display_path": format!("a/{geid}.txt"),
            "location": format!("http://h/bucket/a/{geid}.txt"),
            "archived": archived,
            "project_code": "proj",
            "dataset_code": null,
            "labels": labels,
        })
    }

    #[tokio::test]
    async fn get_node_by_geid_returns_not_found_on_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/neo4j/nodes/geid/missing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": [] })))
            .mount(&server)
            .await;

        let catalogue = Catalogue::new(server.uri(), test_log());
        let err = catalogue.get_node_by_geid("missing").await.unwrap_err();
        assert!(matches!(err, CatalogueError::NotFound(g) if g == "missing"));
    }

    #[tokio::test]
    async fn get_node_by_geid_returns_the_first_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/neo4j/nodes/geid/g1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [json_node("g1", &["File"], false)],
            })))
            .mount(&server)
            .await;

        let catalogue = Catalogue::new(server.uri(), test_log());
        let node = catalogue.get_node_by_geid("g1").await.unwrap();
        assert_eq!(node.data().geid, "g1");
        assert!(!node.is_folder());
    }

    #[tokio::test]
    async fn expand_folder_walks_children_and_skips_archived_leaves() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/neo4j/nodes/root/relations/children"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [
                    json_node("keep", &["File"], false),
                    json_node("dropped", &["File"], true),
                    json_node("sub", &["Folder"], false),
                ],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/neo4j/nodes/sub/relations/children"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [json_node("nested", &["File"], false)],
            })))
            .mount(&server)
            .await;

        let catalogue = Catalogue::new(server.uri(), test_log());
        let mut leaves: Vec<String> = catalogue.expand_folder("root").await.unwrap().into_iter().map(|n| n.geid).collect();
        leaves.sort();
        assert_eq!(leaves, vec!["keep".to_string(), "nested".to_string()]);
    }

    fn raw(labels: &[&str]) -> RawNode {
        RawNode {
            data: NodeData {
                geid: "g1".into(),
                display_path: "a/b.txt".into(),
                location: "http://h/bucket/a/b.txt".into(),
                labels: Vec::new(),
                archived: false,
                project_code: Some("proj".into()),
                dataset_code: None,
            },
            labels: labels.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn node_with_folder_label_becomes_folder_variant() {
        let node = Catalogue::node_from_raw(raw(&["Folder"]));
        assert!(node.is_folder());
    }

    #[test]
    fn node_without_folder_label_becomes_file_variant() {
        let node = Catalogue::node_from_raw(raw(&["File"]));
        assert!(!node.is_folder());
    }

    #[test]
    fn raw_node_carries_labels_onto_its_data() {
        let node = Catalogue::node_from_raw(raw(&["File", "Green Room"]));
        assert!(node.data().has_label("Green Room"));
    }

    #[test]
    fn node_query_response_deserializes_flattened_fields() {
        let body = r#"{"result": [{"geid": "g1", "display_path": "a/b.txt", "location": "http://h/bucket/a/b.txt", "archived": false, "project_code": "proj", "dataset_code": null, "labels": ["File"]}]}"#;
        let parsed: NodeQueryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.result.len(), 1);
        assert_eq!(parsed.result[0].data.geid, "g1");
        assert_eq!(parsed.result[0].labels, vec!["File".to_string()]);
    }
}
