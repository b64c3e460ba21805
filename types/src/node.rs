/*
 * Copyright 2024 Download Service Contributors
 */

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::location::Location;

/// Defaults used by tests and by callers with no configured zone labels.
/// Production callers pass the configured `zones.green_label`/`core_label`
/// (§6 Configuration keys) into `bucket_prefix` instead.
pub const LABEL_GREEN_ZONE: &str = "Green Room";
pub const LABEL_CORE_ZONE: &str = "Core";
pub const LABEL_FILE: &str = "File";
pub const LABEL_FOLDER: &str = "Folder";

/// Fields common to both file and folder nodes, as returned by the metadata
/// catalogue. Modeled as one struct behind a tagged `Node` enum per the
/// catalogue's own dynamic shape rather than two unrelated structs, so every
/// caller that only cares about the common envelope doesn't need to match.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NodeData {
    pub geid: String,
    pub display_path: String,
    pub location: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub archived: bool,
    pub project_code: Option<String>,
    pub dataset_code: Option<String>,
}

impl NodeData {
    pub fn is_uploader_path(&self) -> bool {
        self.display_path == "uploader"
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// `bucket_prefix` derivation from §4.2: green-zone label wins over
    /// core-zone, absence of either yields the empty prefix. `green_label`
    /// and `core_label` come from the deployment's `zones` configuration
    /// (§6) rather than being hardcoded, since the catalogue's actual label
    /// strings are environment-specific.
    pub fn bucket_prefix(&self, green_label: &str, core_label: &str) -> &'static str {
        if self.has_label(green_label) {
            "gr-"
        } else if self.has_label(core_label) {
            "core-"
        } else {
            ""
        }
    }

    pub fn parsed_location(&self) -> Result<Location, crate::location::LocationError> {
        Location::parse(&self.location)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind")]
pub enum Node {
    File(NodeData),
    Folder(NodeData),
}

impl Node {
    pub fn data(&self) -> &NodeData {
        match self {
            Node::File(d) | Node::Folder(d) => d,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Node::Folder(_))
    }

    pub fn from_catalogue_json(kind: &str, data: NodeData) -> Option<Node> {
        match kind {
            LABEL_FILE => Some(Node::File(data)),
            LABEL_FOLDER => Some(Node::Folder(data)),
            _ => None,
        }
    }
}

/// The dataset-node shape consulted for the description file written into
/// a full-dataset/`dataset_description` job's staging folder (§4 of
/// SPEC_FULL, grounded in the original's `nodes/Dataset/query` response).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatasetNode {
    pub code: String,
    pub name: String,
    pub authors: Vec<String>,
    pub collection_method: Vec<String>,
    pub creator: String,
    pub description: String,
    pub license: String,
    pub modality: Vec<String>,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub dataset_type: String,
}

#[cfg(test)]
mod test {
    use super::*;

    fn node(labels: &[&str]) -> NodeData {
        NodeData {
            geid: "g1".into(),
            display_path: "a/b.txt".into(),
            location: "http://h/bucket/a/b.txt".into(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            archived: false,
            project_code: Some("proj".into()),
            dataset_code: None,
        }
    }

    #[test]
    fn bucket_prefix_prefers_green_over_core() {
        let n = node(&[LABEL_GREEN_ZONE, LABEL_CORE_ZONE]);
        assert_eq!(n.bucket_prefix(LABEL_GREEN_ZONE, LABEL_CORE_ZONE), "gr-");
    }

    #[test]
    fn bucket_prefix_falls_back_to_core() {
        let n = node(&[LABEL_CORE_ZONE]);
        assert_eq!(n.bucket_prefix(LABEL_GREEN_ZONE, LABEL_CORE_ZONE), "core-");
    }

    #[test]
    fn bucket_prefix_defaults_empty() {
        let n = node(&["File"]);
        assert_eq!(n.bucket_prefix(LABEL_GREEN_ZONE, LABEL_CORE_ZONE), "");
    }

    #[test]
    fn uploader_path_is_detected() {
        let mut n = node(&[]);
        n.display_path = "uploader".into();
        assert!(n.is_uploader_path());
    }
}
