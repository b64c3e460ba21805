/*
 * Copyright 2024 Download Service Contributors
 */

//! Client for the dataset-schema service consulted by the full-dataset
//! worker step (§4.6.1 step 4). Not one of the nine named components, but a
//! thin external collaborator in the same style as the catalogue and lock
//! clients.

use anyhow::{Context, Result};
use serde_json::Value;

pub struct SchemaClient {
    http: reqwest::Client,
    base_url: String,
}

pub struct SchemaFile {
    pub name: String,
    pub content: Value,
}

impl SchemaClient {
    pub fn new(base_url: String) -> SchemaClient {
        SchemaClient { http: reqwest::Client::new(), base_url }
    }

    /// Fetches every schema definition for `dataset_code` under the given
    /// standard (`"default"` or `"open_minds"`, per §9's resolved open
    /// question). Non-ASCII content is preserved as-is -- callers encode
    /// with `serde_json` which never escapes to `\uXXXX` unless asked.
    pub async fn fetch(&self, dataset_code: &str, standard: &str) -> Result<Vec<SchemaFile>> {
        let url = format!("{}/v1/dataset/{}/schema?standard={}", self.base_url, dataset_code, standard);
        let resp: Vec<Value> = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("fetching schema standard {} for {}", standard, dataset_code))?
            .error_for_status()
            .context("schema service returned error status")?
            .json()
            .await
            .context("decoding schema response")?;

        Ok(resp.into_iter().enumerate().map(|(i, content)| schema_file_from_value(i, content)).collect())
    }
}

/// Pulls the schema's own `name` field when present, falling back to a
/// positional placeholder so a nameless schema document still gets written
/// under a stable, unique filename.
fn schema_file_from_value(index: usize, content: Value) -> SchemaFile {
    let name = content
        .get("name")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("schema_{index}.json"));
    SchemaFile { name, content }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uses_the_schema_documents_own_name() {
        let f = schema_file_from_value(0, serde_json::json!({ "name": "participant.json", "fields": [] }));
        assert_eq!(f.name, "participant.json");
    }

    #[test]
    fn falls_back_to_a_positional_name_when_absent() {
        let f = schema_file_from_value(3, serde_json::json!({ "fields": [] }));
        assert_eq!(f.name, "schema_3.json");
    }
}
