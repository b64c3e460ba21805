/*
 * Copyright 2024 Download Service Contributors
 */

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The common response envelope every non-streaming endpoint returns
/// (§4.7). `code` mirrors the HTTP status so clients that only inspect the
/// body can branch without looking at headers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Envelope<T> {
    pub code: u16,
    pub error_msg: String,
    pub page: u32,
    pub total: u32,
    pub num_of_pages: u32,
    pub result: T,
}

impl<T> Envelope<T> {
    pub fn ok(result: T) -> Envelope<T> {
        Envelope { code: 200, error_msg: String::new(), page: 0, total: 1, num_of_pages: 1, result }
    }

    pub fn ok_list(result: T, total: u32) -> Envelope<T> {
        let num_of_pages = if total == 0 { 1 } else { total };
        Envelope { code: 200, error_msg: String::new(), page: 0, total, num_of_pages, result }
    }
}

impl Envelope<serde_json::Value> {
    pub fn error(code: u16, error_msg: impl Into<String>) -> Envelope<serde_json::Value> {
        Envelope {
            code,
            error_msg: error_msg.into(),
            page: 0,
            total: 0,
            num_of_pages: 0,
            result: serde_json::Value::Null,
        }
    }
}
