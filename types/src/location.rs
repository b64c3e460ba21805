/*
 * Copyright 2024 Download Service Contributors
 */

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("malformed object-store location {0:?}")]
    Malformed(String),
}

/// A parsed `<scheme>://<host>/<bucket>/<object_key>` location, the grammar
/// every node's storage location string follows. `object_key` may itself
/// contain `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub scheme: String,
    pub host: String,
    pub bucket: String,
    pub object_key: String,
}

impl Location {
    pub fn parse(raw: &str) -> Result<Location, LocationError> {
        let (scheme, rest) = raw
            .split_once("//")
            .ok_or_else(|| LocationError::Malformed(raw.to_string()))?;
        let scheme = scheme.trim_end_matches(':').to_string();

        let mut parts = rest.splitn(3, '/');
        let host = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LocationError::Malformed(raw.to_string()))?
            .to_string();
        let bucket = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LocationError::Malformed(raw.to_string()))?
            .to_string();
        let object_key = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LocationError::Malformed(raw.to_string()))?
            .to_string();

        Ok(Location { scheme, host, bucket, object_key })
    }

    /// The filename component a human would expect in a `Content-Disposition`
    /// header: the final `/`-delimited segment of `object_key`.
    pub fn file_name(&self) -> &str {
        self.object_key.rsplit('/').next().unwrap_or(&self.object_key)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}/{}", self.scheme, self.host, self.bucket, self.object_key)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_well_formed_location() {
        let loc = Location::parse("http://minio:9000/bucket/a/b/c.txt").unwrap();
        assert_eq!(loc.scheme, "http");
        assert_eq!(loc.host, "minio:9000");
        assert_eq!(loc.bucket, "bucket");
        assert_eq!(loc.object_key, "a/b/c.txt");
        assert_eq!(loc.file_name(), "c.txt");
    }

    #[test]
    fn parses_key_with_no_further_slashes() {
        let loc = Location::parse("http://h/bucket/key").unwrap();
        assert_eq!(loc.object_key, "key");
        assert_eq!(loc.file_name(), "key");
    }

    #[test]
    fn rejects_missing_key() {
        assert!(Location::parse("http://h/bucket").is_err());
    }

    #[test]
    fn rejects_missing_scheme_separator() {
        assert!(Location::parse("not-a-location").is_err());
    }

    #[test]
    fn round_trips_through_display() {
        let raw = "https://h/bucket/a/b.txt";
        let loc = Location::parse(raw).unwrap();
        assert_eq!(loc.to_string(), raw);
    }
}
